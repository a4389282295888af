use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::services::backend::{Backend, BackendError};

const PERMITTED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum SubmitError {
    /// The draft never left the client; the messages are meant for inline
    /// display.
    #[error("draft failed validation")]
    Invalid(Vec<String>),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// A post being composed, immediate or scheduled. The attachment is already
/// uploaded elsewhere; the draft only carries its URL.
#[derive(Debug, Clone, Validate)]
pub struct PostDraft {
    #[validate(length(min = 1, message = "Caption is required"))]
    pub caption: String,
    #[validate(url(message = "Attachment must be a valid URL"))]
    pub attachment_url: String,
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl PostDraft {
    pub fn immediate(caption: &str, attachment_url: &str) -> Self {
        Self {
            caption: caption.to_owned(),
            attachment_url: attachment_url.to_owned(),
            scheduled_at: None,
        }
    }

    pub fn scheduled(caption: &str, attachment_url: &str, at: DateTime<Utc>) -> Self {
        Self {
            caption: caption.to_owned(),
            attachment_url: attachment_url.to_owned(),
            scheduled_at: Some(at),
        }
    }

    /// Everything wrong with the draft, as human-readable messages. Empty
    /// means submittable.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = match self.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => flatten(errors),
        };

        if !has_permitted_extension(&self.attachment_url) {
            problems.push("Only PNG, JPG, and JPEG files are allowed".to_owned());
        }

        if let Some(at) = self.scheduled_at {
            if at <= Utc::now() {
                problems.push("Date must be in the future".to_owned());
            }
        }

        problems
    }

    /// Validate and submit, routing to the immediate or scheduled endpoint.
    /// An invalid draft is never submitted.
    pub async fn submit(&self, backend: &Backend) -> Result<(), SubmitError> {
        let problems = self.problems();
        if !problems.is_empty() {
            return Err(SubmitError::Invalid(problems));
        }

        match self.scheduled_at {
            Some(at) => {
                backend
                    .create_scheduled_post(&self.caption, &self.attachment_url, at)
                    .await?
            }
            None => {
                backend
                    .create_post(&self.caption, &self.attachment_url)
                    .await?
            }
        }

        Ok(())
    }
}

/// Combine the picker's date and hour+minute selection into a publish time.
pub fn publish_time(date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    Some(date.and_hms_opt(hour, minute, 0)?.and_utc())
}

fn has_permitted_extension(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);

    match path.rsplit_once('.') {
        Some((_, extension)) => {
            let extension = extension.to_ascii_lowercase();
            PERMITTED_IMAGE_EXTENSIONS
                .iter()
                .any(|permitted| *permitted == extension)
        }
        None => false,
    }
}

fn flatten(errors: ValidationErrors) -> Vec<String> {
    errors
        .field_errors()
        .into_values()
        .flat_map(|field| {
            field.iter().map(|error| {
                error
                    .message
                    .as_ref()
                    .map(|message| message.to_string())
                    .unwrap_or_else(|| error.code.to_string())
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn a_complete_draft_has_no_problems() {
        let draft = PostDraft::immediate("sunset", "https://cdn.example/1.png");

        assert!(draft.problems().is_empty());
    }

    #[test]
    fn a_missing_caption_is_reported() {
        let draft = PostDraft::immediate("", "https://cdn.example/1.png");

        let problems = draft.problems();
        assert!(problems.contains(&"Caption is required".to_owned()));
    }

    #[test]
    fn non_image_attachments_are_rejected() {
        let draft = PostDraft::immediate("sunset", "https://cdn.example/1.gif");

        let problems = draft.problems();
        assert!(problems.contains(&"Only PNG, JPG, and JPEG files are allowed".to_owned()));
    }

    #[test]
    fn the_extension_check_ignores_query_strings() {
        let draft = PostDraft::immediate("sunset", "https://cdn.example/1.jpeg?w=800");

        assert!(draft.problems().is_empty());
    }

    #[test]
    fn a_past_schedule_is_reported() {
        let yesterday = Utc::now() - Duration::days(1);
        let draft = PostDraft::scheduled("later", "https://cdn.example/1.png", yesterday);

        let problems = draft.problems();
        assert!(problems.contains(&"Date must be in the future".to_owned()));
    }

    #[test]
    fn multiple_problems_are_collected_together() {
        let yesterday = Utc::now() - Duration::days(1);
        let draft = PostDraft::scheduled("", "not a url", yesterday);

        let problems = draft.problems();
        assert!(problems.len() >= 3);
    }

    #[test]
    fn publish_time_combines_date_and_hour_minute() {
        let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();

        let at = publish_time(date, 18, 30).unwrap();

        assert_eq!(at.to_rfc3339(), "2026-09-01T18:30:00+00:00");
    }

    #[test]
    fn publish_time_rejects_out_of_range_selections() {
        let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();

        assert!(publish_time(date, 24, 0).is_none());
    }

    #[tokio::test]
    async fn an_invalid_draft_is_never_submitted() {
        let mut server = mockito::Server::new_async().await;
        let immediate = server
            .mock("POST", "/api/createpost")
            .expect(0)
            .create_async()
            .await;
        let scheduled = server
            .mock("POST", "/api/createscheduledpost")
            .expect(0)
            .create_async()
            .await;

        let backend = Backend::with_credential(&server.url(), "token");
        let draft = PostDraft::immediate("", "https://cdn.example/1.png");

        match draft.submit(&backend).await {
            Err(SubmitError::Invalid(problems)) => assert!(!problems.is_empty()),
            other => panic!("expected a validation failure, got {other:?}"),
        }

        immediate.assert_async().await;
        scheduled.assert_async().await;
    }

    #[tokio::test]
    async fn an_immediate_draft_goes_to_createpost() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/createpost")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "caption": "sunset",
                "url": "https://cdn.example/1.png",
            })))
            .with_status(200)
            .create_async()
            .await;

        let backend = Backend::with_credential(&server.url(), "token");
        let draft = PostDraft::immediate("sunset", "https://cdn.example/1.png");

        draft.submit(&backend).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn a_scheduled_draft_goes_to_createscheduledpost() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/createscheduledpost")
            .with_status(200)
            .create_async()
            .await;

        let backend = Backend::with_credential(&server.url(), "token");
        let tomorrow = Utc::now() + Duration::days(1);
        let draft = PostDraft::scheduled("later", "https://cdn.example/1.png", tomorrow);

        draft.submit(&backend).await.unwrap();

        mock.assert_async().await;
    }
}
