use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use super::entities::{PostInfo, Registration, SavedPost};

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("credential rejected by the backend")]
    Unauthorized,

    #[error("not found")]
    NotFound,

    #[error("backend rejected the request ({status}): {message}")]
    Api { status: u16, message: String },
}

#[derive(Deserialize)]
struct ApiMessage {
    message: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// HTTP client for the photo-sharing backend's REST surface.
///
/// One `Backend` per app session. Authenticated calls attach the session
/// credential as a bearer header; calls made without a credential are sent
/// plain, matching how the pages behave for logged-out viewers.
pub struct Backend {
    client: reqwest::Client,
    base_url: String,
    credential: Option<String>,
}

impl Backend {
    pub fn unauthenticated(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            credential: None,
        }
    }

    pub fn with_credential(base_url: &str, credential: &str) -> Self {
        let mut backend = Self::unauthenticated(base_url);
        backend.credential = Some(credential.to_owned());
        backend
    }

    pub fn set_credential(&mut self, credential: Option<String>) {
        self.credential = credential;
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Validate `credential` against `/api/checkauth`.
    ///
    /// Takes the credential explicitly rather than using the session one:
    /// the session guard validates whatever is currently in its store.
    pub async fn check_auth(&self, credential: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .post(format!("{}/api/checkauth", self.base_url))
            .bearer_auth(credential)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            _ => Err(Self::error_from(response).await),
        }
    }

    /// Exchange credentials for a bearer token via `/api/login`.
    pub async fn log_in(&self, email: &str, password: &str) -> Result<String, BackendError> {
        let response = self
            .request("/api/login")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        Ok(response.json::<TokenResponse>().await?.token)
    }

    /// Create an account via `/api/users`. Verification happens out of band
    /// through the email flow.
    pub async fn register(&self, registration: &Registration) -> Result<(), BackendError> {
        let response = self
            .request("/api/users")
            .json(registration)
            .send()
            .await?;

        self.expect_success(response).await
    }

    /// Confirm an email address via `/api/verify`.
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<(), BackendError> {
        let response = self
            .request("/api/verify")
            .json(&json!({ "email": email, "verification_code": code }))
            .send()
            .await?;

        self.expect_success(response).await
    }

    /// Fetch a post with viewer-scoped liked/saved flags.
    pub async fn post_info(&self, slug: i64) -> Result<PostInfo, BackendError> {
        let response = self
            .request("/api/getpostinfo")
            .json(&json!({ "slug": slug }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        Ok(response.json().await?)
    }

    pub async fn add_like(&self, slug: i64) -> Result<(), BackendError> {
        self.toggle("/api/addlike", slug).await
    }

    pub async fn remove_like(&self, slug: i64) -> Result<(), BackendError> {
        self.toggle("/api/removelike", slug).await
    }

    pub async fn save_post(&self, slug: i64) -> Result<(), BackendError> {
        self.toggle("/api/save", slug).await
    }

    pub async fn unsave_post(&self, slug: i64) -> Result<(), BackendError> {
        self.toggle("/api/unsave", slug).await
    }

    /// List the viewer's saved posts. The backend signals an empty list with
    /// HTTP 404, which is mapped to an empty vector here.
    pub async fn saved_posts(&self) -> Result<Vec<SavedPost>, BackendError> {
        let response = self.request("/api/getsavedposts").send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        Ok(response.json().await?)
    }

    /// Publish a post immediately. `url` points at the already-uploaded
    /// attachment.
    pub async fn create_post(&self, caption: &str, url: &str) -> Result<(), BackendError> {
        let response = self
            .request("/api/createpost")
            .json(&json!({ "caption": caption, "url": url }))
            .send()
            .await?;

        self.expect_success(response).await
    }

    /// Queue a post for publication at `scheduled_time`.
    pub async fn create_scheduled_post(
        &self,
        caption: &str,
        url: &str,
        scheduled_time: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        let response = self
            .request("/api/createscheduledpost")
            .json(&json!({
                "caption": caption,
                "url": url,
                "scheduledTime": scheduled_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            }))
            .send()
            .await?;

        self.expect_success(response).await
    }

    async fn toggle(&self, path: &str, slug: i64) -> Result<(), BackendError> {
        debug!("Toggling {path} for post {slug}");

        let response = self
            .request(path)
            .json(&json!({ "slug": slug }))
            .send()
            .await?;

        self.expect_success(response).await
    }

    fn request(&self, path: &str) -> RequestBuilder {
        let mut request = self.client.post(format!("{}{}", self.base_url, path));

        if let Some(credential) = &self.credential {
            request = request.bearer_auth(credential);
        }

        request
    }

    async fn expect_success(&self, response: Response) -> Result<(), BackendError> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_from(response).await)
        }
    }

    async fn error_from(response: Response) -> BackendError {
        let status = response.status();

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Unauthorized,
            StatusCode::NOT_FOUND => BackendError::NotFound,
            _ => {
                // Surface the backend's own message where one is plumbed through.
                let message = match response.json::<ApiMessage>().await {
                    Ok(body) => body.message,
                    Err(_) => "request rejected by the backend".to_owned(),
                };

                BackendError::Api {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }
}
