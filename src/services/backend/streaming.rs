use std::pin::pin;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_stream::{Stream, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite};

pub const STREAMING_TIMEOUT: Duration = Duration::from_secs(60);

const RECONNECT_DELAY: Duration = Duration::from_secs(10);

const EVENT_ADD_LIKE: &str = "add-like";
const EVENT_REMOVE_LIKE: &str = "remove-like";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeEventKind {
    Added,
    Removed,
}

/// A like toggled by some viewer, broadcast to every subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeEvent {
    pub kind: LikeEventKind,
    pub post_id: i64,
    pub user_id: i64,
}

#[derive(Deserialize)]
struct Frame {
    event: String,
    data: FramePayload,
}

#[derive(Deserialize)]
struct FramePayload {
    post_id: i64,
    user_id: i64,
}

/// Subscribe to the backend's live like-event stream.
pub async fn subscribe_to_like_events(
    url: &str,
) -> Result<impl Stream<Item = Result<tungstenite::Message, tungstenite::Error>>> {
    let (stream, _) = connect_async(url).await?;
    let stream = Box::pin(stream);

    Ok(stream)
}

/// Parse one text frame off the stream. Frames with unknown event names are
/// ignored; malformed frames are an error.
pub fn handle_message(message: &str) -> Result<Option<LikeEvent>> {
    let frame: Frame = serde_json::from_str(message).context("malformed like-event frame")?;

    let kind = match frame.event.as_str() {
        EVENT_ADD_LIKE => LikeEventKind::Added,
        EVENT_REMOVE_LIKE => LikeEventKind::Removed,
        _ => return Ok(None),
    };

    Ok(Some(LikeEvent {
        kind,
        post_id: frame.data.post_id,
        user_id: frame.data.user_id,
    }))
}

/// One live connection per app session, owned explicitly by whoever built
/// it and handed to the pages that need it.
///
/// Pages subscribe on mount and unregister by dropping the receiver on
/// unmount, so remounting never accumulates stale handlers. Events that
/// arrive while nobody is subscribed are dropped.
pub struct LiveChannel {
    url: String,
    tx: broadcast::Sender<LikeEvent>,
}

impl LiveChannel {
    pub fn new(url: &str) -> Self {
        let (tx, _) = broadcast::channel(64);

        Self {
            url: url.to_owned(),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LikeEvent> {
        self.tx.subscribe()
    }

    /// Number of currently registered subscriptions.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    #[cfg(test)]
    pub(crate) fn publish_for_tests(&self, event: LikeEvent) {
        let _ = self.tx.send(event);
    }

    /// Drive the connection forever, reconnecting after transport failures.
    /// Reconnection is invisible to subscribers; their receivers stay valid
    /// across it.
    pub async fn run(&self) -> Result<()> {
        info!("Starting");

        loop {
            if let Err(e) = self.read_until_disconnected().await {
                error!("Live channel stopped because of an error: {}", e);
            }

            info!("Waiting {:?} before reconnecting...", RECONNECT_DELAY);

            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn read_until_disconnected(&self) -> Result<()> {
        let mut stream = pin!(subscribe_to_like_events(&self.url)
            .await
            .context("failed to subscribe")?
            .timeout(STREAMING_TIMEOUT));

        while let Some(Ok(message)) = stream.try_next().await? {
            let tungstenite::Message::Text(text) = message else {
                continue;
            };

            match handle_message(&text) {
                Ok(Some(event)) => {
                    // A send error just means nobody is mounted right now.
                    let _ = self.tx.send(event);
                }
                Ok(None) => continue,
                Err(e) => warn!("Error handling a message: {:?}", e),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add_like_frames() {
        let event = handle_message(r#"{"event":"add-like","data":{"post_id":7,"user_id":3}}"#)
            .unwrap()
            .unwrap();

        assert_eq!(event.kind, LikeEventKind::Added);
        assert_eq!(event.post_id, 7);
        assert_eq!(event.user_id, 3);
    }

    #[test]
    fn parses_remove_like_frames() {
        let event = handle_message(r#"{"event":"remove-like","data":{"post_id":7,"user_id":3}}"#)
            .unwrap()
            .unwrap();

        assert_eq!(event.kind, LikeEventKind::Removed);
    }

    #[test]
    fn ignores_unknown_events() {
        let parsed =
            handle_message(r#"{"event":"new-comment","data":{"post_id":7,"user_id":3}}"#).unwrap();

        assert!(parsed.is_none());
    }

    #[test]
    fn malformed_frames_are_an_error() {
        assert!(handle_message("not json").is_err());
        assert!(handle_message(r#"{"event":"add-like"}"#).is_err());
    }

    #[tokio::test]
    async fn dropping_receivers_unregisters_them() {
        let channel = LiveChannel::new("ws://localhost:5000/live");
        assert_eq!(channel.receiver_count(), 0);

        // Mount and unmount a few times; only live receivers stay counted.
        for _ in 0..3 {
            let receiver = channel.subscribe();
            assert_eq!(channel.receiver_count(), 1);
            drop(receiver);
        }

        assert_eq!(channel.receiver_count(), 0);
    }

    #[tokio::test]
    async fn events_fan_out_to_every_subscriber() {
        let channel = LiveChannel::new("ws://localhost:5000/live");
        let mut first = channel.subscribe();
        let mut second = channel.subscribe();

        let event = LikeEvent {
            kind: LikeEventKind::Added,
            post_id: 1,
            user_id: 2,
        };
        channel.tx.send(event).unwrap();

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }
}
