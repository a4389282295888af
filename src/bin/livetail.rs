use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use tokio_stream::StreamExt;
use tokio_tungstenite::tungstenite;

use lumagram::services::backend::{self, LikeEventKind};

/// Tail the backend's live like-event stream and print every event.
#[derive(Parser, Debug)]
struct Args {
    /// Websocket URL of the live stream
    #[arg(default_value = "ws://localhost:5000/live")]
    url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut stream = backend::subscribe_to_like_events(&args.url).await?;

    while let Some(message) = stream.try_next().await? {
        let tungstenite::Message::Text(text) = message else {
            continue;
        };

        match backend::handle_message(&text) {
            Ok(Some(event)) => match event.kind {
                LikeEventKind::Added => {
                    info!("post {}: +1 (user {})", event.post_id, event.user_id)
                }
                LikeEventKind::Removed => {
                    info!("post {}: -1 (user {})", event.post_id, event.user_id)
                }
            },
            Ok(None) => continue,
            Err(e) => error!("Error handling a message: {:?}", e),
        }
    }

    Ok(())
}
