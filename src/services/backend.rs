mod client;
mod entities;
mod session;
mod streaming;
mod token;

pub use client::{Backend, BackendError};
pub use entities::{PostInfo, Registration, Role, SavedPost};
pub use session::{CredentialStore, Gate, MemoryCredentialStore, SessionGuard};
pub use streaming::{
    handle_message, subscribe_to_like_events, LikeEvent, LikeEventKind, LiveChannel,
    STREAMING_TIMEOUT,
};
pub use token::{decode_payload, TokenPayload};
