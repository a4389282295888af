use anyhow::{ensure, Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use super::entities::Role;

/// Claims the pages read out of the bearer token.
#[derive(Deserialize, Debug, Clone)]
pub struct TokenPayload {
    pub username: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    #[serde(default)]
    pub role: Role,
}

impl TokenPayload {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn initials(&self) -> String {
        self.first_name
            .chars()
            .take(1)
            .chain(self.last_name.chars().take(1))
            .collect()
    }
}

/// Decode the payload segment of a bearer token for display purposes.
///
/// The signature is NOT verified. Anything decoded here is untrusted and
/// must never gate access; authorization goes through `Backend::check_auth`.
pub fn decode_payload(token: &str) -> Result<TokenPayload> {
    let segments: Vec<&str> = token.split('.').collect();
    ensure!(segments.len() == 3, "token does not have three segments");

    let bytes = URL_SAFE_NO_PAD
        .decode(segments[1])
        .context("token payload is not valid base64")?;

    serde_json::from_slice(&bytes).context("token payload is not valid JSON")
}
