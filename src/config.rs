use serde::Deserialize;

fn default_backend_url() -> String {
    "http://localhost:5000".to_owned()
}

fn default_stream_url() -> String {
    "ws://localhost:5000/live".to_owned()
}

fn default_promote_interval_seconds() -> u64 {
    60
}

fn default_promote_batch_size() -> i64 {
    50
}

#[derive(Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    #[serde(default = "default_stream_url")]
    pub stream_url: String,
    #[serde(default = "default_promote_interval_seconds")]
    pub promote_interval_seconds: u64,
    #[serde(default = "default_promote_batch_size")]
    pub promote_batch_size: i64,
}
