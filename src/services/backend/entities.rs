use serde::{Deserialize, Serialize};

/// Viewer-scoped details of a single post, as returned by `/api/getpostinfo`.
/// The liked/saved flags are only meaningful when the request carried a
/// credential.
#[derive(Deserialize, Debug, Clone)]
pub struct PostInfo {
    pub username: String,
    pub image_url: String,
    pub caption: String,
    pub initials: String,
    #[serde(rename = "isliked")]
    pub is_liked: bool,
    #[serde(rename = "issaved", default)]
    pub is_saved: bool,
    #[serde(rename = "likecount")]
    pub like_count: i64,
}

/// One entry of the viewer's saved-posts listing.
#[derive(Deserialize, Debug, Clone)]
pub struct SavedPost {
    pub id: i64,
    #[serde(rename = "isSaved")]
    pub is_saved: bool,
    #[serde(rename = "isLiked")]
    pub is_liked: bool,
    pub attachment_url: String,
    pub caption: String,
    pub username: String,
    pub initials: String,
    #[serde(rename = "likecount")]
    pub like_count: i64,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    Poster,
    #[default]
    #[serde(other)]
    Viewer,
}

/// Registration form submitted to `/api/users`.
#[derive(Serialize, Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub username: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub role: Role,
}
