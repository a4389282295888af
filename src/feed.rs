use log::{debug, warn};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

use crate::services::backend::{
    Backend, BackendError, LikeEvent, LikeEventKind, LiveChannel, SavedPost,
};

/// A post as the viewer sees it.
///
/// The like count is only ever touched by the initial fetch, the viewer's
/// own confirmed toggle, or an applied [`LikeEvent`].
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: i64,
    pub username: String,
    pub initials: String,
    pub caption: String,
    pub attachment_url: String,
    pub like_count: i64,
    pub is_liked: bool,
    pub is_saved: bool,
}

impl From<SavedPost> for Post {
    fn from(saved: SavedPost) -> Self {
        Self {
            id: saved.id,
            username: saved.username,
            initials: saved.initials,
            caption: saved.caption,
            attachment_url: saved.attachment_url,
            like_count: saved.like_count,
            is_liked: saved.is_liked,
            is_saved: saved.is_saved,
        }
    }
}

/// The in-memory post list behind a page, plus the viewer's identity.
///
/// Both the toggle calls and the live channel write into this state; each
/// update is one read-modify-write step on `&mut self`, so interleavings
/// within a task are safe without further locking.
pub struct Feed {
    viewer_id: i64,
    posts: Vec<Post>,
}

impl Feed {
    pub fn new(viewer_id: i64) -> Self {
        Self {
            viewer_id,
            posts: Vec::new(),
        }
    }

    pub fn with_posts(viewer_id: i64, posts: Vec<Post>) -> Self {
        Self { viewer_id, posts }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn post(&self, post_id: i64) -> Option<&Post> {
        self.posts.iter().find(|post| post.id == post_id)
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Replace the feed's contents with the viewer's saved posts. An empty
    /// listing (the backend's 404) leaves an empty feed.
    pub async fn load_saved(&mut self, backend: &Backend) -> Result<(), BackendError> {
        let saved = backend.saved_posts().await?;
        self.posts = saved.into_iter().map(Post::from).collect();

        Ok(())
    }

    /// Toggle the viewer's like on a post, picking the add or remove
    /// endpoint from the current flag. Local state changes only after the
    /// backend confirms; on failure nothing is touched and the error is
    /// returned. At most one in-flight toggle per post is on the caller.
    pub async fn toggle_like(
        &mut self,
        backend: &Backend,
        post_id: i64,
    ) -> Result<(), BackendError> {
        let Some(index) = self.posts.iter().position(|post| post.id == post_id) else {
            debug!("Ignoring a like toggle for unknown post {post_id}");
            return Ok(());
        };

        if self.posts[index].is_liked {
            backend.remove_like(post_id).await?;

            let post = &mut self.posts[index];
            post.is_liked = false;
            post.like_count -= 1;
        } else {
            backend.add_like(post_id).await?;

            let post = &mut self.posts[index];
            post.is_liked = true;
            post.like_count += 1;
        }

        Ok(())
    }

    /// Toggle the viewer's save on a post. Same contract as
    /// [`Feed::toggle_like`], minus the count.
    pub async fn toggle_save(
        &mut self,
        backend: &Backend,
        post_id: i64,
    ) -> Result<(), BackendError> {
        let Some(index) = self.posts.iter().position(|post| post.id == post_id) else {
            debug!("Ignoring a save toggle for unknown post {post_id}");
            return Ok(());
        };

        if self.posts[index].is_saved {
            backend.unsave_post(post_id).await?;
            self.posts[index].is_saved = false;
        } else {
            backend.save_post(post_id).await?;
            self.posts[index].is_saved = true;
        }

        Ok(())
    }

    /// Reconcile a broadcast like event into the matching post's count.
    ///
    /// The viewer's own echoes are ignored: their toggle was already applied
    /// through the REST response, and counting the echo too would double it.
    /// Events for posts not in this feed are dropped. Deltas commute, so
    /// arrival order does not matter.
    pub fn apply_like_event(&mut self, event: &LikeEvent) {
        if event.user_id == self.viewer_id {
            return;
        }

        let Some(post) = self.posts.iter_mut().find(|post| post.id == event.post_id) else {
            return;
        };

        match event.kind {
            LikeEventKind::Added => post.like_count += 1,
            LikeEventKind::Removed => post.like_count -= 1,
        }
    }
}

/// One mounted page: a feed paired with its live subscription.
///
/// Subscribing happens on mount; dropping the session unregisters the
/// receiver, so mounting and unmounting repeatedly leaves only the live
/// instance registered.
pub struct FeedSession {
    feed: Feed,
    events: broadcast::Receiver<LikeEvent>,
}

impl FeedSession {
    pub fn mount(feed: Feed, channel: &LiveChannel) -> Self {
        Self {
            feed,
            events: channel.subscribe(),
        }
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    pub fn feed_mut(&mut self) -> &mut Feed {
        &mut self.feed
    }

    /// Drain every event received since the last call and fold it into the
    /// feed.
    pub fn sync(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.feed.apply_like_event(&event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Live channel lagged, {skipped} like events were dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }
}
