use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, error, info};

use crate::config::Config;
use crate::services::database::ScheduleStore;

/// Recurring job that publishes due scheduled posts.
///
/// Each run scans the schedule for entries whose publish time has passed
/// and promotes them one by one, oldest first. A failed entry is logged and
/// left in place; the next run picks it up again.
pub struct PostPromoter<S> {
    store: Arc<S>,
    config: Arc<Config>,
}

impl<S> PostPromoter<S>
where
    S: ScheduleStore,
{
    pub fn new(store: Arc<S>, config: Arc<Config>) -> Self {
        Self { store, config }
    }
}

impl<S> PostPromoter<S>
where
    S: ScheduleStore,
{
    pub async fn start(self) -> Result<()> {
        info!("Starting");

        let interval = Duration::from_secs(self.config.promote_interval_seconds);

        loop {
            match self.run_once(Utc::now()).await {
                Ok(0) => debug!("No posts to publish at this time"),
                Ok(published) => info!("Successfully published {} posts", published),
                Err(e) => error!("Promotion run failed: {}", e),
            }

            tokio::time::sleep(interval).await;
        }
    }

    /// One promotion pass at `now`. Returns how many entries were
    /// published.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<usize> {
        let due = self
            .store
            .fetch_due(now, self.config.promote_batch_size)
            .await?;

        let mut published = 0;

        for entry in &due {
            match self.store.promote(entry).await {
                Ok(()) => {
                    debug!(
                        "Published scheduled post {} for user {}",
                        entry.id, entry.user_id
                    );
                    published += 1;
                }
                Err(e) => error!("Failed to publish scheduled post {}: {}", entry.id, e),
            }
        }

        Ok(published)
    }
}
