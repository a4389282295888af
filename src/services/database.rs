use std::ops::Deref;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

/// A schedule entry waiting for its publish time.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ScheduledPost {
    pub id: i64,
    pub user_id: i64,
    pub caption: String,
    pub attachment_url: String,
    pub scheduled_at: DateTime<Utc>,
}

/// A published post row. `scheduled_post_id` records which schedule entry
/// produced it, when any; it is the idempotency key for promotion.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StoredPost {
    pub id: i64,
    pub user_id: i64,
    pub caption: String,
    pub attachment_url: String,
    pub created_at: DateTime<Utc>,
    pub scheduled_post_id: Option<i64>,
}

/// The promoter's view of storage.
#[async_trait]
pub trait ScheduleStore {
    /// Entries with `scheduled_at` at or before `now`, oldest first.
    async fn fetch_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ScheduledPost>>;

    /// Publish `entry` and remove it from the schedule, atomically.
    ///
    /// Must be idempotent: promoting the same entry twice yields exactly
    /// one post.
    async fn promote(&self, entry: &ScheduledPost) -> Result<()>;
}

pub struct Database {
    connection_pool: PgPool,
}

impl Deref for Database {
    type Target = PgPool;

    fn deref(&self) -> &Self::Target {
        &self.connection_pool
    }
}

impl Database {
    pub async fn connect(url: &str) -> Result<Self> {
        Ok(Self {
            connection_pool: PgPoolOptions::new().max_connections(5).connect(url).await?,
        })
    }

    pub async fn insert_scheduled_post(
        &self,
        user_id: i64,
        caption: &str,
        attachment_url: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO scheduled_posts (user_id, caption, attachment_url, scheduled_at)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(user_id)
        .bind(caption)
        .bind(attachment_url)
        .bind(scheduled_at)
        .fetch_one(&self.connection_pool)
        .await?;

        Ok(id)
    }

    pub async fn fetch_post_for_schedule(&self, schedule_id: i64) -> Result<Option<StoredPost>> {
        Ok(sqlx::query_as(
            "SELECT id, user_id, caption, attachment_url, created_at, scheduled_post_id
             FROM posts
             WHERE scheduled_post_id = $1",
        )
        .bind(schedule_id)
        .fetch_optional(&self.connection_pool)
        .await?)
    }
}

#[async_trait]
impl ScheduleStore for Database {
    async fn fetch_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ScheduledPost>> {
        Ok(sqlx::query_as(
            "SELECT id, user_id, caption, attachment_url, scheduled_at
             FROM scheduled_posts
             WHERE scheduled_at <= $1
             ORDER BY scheduled_at ASC
             LIMIT $2",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.connection_pool)
        .await?)
    }

    async fn promote(&self, entry: &ScheduledPost) -> Result<()> {
        // One transaction per entry: the insert and the delete land
        // together or not at all. The unique key on scheduled_post_id makes
        // a replayed insert a no-op, so a promotion interrupted between
        // commit attempts cannot duplicate the post.
        let mut transaction = self.connection_pool.begin().await?;

        sqlx::query(
            "INSERT INTO posts (user_id, caption, attachment_url, scheduled_post_id)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (scheduled_post_id) DO NOTHING",
        )
        .bind(entry.user_id)
        .bind(&entry.caption)
        .bind(&entry.attachment_url)
        .bind(entry.id)
        .execute(&mut *transaction)
        .await?;

        sqlx::query("DELETE FROM scheduled_posts WHERE id = $1")
            .bind(entry.id)
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;

        Ok(())
    }
}
