use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// A fully rendered presence payload, ready for any provider to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceUpdate {
    pub details: String,
    pub state: Option<String>,
    pub large_image_key: String,
    pub large_image_text: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("presence transport failed: {0}")]
    Transport(String),
}

/// Trait for presence providers (Discord today, anything else tomorrow).
#[async_trait]
pub trait PresenceProvider: Send + Sync {
    /// Returns the name of this presence provider (for logging)
    fn name(&self) -> &'static str;

    /// Update the displayed presence
    async fn update_presence(&self, update: &PresenceUpdate) -> Result<(), PresenceError>;

    /// Clear all presence data
    async fn clear_presence(&self) -> Result<(), PresenceError>;
}
