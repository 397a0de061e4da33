// Chirp domain model and storage port.
//
// Only the moderation-relevant slice of the entity lives here; profile
// data, relations and rendering belong to the web layer.

use crate::core::moderation::ModerationState;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// A short text message. Created `Pending` and only visible to readers once
/// the moderation pipeline approves it.
#[derive(Debug, Clone, PartialEq)]
pub struct Chirp {
    pub id: i64,
    pub user_id: i64,
    pub message: String,
    pub state: ModerationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chirp {
    /// Readers only ever see approved chirps.
    #[allow(dead_code)]
    pub fn is_visible(&self) -> bool {
        self.state.is_approved()
    }
}

#[derive(Debug, Error)]
pub enum ChirpStoreError {
    #[error("Storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait ChirpStore: Send + Sync {
    /// Insert a new chirp in `Pending` state and return it.
    async fn create(&self, user_id: i64, message: &str) -> Result<Chirp, ChirpStoreError>;

    async fn get(&self, chirp_id: i64) -> Result<Option<Chirp>, ChirpStoreError>;

    /// Replace the message text. Moderation columns are untouched; callers
    /// reset the state separately.
    async fn update_message(&self, chirp_id: i64, message: &str) -> Result<(), ChirpStoreError>;

    /// Write the moderation columns for a chirp. Setting `Pending` clears
    /// reason and timestamp; anything else sets both.
    async fn set_moderation_state(
        &self,
        chirp_id: i64,
        state: &ModerationState,
    ) -> Result<(), ChirpStoreError>;

    /// Approved chirps, newest first.
    async fn list_approved(&self, limit: i64) -> Result<Vec<Chirp>, ChirpStoreError>;

    /// Chirps still awaiting moderation, oldest first. Used by the worker
    /// sweep so a restart never strands anything in `Pending`.
    async fn list_pending(&self) -> Result<Vec<Chirp>, ChirpStoreError>;
}
