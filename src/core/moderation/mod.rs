// Moderation module - verdicts, fallback rules, and the pipeline that
// turns pending chirps into approved or rejected ones.

pub mod moderate_job;
pub mod moderation_models;
pub mod moderation_service;
pub mod rules;

pub use moderate_job::*;
pub use moderation_models::*;
pub use moderation_service::*;
