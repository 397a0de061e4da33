// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "cache/counter_store.rs"]
pub mod cache;

#[path = "chirps/mod.rs"]
pub mod chirps;

#[path = "jobs/job_queue.rs"]
pub mod jobs;

#[path = "moderation/mod.rs"]
pub mod moderation;

#[path = "quota/quota_service.rs"]
pub mod quota;

#[path = "throttle/throttle_service.rs"]
pub mod throttle;
