// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "ai/gemini_client.rs"]
pub mod ai;

#[path = "cache/memory_store.rs"]
pub mod cache;

#[path = "chirps/sqlite_store.rs"]
pub mod chirps;

#[path = "jobs/worker.rs"]
pub mod jobs;
