// Chirp domain module - the message entity and its submission surface.

pub mod chirp_models;
pub mod chirp_service;

pub use chirp_models::*;
pub use chirp_service::*;
