//! Data models for the prediction service API.
//!
//! Field names follow the server's JSON (Spanish) through serde renames;
//! the Rust side uses English names.

pub mod prediction;
pub mod user;

pub use prediction::{PredictionRecord, Stats};
pub use user::{LoginRequest, LoginResponse, RegisterRequest, UserProfile};
