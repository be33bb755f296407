//! Typed client for the brand dashboard's RPC API and the bulk import review
//! workflow built on top of it.

pub mod client;
pub mod error;
pub(crate) mod retry;
pub mod review;
pub mod service;
pub mod types;

pub use client::PassportClient;
pub use error::ApiError;
pub use review::{ImportReview, Resolution, ReviewError, ReviewStage};
pub use service::ImportService;
pub use types::{DefinedValue, PendingEntity};
