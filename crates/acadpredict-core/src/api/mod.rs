//! REST API client module for the prediction service.
//!
//! This module provides the `ApiClient` for talking to the service, the
//! `Transport` seam it sends through, and the two interceptors every
//! authenticated call passes:
//! - `RequestGate`: refuses to send with a token already known to be expired
//! - `ResponseSentinel`: ends the session when the server answers 401
//!
//! Both interceptors send the user to the same re-authentication route
//! through a `Navigator`.

pub mod client;
pub mod error;
pub mod gate;
pub mod navigator;
pub mod sentinel;
pub mod transport;

pub use client::ApiClient;
pub use error::ApiError;
pub use gate::RequestGate;
pub use navigator::{Navigator, RecordingNavigator, REAUTH_ROUTE};
pub use sentinel::ResponseSentinel;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};
