//! API Module
//!
//! HTTP surface of the provider protocol.

pub mod rest;
pub mod server;

pub use rest::{ApiErrorResponse, RestRouter};
pub use server::ApiServer;
