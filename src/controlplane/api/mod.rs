//! API Module
//!
//! Northbound REST API of the controller.

pub mod rest;
pub mod server;

pub use rest::{ApiError, ApiErrorResponse, RestRouter, API_PREFIX};
pub use server::{ApiServer, ApiServerConfig, DEFAULT_REST_ADDR};
