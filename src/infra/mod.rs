//! Infrastructure adapters and runtime bootstrap.

pub mod api_client;
pub mod error;
pub mod http;
pub mod remote_host;
pub mod telemetry;
