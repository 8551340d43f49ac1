//! Request routing for the copydesk service.
//!
//! The contract is method + path + body, agnostic of transport: the same
//! dispatch serves an HTTP front end or a local driver. Every mutating
//! route resolves a session first, then delegates to the content engine or
//! session manager, and every error is translated to a structured response
//! at this boundary.

pub mod config;
pub mod error;
pub mod request;
pub mod service;

pub use config::{ConfigError, ServiceConfig};
pub use error::ApiError;
pub use request::{Request, Response};
pub use service::{Service, ServiceInitError};

pub fn crate_info() -> &'static str {
    "copydesk-api v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("api"));
    }
}
