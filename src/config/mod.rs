pub mod service;

pub use service::{RetrySettings, ServiceConfig};
