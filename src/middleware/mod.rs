//! Request middleware.

pub mod instrumentation;

pub use instrumentation::{instrumentation_middleware, UNKNOWN_ENDPOINT};
