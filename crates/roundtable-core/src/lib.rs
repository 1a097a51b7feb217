pub mod breakout;
pub mod bus;
pub mod config;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod policy;
pub mod session;
pub mod turn;

// Re-export common error types
pub use error::{CoreError, ErrorCategory, ErrorContext, Result};
