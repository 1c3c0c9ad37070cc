// Public modules
pub mod candidates;
pub mod environment;
pub mod error;
pub mod executor;
pub mod parameter;
pub mod pipeline;
pub mod pom;
pub mod steps;
pub mod template;
pub mod version_tag;

// Internal modules - not part of public API
pub(crate) mod http;
pub(crate) mod paths;

// Public modules for CLI access
pub mod defaults;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
