pub mod errors;
pub mod id;

pub use errors::{ConbridgeError, ConfigError};
pub use id::SessionId;

pub type Result<T> = std::result::Result<T, ConbridgeError>;
