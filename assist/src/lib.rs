pub mod config;
pub mod error;
pub mod session;

pub use config::AssistConfig;
pub use error::{AssistError, ConfigError};
pub use session::{AssistSession, RequestToken};
