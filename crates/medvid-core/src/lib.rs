pub mod config;
pub mod error;
pub mod types;

pub use config::MedvidConfig;
pub use error::{MedvidError, Result};
pub use types::*;
