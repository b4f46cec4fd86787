pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{ConfigError, load, parse_str};
pub use models::*;
pub use validation::{StoreValidator, ValidationError, ValidationResult};
