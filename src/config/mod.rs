//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PlugConfig (validated, immutable)
//!     → PlugConfig::options() → Plug::new
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields are optional to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Config never touches targets directly; it only produces options

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{ApiConfig, ObservabilityConfig, PlugConfig, ServerConfig, TlsConfig};
pub use validation::{validate_config, ValidationError};
