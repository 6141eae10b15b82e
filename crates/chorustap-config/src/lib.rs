mod error;
mod tap;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use tap::{resolve_env, StateBackend, StateConfig, TapConfig, CONFIG_FILE, TEMPLATE};
pub use validation::{state_settings, validate, Settings, StateSettings};
