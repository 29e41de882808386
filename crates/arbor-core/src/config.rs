//! Store-wide runtime configuration.

use crate::errors::{ArborError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Environment variable consulted by [`Config::from_env`].
pub const ENV_AUTO_TYPE_CHECKING: &str = "ARBOR_AUTO_TYPE_CHECKING";

/// When model props are type-checked automatically on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoTypeChecking {
    /// Checked in debug builds only
    #[default]
    DevModeOnly,
    AlwaysOn,
    AlwaysOff,
}

impl AutoTypeChecking {
    pub fn enabled(self) -> bool {
        match self {
            AutoTypeChecking::DevModeOnly => cfg!(debug_assertions),
            AutoTypeChecking::AlwaysOn => true,
            AutoTypeChecking::AlwaysOff => false,
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dev_mode_only" | "dev" => Some(AutoTypeChecking::DevModeOnly),
            "always_on" | "always" | "on" | "true" => Some(AutoTypeChecking::AlwaysOn),
            "always_off" | "never" | "off" | "false" => Some(AutoTypeChecking::AlwaysOff),
            _ => None,
        }
    }
}

/// Generator for fresh model ids.
pub type IdGenerator = Rc<dyn Fn() -> String>;

fn default_id_generator() -> IdGenerator {
    Rc::new(|| uuid::Uuid::now_v7().to_string())
}

/// Runtime configuration for a [`Store`](crate::Store).
#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub auto_type_checking: AutoTypeChecking,
    #[serde(skip, default = "default_id_generator")]
    model_id_generator: IdGenerator,
}

impl Config {
    pub fn new() -> Self {
        Self {
            auto_type_checking: AutoTypeChecking::default(),
            model_id_generator: default_id_generator(),
        }
    }

    pub fn with_auto_type_checking(mut self, mode: AutoTypeChecking) -> Self {
        self.auto_type_checking = mode;
        self
    }

    /// Replace the model id generator (the default yields UUIDv7 strings).
    pub fn with_model_id_generator(mut self, generator: impl Fn() -> String + 'static) -> Self {
        self.model_id_generator = Rc::new(generator);
        self
    }

    /// Build a config from defaults overridden by `ARBOR_AUTO_TYPE_CHECKING`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` when the variable holds an unrecognised mode.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new();
        if let Ok(raw) = std::env::var(ENV_AUTO_TYPE_CHECKING) {
            config.auto_type_checking =
                AutoTypeChecking::parse(&raw).ok_or_else(|| ArborError::InvalidConfig {
                    reason: format!("{}={} is not a known mode", ENV_AUTO_TYPE_CHECKING, raw),
                })?;
        }
        Ok(config)
    }

    pub fn type_checking_enabled(&self) -> bool {
        self.auto_type_checking.enabled()
    }

    pub fn generate_model_id(&self) -> String {
        (self.model_id_generator)()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("auto_type_checking", &self.auto_type_checking)
            .finish_non_exhaustive()
    }
}
