use std::ops::Deref;
use std::str::FromStr;

use config::{Config, Environment};
use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::options::PluginOptions;
use crate::Result;

/// Plugin options with this prefix configure the bridge itself.
pub const OPTION_PREFIX: &str = "bridge_";

/// Environment variables with this prefix configure the bridge itself.
pub const ENV_PREFIX: &str = "MOSQ_BRIDGE";

/// Bridge configuration read per instance. `log_level` is only applied by the instance that
/// starts the runtime; later instances log that theirs is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "Settings::log_level_default")]
    pub log_level: Level,
    #[serde(default = "Settings::catch_panics_default")]
    pub catch_panics: bool,
}

impl Default for Settings {
    #[inline]
    fn default() -> Self {
        Self { log_level: Self::log_level_default(), catch_panics: Self::catch_panics_default() }
    }
}

impl Settings {
    /// Defaults, then `MOSQ_BRIDGE_*` environment variables, then `bridge_*` plugin options.
    pub fn from_options(opts: &PluginOptions) -> Result<Self> {
        let mut builder = Config::builder().add_source(Environment::with_prefix(ENV_PREFIX));
        for (key, value) in opts.iter() {
            if let Some(key) = key.strip_prefix(OPTION_PREFIX) {
                builder = builder.set_override(key.to_ascii_lowercase(), value)?;
            }
        }
        let settings: Settings = builder.build()?.try_deserialize()?;
        log::debug!("bridge settings: {:?}", settings);
        Ok(settings)
    }

    #[inline]
    fn log_level_default() -> Level {
        Level { inner: log::LevelFilter::Info }
    }

    #[inline]
    fn catch_panics_default() -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Level {
    inner: log::LevelFilter,
}

impl Level {
    #[inline]
    pub fn inner(&self) -> log::LevelFilter {
        self.inner
    }
}

impl Deref for Level {
    type Target = log::LevelFilter;
    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<'de> Deserialize<'de> for Level {
    #[inline]
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level = String::deserialize(deserializer)?;
        let level = log::LevelFilter::from_str(level.trim())
            .map_err(|_e| de::Error::custom(format!("invalid log level `{}`", level)))?;
        Ok(Level { inner: level })
    }
}
