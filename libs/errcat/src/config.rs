//! Tunables for annotation templates and boundary assertions.
//!
//! Everything has a sensible default; hosts that want to tune behaviour
//! load an [`ErrcatConfig`] once and build [`Annotator`](crate::Annotator)
//! and [`Boundary`](crate::Boundary) values from it. Nothing here is global.
//!
//! Layering, lowest to highest priority:
//! 1. built-in defaults,
//! 2. an optional YAML file,
//! 3. `ERRCAT_*` environment variables, `__` separating nested keys
//!    (`ERRCAT_TEMPLATE__MISSING_KEY=zero`).

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::template::MissingKey;

/// Prefix of environment variables read by [`ErrcatConfig::load`].
pub const ENV_PREFIX: &str = "ERRCAT_";

/// Configuration error for loading errcat settings
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("errcat config file '{}' not found", path.display())]
    MissingFile { path: PathBuf },
    #[error("invalid errcat configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Load(Box::new(e))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ErrcatConfig {
    pub template: TemplateConfig,
    pub boundary: BoundaryConfig,
}

/// Annotation template settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateConfig {
    /// How references to undefined variables render.
    pub missing_key: MissingKey,
}

/// Boundary assertion settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoundaryConfig {
    /// How the assertion site's file is printed in rejection messages.
    pub location: LocationStyle,
    /// Emit a `warn` event for every rejection.
    pub log_rejections: bool,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            location: LocationStyle::FileName,
            log_rejections: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationStyle {
    /// Last path component only, e.g. `store.rs`.
    #[default]
    FileName,
    /// The path as recorded by the compiler.
    FullPath,
}

impl ErrcatConfig {
    /// Load defaults, then `path` (if given), then `ERRCAT_*` variables.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingFile` if `path` does not exist, and
    /// `ConfigError::Load` if any layer holds unknown keys or values of the
    /// wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigError::MissingFile {
                    path: path.to_path_buf(),
                });
            }
            tracing::debug!(path = %path.display(), "loading errcat config file");
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(&figment)
    }

    /// Extract from a host-provided figment.
    ///
    /// # Errors
    /// Returns `ConfigError::Load` if the figment's data does not fit.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }
}
