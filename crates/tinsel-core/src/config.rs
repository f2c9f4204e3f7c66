//! Configuration loading and typed config structures for a workshop run.
//!
//! A run is described by a [`WorkshopConfig`], loaded either from a YAML
//! file or from the positional command-line form:
//!
//! ```text
//! N_GNOMES ORNAMENT_INSTALLATION_TIME_MICROSECONDS
//! ORNAMENTS_PER_DELIVERY DELIVERY_INTERVAL_MICROSECONDS N_LEVELS
//! GNOME_CAP_0 .. GNOME_CAP_{N_LEVELS-1}
//! ORNAMENT_CAP_0 .. ORNAMENT_CAP_{N_LEVELS-1}
//! ```
//!
//! Every field has a default, so a YAML file only needs the values it
//! changes. [`WorkshopConfig::validate`] must pass before anything is built.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tinsel_tree::{LevelSpec, TreeError};

/// Number of fixed positional arguments before the per-level caps.
const FIXED_ARGUMENTS: usize = 5;

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The tree shape is invalid.
    #[error("invalid tree: {source}")]
    Tree {
        /// The validation failure.
        #[from]
        source: TreeError,
    },

    /// Deliveries must carry at least one ornament.
    #[error("ornaments_per_delivery must be a positive integer")]
    EmptyDelivery,

    /// Deliveries must be spaced by a non-zero interval.
    #[error("delivery interval must be a positive number of microseconds")]
    ZeroInterval,

    /// Wrong number of positional arguments.
    #[error("expected {expected} arguments, got {found}")]
    ArgumentCount {
        /// Arguments required by `N_LEVELS`.
        expected: usize,
        /// Arguments supplied.
        found: usize,
    },

    /// A positional argument does not fit its field.
    #[error("{name} is out of range: {value}")]
    ArgumentOutOfRange {
        /// Name of the argument.
        name: String,
        /// The supplied value.
        value: u64,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level workshop configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WorkshopConfig {
    /// Worker settings.
    #[serde(default)]
    pub gnomes: GnomesConfig,

    /// Ornament producer settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Shape of the tree.
    #[serde(default)]
    pub tree: TreeConfig,

    /// Run boundaries.
    #[serde(default)]
    pub run: RunConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WorkshopConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Build a configuration from the positional argument form.
    ///
    /// `run` and `logging` keep their defaults.
    pub fn from_positional(values: &[u64]) -> Result<Self, ConfigError> {
        let Some(&[n_gnomes, installation_us, per_delivery, interval_us, n_levels]) =
            values.first_chunk::<FIXED_ARGUMENTS>()
        else {
            return Err(ConfigError::ArgumentCount {
                expected: FIXED_ARGUMENTS,
                found: values.len(),
            });
        };

        let levels = usize::try_from(n_levels)
            .ok()
            .ok_or_else(|| out_of_range("N_LEVELS", n_levels))?;
        let expected = levels
            .checked_mul(2)
            .and_then(|caps| caps.checked_add(FIXED_ARGUMENTS))
            .ok_or_else(|| out_of_range("N_LEVELS", n_levels))?;
        if values.len() != expected {
            return Err(ConfigError::ArgumentCount {
                expected,
                found: values.len(),
            });
        }

        let caps = values.get(FIXED_ARGUMENTS..).unwrap_or_default();
        let (gnome_caps, ornament_caps) = caps
            .split_at_checked(levels)
            .ok_or(ConfigError::ArgumentCount {
                expected,
                found: values.len(),
            })?;
        let levels = gnome_caps
            .iter()
            .zip(ornament_caps)
            .enumerate()
            .map(|(index, (&gnome_cap, &ornament_cap))| {
                Ok(LevelSpec {
                    gnome_cap: narrow(&format!("GNOME_CAP_{index}"), gnome_cap)?,
                    ornament_cap: narrow(&format!("ORNAMENT_CAP_{index}"), ornament_cap)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            gnomes: GnomesConfig {
                count: narrow("N_GNOMES", n_gnomes)?,
                installation_time_us: installation_us,
            },
            delivery: DeliveryConfig {
                ornaments_per_delivery: narrow("ORNAMENTS_PER_DELIVERY", per_delivery)?,
                interval_us,
            },
            tree: TreeConfig { levels },
            run: RunConfig::default(),
            logging: LoggingConfig::default(),
        })
    }

    /// Check every constraint a run relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Tree`] for an invalid gnome count or tree
    /// shape, [`ConfigError::EmptyDelivery`] or [`ConfigError::ZeroInterval`]
    /// for an unusable delivery.
    pub fn validate(&self) -> Result<(), ConfigError> {
        tinsel_tree::validate(self.gnomes.count, &self.tree.levels)?;
        if self.delivery.ornaments_per_delivery == 0 {
            return Err(ConfigError::EmptyDelivery);
        }
        if self.delivery.interval_us == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }

    /// Sum of every level's ornament capacity.
    pub fn target(&self) -> u64 {
        self.tree
            .levels
            .iter()
            .map(|level| u64::from(level.ornament_cap))
            .fold(0, u64::saturating_add)
    }
}

fn out_of_range(name: &str, value: u64) -> ConfigError {
    ConfigError::ArgumentOutOfRange {
        name: name.to_owned(),
        value,
    }
}

fn narrow(name: &str, value: u64) -> Result<u32, ConfigError> {
    u32::try_from(value)
        .ok()
        .ok_or_else(|| out_of_range(name, value))
}

/// Worker settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GnomesConfig {
    /// Number of gnomes.
    #[serde(default = "default_gnome_count")]
    pub count: u32,

    /// Time to hang one ornament, in microseconds.
    #[serde(default = "default_installation_time_us")]
    pub installation_time_us: u64,
}

impl GnomesConfig {
    /// Time to hang one ornament.
    pub const fn installation_time(&self) -> Duration {
        Duration::from_micros(self.installation_time_us)
    }
}

impl Default for GnomesConfig {
    fn default() -> Self {
        Self {
            count: default_gnome_count(),
            installation_time_us: default_installation_time_us(),
        }
    }
}

/// Ornament producer settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeliveryConfig {
    /// Ornaments released per delivery.
    #[serde(default = "default_ornaments_per_delivery")]
    pub ornaments_per_delivery: u32,

    /// Time between deliveries, in microseconds.
    #[serde(default = "default_interval_us")]
    pub interval_us: u64,
}

impl DeliveryConfig {
    /// Time between deliveries.
    pub const fn interval(&self) -> Duration {
        Duration::from_micros(self.interval_us)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            ornaments_per_delivery: default_ornaments_per_delivery(),
            interval_us: default_interval_us(),
        }
    }
}

/// Shape of the tree, bottom level first.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeConfig {
    /// Per-level capacities.
    #[serde(default = "default_levels")]
    pub levels: Vec<LevelSpec>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            levels: default_levels(),
        }
    }
}

/// Run boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Close the delivery after this many wall-clock seconds (0 = unlimited).
    #[serde(default)]
    pub max_real_time_seconds: u64,
}

impl RunConfig {
    /// The wall-clock bound, if any.
    pub const fn max_run_time(&self) -> Option<Duration> {
        if self.max_real_time_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.max_real_time_seconds))
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_gnome_count() -> u32 {
    5
}

const fn default_installation_time_us() -> u64 {
    20_000
}

const fn default_ornaments_per_delivery() -> u32 {
    2
}

const fn default_interval_us() -> u64 {
    50_000
}

fn default_levels() -> Vec<LevelSpec> {
    [(4, 3), (3, 2), (2, 2), (1, 1)]
        .into_iter()
        .map(|(gnome_cap, ornament_cap)| LevelSpec {
            gnome_cap,
            ornament_cap,
        })
        .collect()
}

fn default_log_level() -> String {
    "info".to_owned()
}
