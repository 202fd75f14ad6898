//! Filter configuration and its file formats.
//!
//! [`FilterConfig`] selects everything about a filter that is not problem specific: the
//! particle count, the resampling threshold, the seed, and the built-in estimation and
//! resampling strategies. It can be written to and read from JSON, YAML or TOML.
//!
//! ```
//! use smc::config::FilterConfig;
//! use smc::{ParticleAveragingStrategy, ParticleResamplingStrategy};
//!
//! let cfg = FilterConfig {
//!     num_particles: 2000,
//!     neff_threshold: 0.5,
//!     seed: Some(42),
//!     resampling: ParticleResamplingStrategy::Systematic,
//!     estimation: ParticleAveragingStrategy::WeightedAverage,
//! };
//! assert!(cfg.validate().is_ok());
//! ```
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::error::{FilterError, Result};
use crate::estimation::ParticleAveragingStrategy;
use crate::filter::DEFAULT_NEFF_THRESHOLD;
use crate::resampling::ParticleResamplingStrategy;

fn default_num_particles() -> usize {
    1000
}

fn default_neff_threshold() -> f64 {
    DEFAULT_NEFF_THRESHOLD
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Population size, fixed for the lifetime of the filter.
    #[serde(default = "default_num_particles")]
    pub num_particles: usize,

    /// Fraction of `num_particles` below which the effective sample size triggers resampling
    /// at the start of the next update. Must lie in `(0, 1]`.
    #[serde(default = "default_neff_threshold")]
    pub neff_threshold: f64,

    /// Random number generator seed. `None` seeds from system entropy; use a fixed seed to
    /// repeat a run exactly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(default)]
    pub resampling: ParticleResamplingStrategy,

    #[serde(default)]
    pub estimation: ParticleAveragingStrategy,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            num_particles: default_num_particles(),
            neff_threshold: default_neff_threshold(),
            seed: None,
            resampling: ParticleResamplingStrategy::default(),
            estimation: ParticleAveragingStrategy::default(),
        }
    }
}

impl FilterConfig {
    /// Reject configurations no filter should be built from.
    pub fn validate(&self) -> Result<()> {
        if self.num_particles == 0 {
            return Err(FilterError::InvalidConfig(
                "num_particles must be positive".to_string(),
            ));
        }
        if !(self.neff_threshold > 0.0 && self.neff_threshold <= 1.0) {
            return Err(FilterError::InvalidConfig(format!(
                "neff_threshold must lie in (0, 1], got {}",
                self.neff_threshold
            )));
        }
        Ok(())
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        self.write_as(path.as_ref(), ConfigFormat::Json)
    }

    pub fn from_json<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::read_as(path.as_ref(), ConfigFormat::Json)
    }

    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        self.write_as(path.as_ref(), ConfigFormat::Yaml)
    }

    pub fn from_yaml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::read_as(path.as_ref(), ConfigFormat::Yaml)
    }

    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        self.write_as(path.as_ref(), ConfigFormat::Toml)
    }

    pub fn from_toml<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::read_as(path.as_ref(), ConfigFormat::Toml)
    }

    /// Write in the format named by the file extension (.json/.yaml/.yml/.toml).
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();
        self.write_as(path, ConfigFormat::from_path(path)?)
    }

    /// Read in the format named by the file extension (.json/.yaml/.yml/.toml).
    ///
    /// The loaded values are not validated; [`ParticleFilter::from_config`] does that.
    ///
    /// [`ParticleFilter::from_config`]: crate::ParticleFilter::from_config
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        Self::read_as(path, ConfigFormat::from_path(path)?)
    }

    fn write_as(&self, path: &Path, format: ConfigFormat) -> io::Result<()> {
        let text = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self).map_err(io::Error::other),
            ConfigFormat::Yaml => serde_yaml::to_string(self).map_err(io::Error::other),
            ConfigFormat::Toml => toml::to_string(self).map_err(io::Error::other),
        }?;
        fs::write(path, text)
    }

    fn read_as(path: &Path, format: ConfigFormat) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        let parsed = match format {
            ConfigFormat::Json => serde_json::from_str(&text).map_err(|e| e.to_string()),
            ConfigFormat::Yaml => serde_yaml::from_str(&text).map_err(|e| e.to_string()),
            ConfigFormat::Toml => toml::from_str(&text).map_err(|e| e.to_string()),
        };
        parsed.map_err(|reason| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed {format:?} filter config {}: {reason}", path.display()),
            )
        })
    }
}

/// On-disk encodings of a [`FilterConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> io::Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match ext.as_deref() {
            Some("json") => Ok(ConfigFormat::Json),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "filter config {} has no .json, .yaml, .yml or .toml extension",
                    path.display()
                ),
            )),
        }
    }
}
