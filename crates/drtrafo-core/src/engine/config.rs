use crate::core::energy::Energy;
use crate::core::energy::thermo::{barrier_for_timescale, thermal_energy};
use crate::core::kinetics::Tolerance;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidParameter {
        parameter: &'static str,
        reason: String,
    },

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidParameter {
        parameter,
        reason: reason.into(),
    }
}

/// What happens to nodes that coarse-graining hides behind a representative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HiddenNodePolicy {
    /// Hidden nodes are deactivated and do not act as parents in the next expansion.
    #[default]
    Deactivate,
    /// Hidden nodes stay active and keep seeding the next expansion.
    KeepActive,
}

/// When a pruned local minimum hands its occupancy to its transfer targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OccupancyTransfer {
    /// Immediately, as part of `prune`.
    #[default]
    OnPrune,
    /// At the start of the next coarse-graining, unless the node is reactivated
    /// by the expansion in between.
    OnCoarseGraining,
}

/// Parameters of a [`TrafoLandscape`](super::landscape::TrafoLandscape).
#[derive(Debug, Clone, PartialEq)]
pub struct LandscapeConfig {
    /// Arrhenius pre-exponential factor `k0` in 1/s.
    pub rate_constant: f64,
    /// Barriers below this height in dcal/mol are coarse-grained away.
    pub min_barrier: Energy,
    /// Weighted pairing-match parameter forwarded to the flooding collaborator.
    pub fpwm: u32,
    /// Maximal number of base pairs the fraying search may open.
    pub max_freed_pairs: usize,
    /// Temperature in °C.
    pub temperature: f64,
    /// Prefix of generated node identities.
    pub identity_prefix: String,
    pub hidden_nodes: HiddenNodePolicy,
    pub occupancy_transfer: OccupancyTransfer,
}

impl Default for LandscapeConfig {
    fn default() -> Self {
        Self {
            rate_constant: 2e5,
            min_barrier: 0,
            fpwm: 0,
            max_freed_pairs: 6,
            temperature: 37.0,
            identity_prefix: String::new(),
            hidden_nodes: HiddenNodePolicy::default(),
            occupancy_transfer: OccupancyTransfer::default(),
        }
    }
}

impl LandscapeConfig {
    /// Thermal energy RT in kcal/mol at the configured temperature.
    pub fn rt(&self) -> f64 {
        thermal_energy(self.temperature)
    }

    /// Parses the keys of a `[landscape]` table given as a standalone document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let partial: PartialLandscapeConfig =
            toml::from_str(content).map_err(|e| ConfigError::Toml {
                path: "<inline>".to_string(),
                source: e,
            })?;
        partial.into_builder().build()
    }
}

#[derive(Default)]
pub struct LandscapeConfigBuilder {
    rate_constant: Option<f64>,
    min_barrier: Option<Energy>,
    fast_timescale: Option<f64>,
    fpwm: Option<u32>,
    max_freed_pairs: Option<usize>,
    temperature: Option<f64>,
    identity_prefix: Option<String>,
    hidden_nodes: Option<HiddenNodePolicy>,
    occupancy_transfer: Option<OccupancyTransfer>,
}

impl LandscapeConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rate_constant(mut self, k0: f64) -> Self {
        self.rate_constant = Some(k0);
        self
    }
    pub fn min_barrier(mut self, minh: Energy) -> Self {
        self.min_barrier = Some(minh);
        self
    }
    /// Derives the minimum barrier from the time scale below which
    /// transitions count as instantaneous.
    pub fn fast_timescale(mut self, t_fast: f64) -> Self {
        self.fast_timescale = Some(t_fast);
        self
    }
    pub fn fpwm(mut self, fpwm: u32) -> Self {
        self.fpwm = Some(fpwm);
        self
    }
    pub fn max_freed_pairs(mut self, mfree: usize) -> Self {
        self.max_freed_pairs = Some(mfree);
        self
    }
    pub fn temperature(mut self, celsius: f64) -> Self {
        self.temperature = Some(celsius);
        self
    }
    pub fn identity_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.identity_prefix = Some(prefix.into());
        self
    }
    pub fn hidden_nodes(mut self, policy: HiddenNodePolicy) -> Self {
        self.hidden_nodes = Some(policy);
        self
    }
    pub fn occupancy_transfer(mut self, policy: OccupancyTransfer) -> Self {
        self.occupancy_transfer = Some(policy);
        self
    }

    pub fn build(self) -> Result<LandscapeConfig, ConfigError> {
        if let Some(k0) = self.rate_constant {
            if !(k0.is_finite() && k0 > 0.0) {
                return Err(invalid("rate-constant", format!("{k0} is not a positive rate")));
            }
        }
        if let Some(celsius) = self.temperature {
            if !(celsius.is_finite() && celsius > -273.15) {
                return Err(invalid("temperature", format!("{celsius} °C is below absolute zero")));
            }
        }
        if let Some(minh) = self.min_barrier {
            if minh < 0 {
                return Err(invalid("min-barrier", "barrier height must not be negative"));
            }
            if self.fast_timescale.is_some() {
                return Err(invalid("min-barrier", "set either min-barrier or t-fast, not both"));
            }
        }
        if let Some(t_fast) = self.fast_timescale {
            if !(t_fast.is_finite() && t_fast > 0.0) {
                return Err(invalid("t-fast", format!("{t_fast} is not a positive time")));
            }
        }
        Ok(self.build_unchecked())
    }

    fn build_unchecked(self) -> LandscapeConfig {
        let defaults = LandscapeConfig::default();
        let mut config = LandscapeConfig {
            rate_constant: self.rate_constant.unwrap_or(defaults.rate_constant),
            min_barrier: self.min_barrier.unwrap_or(defaults.min_barrier),
            fpwm: self.fpwm.unwrap_or(defaults.fpwm),
            max_freed_pairs: self.max_freed_pairs.unwrap_or(defaults.max_freed_pairs),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            identity_prefix: self.identity_prefix.unwrap_or(defaults.identity_prefix),
            hidden_nodes: self.hidden_nodes.unwrap_or(defaults.hidden_nodes),
            occupancy_transfer: self.occupancy_transfer.unwrap_or(defaults.occupancy_transfer),
        };
        if let Some(t_fast) = self.fast_timescale {
            config.min_barrier = barrier_for_timescale(config.rate_constant, t_fast, config.rt());
            debug!(t_fast, min_barrier = config.min_barrier, "Derived minimum barrier height.");
        }
        config
    }
}

/// Settings of the co-transcriptional simulation loop.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionConfig {
    /// Simulation time per nucleotide in seconds.
    pub t_ext: f64,
    /// Simulation time after the last nucleotide in seconds.
    pub t_end: f64,
    /// Number of linearly spaced output points per step.
    pub t_lin: usize,
    /// Number of logarithmically spaced output points of the final step.
    pub t_log: usize,
    /// Maximal occupancy that one pruning round may shed.
    pub p_min: f64,
    /// Rounds a node may stay inactive before it is evicted.
    pub delth: u32,
    pub tolerance: Tolerance,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            t_ext: 0.04,
            t_end: 3600.0,
            t_lin: 30,
            t_log: 300,
            p_min: 0.01,
            delth: 10,
            tolerance: Tolerance::default(),
        }
    }
}

impl TranscriptionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.t_ext.is_finite() && self.t_ext > 0.0) {
            return Err(invalid("t-ext", "must be a positive time"));
        }
        if !(self.t_end.is_finite() && self.t_end >= self.t_ext) {
            return Err(invalid("t-end", "must not be shorter than t-ext"));
        }
        if self.t_lin == 0 {
            return Err(invalid("t-lin", "at least one output point is required"));
        }
        if !(0.0..1.0).contains(&self.p_min) {
            return Err(invalid("p-min", format!("{} is not in [0, 1)", self.p_min)));
        }
        let Tolerance { atol, rtol } = self.tolerance;
        if !(atol > 0.0 && rtol > 0.0) {
            return Err(invalid("tolerance", "atol and rtol must be positive"));
        }
        Ok(())
    }
}

/// Landscape and transcription settings read from one TOML document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunConfig {
    pub landscape: LandscapeConfig,
    pub transcription: TranscriptionConfig,
}

impl RunConfig {
    /// Reads a configuration file with optional `[landscape]` and
    /// `[transcription]` tables; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let partial: PartialRunConfig = toml::from_str(&content).map_err(|e| ConfigError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        debug!(path = %path.display(), "Loaded run configuration.");
        partial.resolve()
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialRunConfig {
    #[serde(default)]
    landscape: PartialLandscapeConfig,
    #[serde(default)]
    transcription: PartialTranscriptionConfig,
}

impl PartialRunConfig {
    fn resolve(self) -> Result<RunConfig, ConfigError> {
        let landscape = self.landscape.into_builder().build()?;
        let transcription = self.transcription.merge_into(TranscriptionConfig::default());
        transcription.validate()?;
        Ok(RunConfig {
            landscape,
            transcription,
        })
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialLandscapeConfig {
    #[serde(rename = "rate-constant")]
    rate_constant: Option<f64>,
    #[serde(rename = "min-barrier")]
    min_barrier: Option<Energy>,
    #[serde(rename = "t-fast")]
    t_fast: Option<f64>,
    fpwm: Option<u32>,
    #[serde(rename = "max-freed-pairs")]
    max_freed_pairs: Option<usize>,
    temperature: Option<f64>,
    #[serde(rename = "identity-prefix")]
    identity_prefix: Option<String>,
    #[serde(rename = "hidden-nodes")]
    hidden_nodes: Option<HiddenNodePolicy>,
    #[serde(rename = "occupancy-transfer")]
    occupancy_transfer: Option<OccupancyTransfer>,
}

impl PartialLandscapeConfig {
    fn into_builder(self) -> LandscapeConfigBuilder {
        LandscapeConfigBuilder {
            rate_constant: self.rate_constant,
            min_barrier: self.min_barrier,
            fast_timescale: self.t_fast,
            fpwm: self.fpwm,
            max_freed_pairs: self.max_freed_pairs,
            temperature: self.temperature,
            identity_prefix: self.identity_prefix,
            hidden_nodes: self.hidden_nodes,
            occupancy_transfer: self.occupancy_transfer,
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct PartialTranscriptionConfig {
    #[serde(rename = "t-ext")]
    t_ext: Option<f64>,
    #[serde(rename = "t-end")]
    t_end: Option<f64>,
    #[serde(rename = "t-lin")]
    t_lin: Option<usize>,
    #[serde(rename = "t-log")]
    t_log: Option<usize>,
    #[serde(rename = "p-min")]
    p_min: Option<f64>,
    delth: Option<u32>,
    atol: Option<f64>,
    rtol: Option<f64>,
}

impl PartialTranscriptionConfig {
    fn merge_into(self, base: TranscriptionConfig) -> TranscriptionConfig {
        TranscriptionConfig {
            t_ext: self.t_ext.unwrap_or(base.t_ext),
            t_end: self.t_end.unwrap_or(base.t_end),
            t_lin: self.t_lin.unwrap_or(base.t_lin),
            t_log: self.t_log.unwrap_or(base.t_log),
            p_min: self.p_min.unwrap_or(base.p_min),
            delth: self.delth.unwrap_or(base.delth),
            tolerance: Tolerance {
                atol: self.atol.unwrap_or(base.tolerance.atol),
                rtol: self.rtol.unwrap_or(base.tolerance.rtol),
            },
        }
    }
}
