use thiserror::Error;

use super::config::ConfigError;
use crate::core::energy::Energy;
use crate::core::kinetics::KineticsError;
use crate::core::models::graph::ModelError;

#[derive(Debug, Error)]
pub enum LandscapeError {
    #[error("Landscape model error: {source}")]
    Model {
        #[from]
        source: ModelError,
    },

    #[error("Kinetics failed: {source}")]
    Kinetics {
        #[from]
        source: KineticsError,
    },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Probability vector is not normalized: sum = {sum}")]
    NotNormalized { sum: f64 },

    #[error("Occupancy {value} of node '{key}' is not a non-negative number")]
    InvalidOccupancy { key: String, value: f64 },

    #[error("Length mismatch: {nodes} nodes but {values} values")]
    LengthMismatch { nodes: usize, values: usize },

    #[error("Energy of node '{key}' changed from {stored} to {computed}")]
    EnergyMismatch {
        key: String,
        stored: Energy,
        computed: Energy,
    },

    #[error("Deactivated node '{key}' has no reachable active neighbor")]
    NoTransferTarget { key: String },

    #[error("Hidden node '{key}' holds occupancy {occupancy} while its representative is pruned")]
    HiddenNodeOccupied { key: String, occupancy: f64 },

    #[error("Occupancy transfer target '{key}' of node '{source_key}' is inactive")]
    InactiveTransferTarget { key: String, source_key: String },

    #[error("Coarse-graining returned unknown representative '{key}'")]
    UnknownRepresentative { key: String },

    #[error("Coarse-graining referenced inactive node '{key}'")]
    InactiveRepresentative { key: String },

    #[error("Node '{key}' is both a representative and hidden")]
    RepresentativeHidden { key: String },

    #[error("Collaborator returned invalid data: {0}")]
    InvalidCollaboratorOutput(String),
}

impl LandscapeError {
    /// True for faults that indicate a defect in a collaborator or in the
    /// landscape algorithms, as opposed to a caller precondition violation.
    pub fn is_internal_fault(&self) -> bool {
        matches!(
            self,
            Self::EnergyMismatch { .. }
                | Self::NoTransferTarget { .. }
                | Self::HiddenNodeOccupied { .. }
                | Self::InactiveTransferTarget { .. }
                | Self::UnknownRepresentative { .. }
                | Self::InactiveRepresentative { .. }
                | Self::RepresentativeHidden { .. }
                | Self::InvalidCollaboratorOutput(_)
        )
    }
}
