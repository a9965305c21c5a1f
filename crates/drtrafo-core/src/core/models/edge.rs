use crate::core::energy::Energy;

/// A fine-grained transition between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Edge {
    pub(crate) weight: Option<f64>,
    pub(crate) saddle_energy: Option<Energy>,
}

impl Edge {
    /// Direct microscopic transition rate, if known.
    pub fn weight(&self) -> Option<f64> {
        self.weight
    }

    pub fn saddle_energy(&self) -> Option<Energy> {
        self.saddle_energy
    }

    fn apply(&mut self, update: EdgeUpdate) {
        if let Some(weight) = update.weight {
            self.weight = Some(weight);
        }
        if let Some(saddle_energy) = update.saddle_energy {
            self.saddle_energy = Some(saddle_energy);
        }
    }
}

/// Fields to create or overwrite on an edge. `None` leaves a field untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EdgeUpdate {
    pub weight: Option<f64>,
    pub saddle_energy: Option<Energy>,
}

impl EdgeUpdate {
    pub fn saddle(saddle_energy: Energy) -> Self {
        Self {
            weight: None,
            saddle_energy: Some(saddle_energy),
        }
    }

    pub fn weight(weight: f64) -> Self {
        Self {
            weight: Some(weight),
            saddle_energy: None,
        }
    }

    pub(crate) fn apply_to(self, edge: &mut Edge) {
        edge.apply(self);
    }
}

/// A transition between two local-minimum representatives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoarseEdge {
    pub(crate) saddle_energy: Energy,
    pub(crate) weight: f64,
}

impl CoarseEdge {
    pub fn new(saddle_energy: Energy, weight: f64) -> Self {
        Self {
            saddle_energy,
            weight,
        }
    }

    pub fn saddle_energy(&self) -> Energy {
        self.saddle_energy
    }

    /// Arrhenius rate from the source representative over the saddle.
    pub fn weight(&self) -> f64 {
        self.weight
    }
}
