//! # Energy Module
//!
//! Units, thermodynamic conversions and the energy-model interface used by the
//! landscape.
//!
//! All free energies handled by the landscape are integers in dcal/mol
//! (hundredths of kcal/mol), which keeps comparisons between stored and freshly
//! computed energies exact. Floating point only enters when energies are
//! converted into rates.

pub mod model;
pub mod thermo;

/// Free energy in dcal/mol.
pub type Energy = i32;

/// Rounds a free energy in kcal/mol to the nearest dcal/mol.
#[inline]
pub fn to_dcal(kcal_per_mol: f64) -> Energy {
    (kcal_per_mol * 100.0).round() as Energy
}

/// Converts dcal/mol back to kcal/mol.
#[inline]
pub fn to_kcal(energy: Energy) -> f64 {
    f64::from(energy) / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_dcal_rounds_to_nearest_integer() {
        assert_eq!(to_dcal(-3.4), -340);
        assert_eq!(to_dcal(1.006), 101);
        assert_eq!(to_dcal(-0.004), 0);
        assert_eq!(to_dcal(0.0), 0);
    }

    #[test]
    fn to_kcal_inverts_to_dcal() {
        assert_eq!(to_kcal(-340), -3.4);
        assert_eq!(to_dcal(to_kcal(1234)), 1234);
    }
}
