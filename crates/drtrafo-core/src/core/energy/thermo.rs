use super::{Energy, to_kcal};

/// Thermal energy RT at 37 °C in kcal/mol.
pub const RT_37C: f64 = 0.61632077549999997;

const KELVIN_37C: f64 = 310.15;
const ZERO_CELSIUS_IN_KELVIN: f64 = 273.15;

/// Thermal energy RT in kcal/mol at `temperature_celsius`, scaled from the
/// 37 °C reference.
pub fn thermal_energy(temperature_celsius: f64) -> f64 {
    if temperature_celsius == 37.0 {
        RT_37C
    } else {
        RT_37C / KELVIN_37C * (ZERO_CELSIUS_IN_KELVIN + temperature_celsius)
    }
}

/// Arrhenius rate `k0 · exp(-(saddle - energy) / RT)` for leaving a state of
/// free energy `energy` over a transition state of free energy `saddle`.
pub fn arrhenius_rate(k0: f64, energy: Energy, saddle: Energy, rt: f64) -> f64 {
    let barrier = to_kcal(saddle - energy);
    k0 * (-barrier / rt).exp()
}

/// Smallest barrier in dcal/mol that is crossed more slowly than `t_fast`
/// seconds at rate constant `k0`.
///
/// Solves `k0 · exp(-b / RT) = 1 / t_fast` for `b`; clamped at zero.
pub fn barrier_for_timescale(k0: f64, t_fast: f64, rt: f64) -> Energy {
    let barrier = rt * (k0 * t_fast).ln();
    super::to_dcal(barrier).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn thermal_energy_at_reference_temperature_is_exact() {
        assert_eq!(thermal_energy(37.0), RT_37C);
    }

    #[test]
    fn thermal_energy_scales_linearly_with_kelvin() {
        let rt_25 = thermal_energy(25.0);
        assert_relative_eq!(rt_25, RT_37C * 298.15 / 310.15, epsilon = 1e-12);
        assert!(rt_25 < RT_37C);
        assert!(thermal_energy(50.0) > RT_37C);
    }

    #[test]
    fn arrhenius_rate_without_barrier_is_k0() {
        assert_relative_eq!(arrhenius_rate(2e5, -500, -500, RT_37C), 2e5);
    }

    #[test]
    fn arrhenius_rate_decays_with_barrier_height() {
        let rate = arrhenius_rate(2e5, -500, -300, RT_37C);
        assert_relative_eq!(rate, 2e5 * (-2.0 / RT_37C).exp(), max_relative = 1e-12);
        assert!(rate < arrhenius_rate(2e5, -500, -400, RT_37C));
    }

    #[test]
    fn barrier_for_timescale_inverts_arrhenius_rate() {
        let k0 = 2e5;
        let t_fast = 1e-3;
        let minh = barrier_for_timescale(k0, t_fast, RT_37C);
        let rate = arrhenius_rate(k0, 0, minh, RT_37C);
        assert_relative_eq!(rate, 1.0 / t_fast, max_relative = 0.01);
    }

    #[test]
    fn barrier_for_timescale_is_never_negative() {
        assert_eq!(barrier_for_timescale(2e5, 1e-9, RT_37C), 0);
    }
}
