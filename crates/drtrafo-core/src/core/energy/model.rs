/// Free-energy model for one fixed sequence.
///
/// Implementations wrap an external folding engine. Energies are reported in
/// kcal/mol; the landscape rounds them to dcal/mol.
pub trait EnergyModel {
    /// Free energy of `structure`, which spans the full sequence length.
    fn eval_structure(&self, structure: &str) -> f64;

    /// Minimum free energy structure of the first `length` symbols of the sequence.
    fn mfe_structure(&self, length: usize) -> String;
}
