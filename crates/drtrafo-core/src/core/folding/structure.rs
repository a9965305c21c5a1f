/// Placeholder for positions that have not been transcribed yet.
pub const UNDETERMINED: char = '.';

/// Extends a structure on the transcript prefix to the full sequence length.
pub fn pad_structure(prefix: &str, full_length: usize) -> String {
    let length = prefix.chars().count();
    let mut padded = String::with_capacity(full_length.max(length));
    padded.push_str(prefix);
    padded.extend(std::iter::repeat_n(
        UNDETERMINED,
        full_length.saturating_sub(length),
    ));
    padded
}

/// The first `length` symbols of `structure`, or all of it if it is shorter.
pub fn structure_prefix(structure: &str, length: usize) -> &str {
    match structure.char_indices().nth(length) {
        Some((byte_index, _)) => &structure[..byte_index],
        None => structure,
    }
}
