/// Residue letters accepted from clients: the 20 canonical amino acids plus `X`.
pub const ALLOWED_RESIDUES: &str = "ACDEFGHIKLMNPQRSTVWYX";

/// Longest sequence the service will run through the model.
pub const DEFAULT_MAX_LENGTH: usize = 1000;

/// Returns true if `c` is one of [`ALLOWED_RESIDUES`].
pub fn is_allowed_residue(c: char) -> bool {
    ALLOWED_RESIDUES.contains(c)
}

/// Normalizes raw user input into a sequence the model can consume.
///
/// The input is upper-cased, every character outside [`ALLOWED_RESIDUES`]
/// (whitespace, digits, gaps, stop codons, ambiguity codes such as `B` or `Z`)
/// is dropped, and the result is cut to the first `max_len` residues.
///
/// # Example
/// ```
/// use sspred::clean_sequence;
///
/// assert_eq!(clean_sequence("mkt ay-iak*\n", 1000), "MKTAYIAK");
/// assert_eq!(clean_sequence("ACDEFG", 3), "ACD");
/// ```
pub fn clean_sequence(raw: &str, max_len: usize) -> String {
    raw.chars()
        .flat_map(char::to_uppercase)
        .filter(|&c| is_allowed_residue(c))
        .take(max_len)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_canonical_residues() {
        assert_eq!(clean_sequence("ACDEFGHIKLMNPQRSTVWYX", 1000), ALLOWED_RESIDUES);
    }

    #[test]
    fn test_uppercases_and_filters() {
        assert_eq!(clean_sequence("  mk t\tay 12 x", 1000), "MKTAYX");
        assert_eq!(clean_sequence("BZJOU-*.", 1000), "");
    }

    #[test]
    fn test_truncates_to_max_length() {
        let raw = "A".repeat(1500);
        let cleaned = clean_sequence(&raw, DEFAULT_MAX_LENGTH);
        assert_eq!(cleaned.len(), DEFAULT_MAX_LENGTH);
    }

    #[test]
    fn test_truncation_counts_kept_residues_only() {
        // Dropped characters do not count towards the limit
        assert_eq!(clean_sequence("1A2C3D4E", 3), "ACD");
    }

    #[test]
    fn test_empty_and_non_ascii_input() {
        assert_eq!(clean_sequence("", 1000), "");
        assert_eq!(clean_sequence("αβγ🧬", 1000), "");
    }
}
