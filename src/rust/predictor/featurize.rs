use ndarray::Array3;

/// Residue codes in the order the network was trained with: the 20 canonical
/// amino acids, `X` for unknowns and `-` for alignment gaps.
pub const RESIDUE_CODES: [char; 22] = [
    'A', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'V',
    'W', 'Y', 'X', '-',
];

/// Width of the one-hot block.
pub const ONE_HOT_WIDTH: usize = RESIDUE_CODES.len();

/// Features per residue: the one-hot block followed by the N- and C-terminal flags.
pub const FEATURE_WIDTH: usize = ONE_HOT_WIDTH + 2;

const UNKNOWN_INDEX: usize = 20;
const N_TERMINAL_COLUMN: usize = ONE_HOT_WIDTH;
const C_TERMINAL_COLUMN: usize = ONE_HOT_WIDTH + 1;

/// Index of `residue` in [`RESIDUE_CODES`]; anything not in the table maps to `X`.
pub fn residue_index(residue: char) -> usize {
    let upper = residue.to_ascii_uppercase();
    RESIDUE_CODES
        .iter()
        .position(|&code| code == upper)
        .unwrap_or(UNKNOWN_INDEX)
}

/// Builds the per-residue feature tensor consumed by the network.
///
/// # Layout
/// - Shape `[1, L, 24]` (batch of one)
/// - Columns `0..22`: one-hot over [`RESIDUE_CODES`]
/// - Column `22`: 1.0 on the first residue (N-terminus)
/// - Column `23`: 1.0 on the last residue (C-terminus)
///
/// Cleaned client input never contains `-`, so that column stays zero in
/// practice. A single-residue sequence carries both terminal flags.
pub fn featurize(sequence: &str) -> Array3<f32> {
    let residues: Vec<char> = sequence.chars().collect();
    let len = residues.len();
    let mut features = Array3::<f32>::zeros((1, len, FEATURE_WIDTH));

    for (i, &residue) in residues.iter().enumerate() {
        features[[0, i, residue_index(residue)]] = 1.0;
    }

    if len > 0 {
        features[[0, 0, N_TERMINAL_COLUMN]] = 1.0;
        features[[0, len - 1, C_TERMINAL_COLUMN]] = 1.0;
    }

    features
}
