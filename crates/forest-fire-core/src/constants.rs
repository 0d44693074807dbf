use crate::grid::Cell;

/// Largest supported grid dimension (cells per axis).
pub const MAX_GRID_DIM: usize = 4096;

/// Prime multiplier used to derive per-operator RNG streams from a base seed.
/// Chosen so streams for consecutive operator slots have minimal overlap.
pub const RNG_DERIVATION_PRIME: u64 = 7919;

/// Number of cells in a Moore neighborhood of radius 1.
pub const MOORE_NEIGHBORS: usize = 8;

/// Default cell codes. Chosen so the windy encoding holds with the default weights:
/// `8 * TREE < FIRE` and every band stays below the next state's identity band.
pub const DEFAULT_EMPTY: Cell = 0;
pub const DEFAULT_BURNED: Cell = 1;
pub const DEFAULT_TREE: Cell = 3;
pub const DEFAULT_FIRE: Cell = 25;

/// Default center weight of the windy convolution kernel.
pub const DEFAULT_IDENTITY: i64 = 256;
/// Default neighbor weight of the windy convolution kernel.
pub const DEFAULT_PROPAGATION: i64 = 1;

/// Accumulated scheduler time within this distance below a whole number counts
/// as that whole number. Absorbs the rounding of repeated decimal increments.
pub const TIME_SNAP_EPSILON: f64 = 1e-9;

/// Upper bound on automaton updates a scheduler may run in a single call.
pub const MAX_REPEATS_PER_CALL: u64 = 1 << 20;
