//! Shared constants, grounded in `original_source/def.h`.

/// Candidate quota added to the RQALSH round's distance-evaluation budget.
pub const CANDIDATES: usize = 100;

/// Largest supported top-k value (the ground-truth file stores this many
/// furthest neighbors per query).
pub const MAXK: usize = 10;

/// `2 * (CANDIDATES + MAXK)`: below this many candidates, RQALSH\* and
/// ML-RQALSH fall back to a linear scan instead of building a sub-index.
pub const N_THRESHOLD: usize = 2 * (CANDIDATES + MAXK);

/// Max number of entries advanced per scan step in RQALSH's dynamic
/// collision counting (§4.5.3).
pub const SCAN_SIZE: usize = 64;

/// Hard cap on the number of ids in a single ML-RQALSH block.
pub const MAX_BLOCK_NUM: usize = 10_000;

/// Radius-stratification decay factor for ML-RQALSH blocks.
pub const LAMBDA: f32 = 0.9;

/// Default seed for reproducible index builds (§5, §9).
pub const MAGIC_SEED: u64 = 36_553_368 ^ 17;

/// Error probability used in RQALSH's parameter derivation (§4.5.1).
pub const DELTA: f32 = 0.49;

/// Angular-suppression threshold for Drusilla-Select (§4.7), `pi/8`.
pub const CLOSE_ANGLE: f32 = std::f32::consts::PI / 8.0;

pub const MINREAL: f32 = f32::MIN;
