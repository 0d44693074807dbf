//! Integer encoding that lets one weighted 3x3 convolution implement every
//! forest-fire transition at once.
//!
//! A cell with state `c` whose propagating neighbors hold values `v_i` convolves to
//!
//! ```text
//! S = IDENTITY * c + PROPAGATION * sum(v_i)
//! ```
//!
//! Blocked directions and out-of-grid neighbors (filled with `empty`) add nothing
//! beyond `PROPAGATION * empty`. Cell values are unsigned, so the neighbor term
//! lies in `[0, 8 * PROPAGATION * fire]` and `S` sits in the band
//! `[IDENTITY * c, IDENTITY * c + 8 * PROPAGATION * fire]`.
//!
//! Proof that the breaks classify every sum correctly, given the checks in
//! [`ConvolutionEncoding::new`] and the state order `empty < burned < tree < fire`:
//!
//! 1. Band separation. For adjacent states `a < b`,
//!    `IDENTITY * a + 8 * PROPAGATION * fire < IDENTITY * b`, so the band of `a` ends
//!    strictly below the band of `b` begins. Bands are disjoint and ordered, so the
//!    center state is recovered by comparing `S` against `IDENTITY * b` for each `b`.
//! 2. Inside the tree band. `tree` is the largest non-fire state, so without a
//!    propagating fire neighbor the neighbor term is at most
//!    `8 * PROPAGATION * tree`. With at least one it is at least
//!    `PROPAGATION * fire`. The tightness check
//!    `8 * PROPAGATION * tree < PROPAGATION * fire` therefore puts the break
//!    `IDENTITY * tree + PROPAGATION * fire` strictly between "keep" and "ignite".
//! 3. Ordering of the breaks follows: `IDENTITY * burned < IDENTITY * tree` since
//!    `burned < tree`; `IDENTITY * tree < IDENTITY * tree + PROPAGATION * fire`
//!    since `PROPAGATION * fire > 0`; and the ignite break sits below
//!    `IDENTITY * fire` by band separation of `tree < fire`.

use crate::config::CellStates;
use crate::grid::Cell;
use std::{error::Error, fmt};

/// 3x3 integer convolution kernel.
pub type Kernel = [[i64; 3]; 3];

/// Largest neighbor count of a 3x3 kernel.
const NEIGHBORS: i64 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    NonPositiveWeight { identity: i64, propagation: i64 },
    PropagationNotBelowIdentity { identity: i64, propagation: i64 },
    StatesNotAscending { lower: Cell, upper: Cell },
    BandOverlap { lower: Cell, upper: Cell, band_top: i64, next_band: i64 },
    TreeBandOverlap { keep_top: i64, ignite_floor: i64 },
    Overflow,
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingError::NonPositiveWeight {
                identity,
                propagation,
            } => write!(
                f,
                "kernel weights must be positive (identity {identity}, propagation {propagation})"
            ),
            EncodingError::PropagationNotBelowIdentity {
                identity,
                propagation,
            } => write!(
                f,
                "propagation weight {propagation} must be below identity weight {identity}"
            ),
            EncodingError::StatesNotAscending { lower, upper } => write!(
                f,
                "cell states must ascend empty < burned < tree < fire, got {lower} before {upper}"
            ),
            EncodingError::BandOverlap {
                lower,
                upper,
                band_top,
                next_band,
            } => write!(
                f,
                "band of state {lower} reaches {band_top}, not below band of state {upper} at {next_band}"
            ),
            EncodingError::TreeBandOverlap {
                keep_top,
                ignite_floor,
            } => write!(
                f,
                "eight tree neighbors reach {keep_top}, not below one fire neighbor at {ignite_floor}"
            ),
            EncodingError::Overflow => write!(f, "kernel weights overflow the convolution sum"),
        }
    }
}

impl Error for EncodingError {}

/// Next state picked by a break.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    StayEmpty,
    StayBurned,
    KeepTree,
    Ignite,
    Extinguish,
}

/// Validated state codes, kernel weights and ascending classification breaks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvolutionEncoding {
    states: CellStates,
    identity: i64,
    propagation: i64,
    breaks: Vec<(i64, Outcome)>,
}

impl ConvolutionEncoding {
    /// Check the encoding invariants for `states` and the kernel weights.
    pub fn new(states: CellStates, identity: i64, propagation: i64) -> Result<Self, EncodingError> {
        if identity <= 0 || propagation <= 0 {
            return Err(EncodingError::NonPositiveWeight {
                identity,
                propagation,
            });
        }
        if propagation >= identity {
            return Err(EncodingError::PropagationNotBelowIdentity {
                identity,
                propagation,
            });
        }

        let ordered = states.values();
        for pair in ordered.windows(2) {
            if pair[0] >= pair[1] {
                return Err(EncodingError::StatesNotAscending {
                    lower: pair[0],
                    upper: pair[1],
                });
            }
        }

        let scale = |state: Cell, weight: i64| i64::from(state).checked_mul(weight);
        let fire = i64::from(states.fire);
        let max_neighbors = NEIGHBORS
            .checked_mul(propagation)
            .and_then(|w| w.checked_mul(fire))
            .ok_or(EncodingError::Overflow)?;

        for pair in ordered.windows(2) {
            let band_top = scale(pair[0], identity)
                .and_then(|base| base.checked_add(max_neighbors))
                .ok_or(EncodingError::Overflow)?;
            let next_band = scale(pair[1], identity).ok_or(EncodingError::Overflow)?;
            if band_top >= next_band {
                return Err(EncodingError::BandOverlap {
                    lower: pair[0],
                    upper: pair[1],
                    band_top,
                    next_band,
                });
            }
        }

        let tree_base = scale(states.tree, identity).ok_or(EncodingError::Overflow)?;
        let keep_top = scale(states.tree, propagation)
            .and_then(|w| w.checked_mul(NEIGHBORS))
            .and_then(|w| w.checked_add(tree_base))
            .ok_or(EncodingError::Overflow)?;
        let ignite_floor = scale(states.fire, propagation)
            .and_then(|w| w.checked_add(tree_base))
            .ok_or(EncodingError::Overflow)?;
        if keep_top >= ignite_floor {
            return Err(EncodingError::TreeBandOverlap {
                keep_top,
                ignite_floor,
            });
        }

        let mut breaks = vec![(i64::MIN, Outcome::StayEmpty)];
        if let Some(burned) = states.burned {
            breaks.push((i64::from(burned) * identity, Outcome::StayBurned));
        }
        breaks.push((tree_base, Outcome::KeepTree));
        breaks.push((ignite_floor, Outcome::Ignite));
        breaks.push((fire * identity, Outcome::Extinguish));
        debug_assert!(breaks.windows(2).all(|w| w[0].0 < w[1].0));

        Ok(Self {
            states,
            identity,
            propagation,
            breaks,
        })
    }

    pub fn states(&self) -> &CellStates {
        &self.states
    }

    pub fn identity(&self) -> i64 {
        self.identity
    }

    pub fn propagation(&self) -> i64 {
        self.propagation
    }

    /// Ascending thresholds above `i64::MIN`, i.e. the lower edge of every band
    /// except the lowest.
    pub fn thresholds(&self) -> Vec<i64> {
        self.breaks.iter().skip(1).map(|&(t, _)| t).collect()
    }

    /// Kernel with `IDENTITY` at the center and `PROPAGATION` wherever
    /// `propagates[r][c]` holds. The center flag is ignored.
    pub fn kernel(&self, propagates: &[[bool; 3]; 3]) -> Kernel {
        let mut kernel = [[0; 3]; 3];
        for (r, row) in kernel.iter_mut().enumerate() {
            for (c, weight) in row.iter_mut().enumerate() {
                *weight = if (r, c) == (1, 1) {
                    self.identity
                } else if propagates[r][c] {
                    self.propagation
                } else {
                    0
                };
            }
        }
        kernel
    }

    /// Next cell state for a convolution sum.
    #[inline]
    pub fn classify(&self, sum: i64) -> Cell {
        // Last break at or below `sum`; the first break is i64::MIN so one always matches.
        let idx = self.breaks.partition_point(|&(t, _)| t <= sum) - 1;
        match self.breaks[idx].1 {
            Outcome::StayEmpty => self.states.empty,
            Outcome::StayBurned => self.states.burned.unwrap_or(self.states.empty),
            Outcome::KeepTree => self.states.tree,
            Outcome::Ignite => self.states.fire,
            Outcome::Extinguish => self.states.burned.unwrap_or(self.states.empty),
        }
    }
}
