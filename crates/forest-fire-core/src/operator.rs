//! The operator contract shared by automata, agent operators, the scheduler and
//! coordinators.

use crate::grid::Grid;
use crate::space::{Action, ActionSpace, Context, ContextSpace, GridSpace};
use std::{error::Error, fmt};
use tracing::warn;

/// Bitmask bit positions for declared operator capabilities.
pub mod capability {
    /// Output depends on the grid contents, not only its shape.
    pub const GRID_DEPENDENT: u8 = 1 << 0;
    /// Output depends on the action.
    pub const ACTION_DEPENDENT: u8 = 1 << 1;
    /// Output depends on the context.
    pub const CONTEXT_DEPENDENT: u8 = 1 << 2;
    /// Same inputs always give the same outputs (no random draws).
    pub const DETERMINISTIC: u8 = 1 << 3;
}

/// Compact u8 bitmask of declared operator capabilities.
///
/// Lets callers and tests reason about an operator's side effects without running it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities(pub u8);

impl Capabilities {
    #[inline]
    pub fn has(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn is_deterministic(self) -> bool {
        self.has(capability::DETERMINISTIC)
    }

    /// Capabilities of a composite: dependent if any child is, deterministic only if
    /// every child is.
    pub fn combine<I: IntoIterator<Item = Capabilities>>(children: I) -> Self {
        let mut any = 0u8;
        let mut all = capability::DETERMINISTIC;
        for c in children {
            any |= c.0 & !capability::DETERMINISTIC;
            all &= c.0;
        }
        Self(any | all)
    }
}

/// Recoverable oddity met during an update; the call proceeded with a fallback.
#[derive(Clone, Debug, PartialEq)]
pub enum Anomaly {
    /// An array-boxed scalar action was truncated to an integer code.
    ActionCast { original: Vec<f64>, cast: i64 },
    /// A movement code belongs to no direction set; the position was kept.
    UnmappedMovement { code: i64 },
}

impl Anomaly {
    pub(crate) fn log(&self) {
        match self {
            Anomaly::ActionCast { original, cast } => {
                warn!(?original, cast, "boxed action cast to integer code");
            }
            Anomaly::UnmappedMovement { code } => {
                warn!(code, "movement code is not mapped to a direction; position unchanged");
            }
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::ActionCast { original, cast } => {
                write!(f, "action {original:?} cast to {cast}")
            }
            Anomaly::UnmappedMovement { code } => write!(f, "movement code {code} is unmapped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperatorError {
    ActionOutOfSpace {
        action: Action,
        expected: ActionSpace,
    },
    UncastableAction {
        action: Action,
    },
    ContextOutOfSpace {
        context: Context,
        expected: ContextSpace,
    },
    GridShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    InvalidTime {
        source: &'static str,
        value: f64,
    },
    TooManyRepeats {
        total: f64,
        max: u64,
    },
}

impl fmt::Display for OperatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorError::ActionOutOfSpace { action, expected } => {
                write!(f, "action {action} outside action space {expected}")
            }
            OperatorError::UncastableAction { action } => {
                write!(f, "action {action} cannot be cast to an integer code")
            }
            OperatorError::ContextOutOfSpace { context, expected } => {
                write!(f, "context {context:?} outside context space {expected}")
            }
            OperatorError::GridShapeMismatch { expected, actual } => write!(
                f,
                "grid shape {}x{} does not match declared {}x{}",
                actual.0, actual.1, expected.0, expected.1
            ),
            OperatorError::InvalidTime { source, value } => {
                write!(f, "{source} returned {value}; times must be finite and >= 0")
            }
            OperatorError::TooManyRepeats { total, max } => {
                write!(f, "accumulated time {total} exceeds {max} automaton updates per call")
            }
        }
    }
}

impl Error for OperatorError {}

/// Result of one operator call. The returned grid is the only valid grid afterward.
#[derive(Clone, Debug)]
pub struct Transition {
    pub grid: Grid,
    pub context: Context,
    pub anomalies: Vec<Anomaly>,
}

impl Transition {
    pub fn new(grid: Grid, context: Context) -> Self {
        Self {
            grid,
            context,
            anomalies: Vec::new(),
        }
    }

    pub fn with_anomalies(mut self, anomalies: Vec<Anomaly>) -> Self {
        self.anomalies = anomalies;
        self
    }
}

/// A grid + context transition function.
pub trait Operator {
    fn name(&self) -> &'static str;

    fn grid_space(&self) -> &GridSpace;

    fn action_space(&self) -> &ActionSpace;

    fn context_space(&self) -> &ContextSpace;

    fn capabilities(&self) -> Capabilities;

    /// Apply the operator. Takes ownership of `grid`; errors leave nothing mutated.
    fn update(
        &mut self,
        grid: Grid,
        action: &Action,
        context: Context,
    ) -> Result<Transition, OperatorError>;

    /// Reseed every random stream owned by the operator and its children.
    fn seed(&mut self, _seed: u64) {}

    /// Child operators in call order.
    fn suboperators(&self) -> Vec<&dyn Operator> {
        Vec::new()
    }

    /// Error unless `grid` has the declared shape.
    fn check_grid(&self, grid: &Grid) -> Result<(), OperatorError> {
        let space = self.grid_space();
        if space.contains_shape(grid) {
            Ok(())
        } else {
            Err(OperatorError::GridShapeMismatch {
                expected: space.shape(),
                actual: grid.shape(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::capability::*;
    use super::*;

    #[test]
    fn combine_requires_all_children_deterministic() {
        let det = Capabilities(DETERMINISTIC | ACTION_DEPENDENT);
        let stochastic = Capabilities(GRID_DEPENDENT | CONTEXT_DEPENDENT);
        let both = Capabilities::combine([det, stochastic]);
        assert!(!both.is_deterministic());
        assert!(both.has(GRID_DEPENDENT));
        assert!(both.has(ACTION_DEPENDENT));
        assert!(both.has(CONTEXT_DEPENDENT));
        assert!(Capabilities::combine([det, det]).is_deterministic());
    }

    #[test]
    fn grid_shape_error_names_both_shapes() {
        let err = OperatorError::GridShapeMismatch {
            expected: (3, 4),
            actual: (2, 2),
        };
        assert_eq!(err.to_string(), "grid shape 2x2 does not match declared 3x4");
    }
}
