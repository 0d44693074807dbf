//! Declared input/output spaces of an operator.
//!
//! Callers validate grids, actions and contexts against these before and after
//! calling [`crate::operator::Operator::update`]. Operators check the cheap
//! preconditions (grid shape, action and context membership) themselves.

use crate::grid::{Cell, Grid, Position};
use crate::operator::{Anomaly, OperatorError};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use std::collections::BTreeSet;
use std::{error::Error, fmt};

#[derive(Debug, Clone, PartialEq)]
pub enum SpaceError {
    EmptyValues,
    DuplicateValue(Cell),
    EmptyShape,
    ProbabilityLength { expected: usize, actual: usize },
    InvalidProbabilities,
}

impl fmt::Display for SpaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpaceError::EmptyValues => write!(f, "grid space needs at least one cell value"),
            SpaceError::DuplicateValue(v) => write!(f, "cell value {v} declared twice"),
            SpaceError::EmptyShape => write!(f, "grid space shape must be non-zero"),
            SpaceError::ProbabilityLength { expected, actual } => write!(
                f,
                "{actual} probabilities given for {expected} cell values"
            ),
            SpaceError::InvalidProbabilities => write!(
                f,
                "probabilities must be finite, non-negative and have a positive sum"
            ),
        }
    }
}

impl Error for SpaceError {}

/// Set of grids of a fixed shape whose cells take values from a finite set.
#[derive(Clone, Debug)]
pub struct GridSpace {
    values: Vec<Cell>,
    probabilities: Option<Vec<f64>>,
    rows: usize,
    cols: usize,
    sampler: WeightedIndex<f64>,
}

impl GridSpace {
    /// Build a grid space; `probabilities` (if any) pairs up with `values` by index
    /// and need not be normalized.
    pub fn new(
        values: Vec<Cell>,
        probabilities: Option<Vec<f64>>,
        rows: usize,
        cols: usize,
    ) -> Result<Self, SpaceError> {
        if values.is_empty() {
            return Err(SpaceError::EmptyValues);
        }
        let mut seen = BTreeSet::new();
        for &v in &values {
            if !seen.insert(v) {
                return Err(SpaceError::DuplicateValue(v));
            }
        }
        if rows == 0 || cols == 0 {
            return Err(SpaceError::EmptyShape);
        }
        let weights = match &probabilities {
            Some(p) => {
                if p.len() != values.len() {
                    return Err(SpaceError::ProbabilityLength {
                        expected: values.len(),
                        actual: p.len(),
                    });
                }
                if p.iter().any(|w| !w.is_finite() || *w < 0.0) || p.iter().sum::<f64>() <= 0.0 {
                    return Err(SpaceError::InvalidProbabilities);
                }
                p.clone()
            }
            None => vec![1.0; values.len()],
        };
        let sampler = WeightedIndex::new(&weights).map_err(|_| SpaceError::InvalidProbabilities)?;
        Ok(Self {
            values,
            probabilities,
            rows,
            cols,
            sampler,
        })
    }

    pub fn uniform(values: Vec<Cell>, rows: usize, cols: usize) -> Result<Self, SpaceError> {
        Self::new(values, None, rows, cols)
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    pub fn probabilities(&self) -> Option<&[f64]> {
        self.probabilities.as_deref()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Draw every cell i.i.d. from the declared distribution.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Grid {
        let data = (0..self.rows * self.cols)
            .map(|_| self.values[self.sampler.sample(rng)])
            .collect();
        Grid::from_raw(self.rows, self.cols, data)
    }

    pub fn contains_shape(&self, grid: &Grid) -> bool {
        grid.shape() == (self.rows, self.cols)
    }

    /// Shape matches and every distinct cell value is declared.
    pub fn contains(&self, grid: &Grid) -> bool {
        if !self.contains_shape(grid) {
            return false;
        }
        let mut allowed = [false; 256];
        for &v in &self.values {
            allowed[v as usize] = true;
        }
        grid.data().iter().all(|&v| allowed[v as usize])
    }
}

impl PartialEq for GridSpace {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape()
            && self.values.iter().collect::<BTreeSet<_>>()
                == other.values.iter().collect::<BTreeSet<_>>()
    }
}

impl fmt::Display for GridSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grid({}x{}, values={:?})", self.rows, self.cols, self.values)
    }
}

/// Externally supplied action.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    None,
    Discrete(i64),
    /// Array-boxed scalar as handed over by external callers.
    Boxed(Vec<f64>),
    Tuple(Vec<Action>),
}

impl Action {
    pub fn as_discrete(&self) -> Option<i64> {
        match self {
            Action::Discrete(code) => Some(*code),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Action]> {
        match self {
            Action::Tuple(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::None => write!(f, "None"),
            Action::Discrete(code) => write!(f, "{code}"),
            Action::Boxed(values) => write!(f, "{values:?}"),
            Action::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionSpace {
    /// Any action is accepted and ignored.
    Ignored,
    /// Integer codes `0..n`.
    Discrete { n: u32 },
    Product(Vec<ActionSpace>),
}

impl ActionSpace {
    /// Check `action` against the space, casting array-boxed scalars.
    ///
    /// Casts are reported through `anomalies`; everything else outside the space
    /// is an error.
    pub fn admit(
        &self,
        action: &Action,
        anomalies: &mut Vec<Anomaly>,
    ) -> Result<Action, OperatorError> {
        match self {
            ActionSpace::Ignored => Ok(action.clone()),
            ActionSpace::Discrete { n } => {
                let code = match action {
                    Action::Discrete(code) => *code,
                    Action::Boxed(values) => match values.as_slice() {
                        [value] if value.is_finite() => {
                            let code = value.trunc() as i64;
                            let anomaly = Anomaly::ActionCast {
                                original: values.clone(),
                                cast: code,
                            };
                            anomaly.log();
                            anomalies.push(anomaly);
                            code
                        }
                        _ => {
                            return Err(OperatorError::UncastableAction {
                                action: action.clone(),
                            })
                        }
                    },
                    _ => return Err(self.reject(action)),
                };
                if code < 0 || code >= i64::from(*n) {
                    return Err(self.reject(&Action::Discrete(code)));
                }
                Ok(Action::Discrete(code))
            }
            ActionSpace::Product(spaces) => match action {
                Action::Tuple(items) if items.len() == spaces.len() => spaces
                    .iter()
                    .zip(items)
                    .map(|(space, item)| space.admit(item, anomalies))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Action::Tuple),
                _ => Err(self.reject(action)),
            },
        }
    }

    pub fn contains(&self, action: &Action) -> bool {
        match (self, action) {
            (ActionSpace::Ignored, _) => true,
            (ActionSpace::Discrete { n }, Action::Discrete(code)) => {
                *code >= 0 && *code < i64::from(*n)
            }
            (ActionSpace::Product(spaces), Action::Tuple(items)) => {
                spaces.len() == items.len()
                    && spaces.iter().zip(items).all(|(s, a)| s.contains(a))
            }
            _ => false,
        }
    }

    fn reject(&self, action: &Action) -> OperatorError {
        OperatorError::ActionOutOfSpace {
            action: action.clone(),
            expected: self.clone(),
        }
    }
}

impl fmt::Display for ActionSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionSpace::Ignored => write!(f, "Ignored"),
            ActionSpace::Discrete { n } => write!(f, "Discrete({n})"),
            ActionSpace::Product(spaces) => {
                write!(f, "Product(")?;
                for (i, space) in spaces.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{space}")?;
                }
                write!(f, ")")
            }
        }
    }
}

pub type WindMatrix = [[f64; 3]; 3];

/// Auxiliary per-operator state threaded alongside the grid.
#[derive(Clone, Debug, PartialEq)]
pub enum Context {
    Unit,
    /// Real-valued automaton parameters, e.g. `[p_fire, p_tree]`.
    Params(Vec<f64>),
    Wind(WindMatrix),
    Position(Position),
    Counter(u64),
    /// Scheduler state: wrapped sub-context plus carried fractional time.
    Repeat { inner: Box<Context>, time: f64 },
    /// Composite state, one entry per sub-operator in declared order.
    Tuple(Vec<Context>),
}

impl Context {
    pub fn as_position(&self) -> Option<Position> {
        match self {
            Context::Position(pos) => Some(*pos),
            _ => None,
        }
    }

    pub fn as_params(&self) -> Option<&[f64]> {
        match self {
            Context::Params(params) => Some(params),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Context]> {
        match self {
            Context::Tuple(items) => Some(items),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ContextSpace {
    Unit,
    /// `len` reals, each in `[0, 1]`.
    Params { len: usize },
    /// 3x3 matrix with entries in `[0, 1]`.
    Wind,
    Position { rows: usize, cols: usize },
    Counter { max: u64 },
    /// Wrapped context plus a time remainder in `[0, 1)`.
    Repeat(Box<ContextSpace>),
    Tuple(Vec<ContextSpace>),
}

impl ContextSpace {
    pub fn contains(&self, context: &Context) -> bool {
        let unit = |x: &f64| x.is_finite() && (0.0..=1.0).contains(x);
        match (self, context) {
            (ContextSpace::Unit, Context::Unit) => true,
            (ContextSpace::Params { len }, Context::Params(params)) => {
                params.len() == *len && params.iter().all(unit)
            }
            (ContextSpace::Wind, Context::Wind(wind)) => wind.iter().flatten().all(unit),
            (ContextSpace::Position { rows, cols }, Context::Position(pos)) => {
                pos.row < *rows && pos.col < *cols
            }
            (ContextSpace::Counter { max }, Context::Counter(n)) => n <= max,
            (ContextSpace::Repeat(inner_space), Context::Repeat { inner, time }) => {
                time.is_finite() && (0.0..1.0).contains(time) && inner_space.contains(inner)
            }
            (ContextSpace::Tuple(spaces), Context::Tuple(items)) => {
                spaces.len() == items.len()
                    && spaces.iter().zip(items).all(|(s, c)| s.contains(c))
            }
            _ => false,
        }
    }

    /// Error unless `context` is a member.
    pub fn check(&self, context: &Context) -> Result<(), OperatorError> {
        if self.contains(context) {
            Ok(())
        } else {
            Err(OperatorError::ContextOutOfSpace {
                context: context.clone(),
                expected: self.clone(),
            })
        }
    }
}

impl fmt::Display for ContextSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextSpace::Unit => write!(f, "Unit"),
            ContextSpace::Params { len } => write!(f, "Params([0,1]^{len})"),
            ContextSpace::Wind => write!(f, "Wind([0,1]^3x3)"),
            ContextSpace::Position { rows, cols } => write!(f, "Position({rows}x{cols})"),
            ContextSpace::Counter { max } => write!(f, "Counter(0..={max})"),
            ContextSpace::Repeat(inner) => write!(f, "Repeat({inner}, [0,1))"),
            ContextSpace::Tuple(spaces) => {
                write!(f, "Tuple(")?;
                for (i, space) in spaces.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{space}")?;
                }
                write!(f, ")")
            }
        }
    }
}
