use crate::automata::encoding::{ConvolutionEncoding, EncodingError};
use crate::constants::{
    DEFAULT_EMPTY, DEFAULT_FIRE, DEFAULT_IDENTITY, DEFAULT_PROPAGATION, DEFAULT_TREE,
    MAX_GRID_DIM, MAX_REPEATS_PER_CALL,
};
use crate::grid::{Cell, Position};
use crate::space::{GridSpace, SpaceError, WindMatrix};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Integer codes of the cell states.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CellStates {
    pub empty: Cell,
    pub tree: Cell,
    pub fire: Cell,
    /// Absorbing state that burnt-out fires turn into (windy automaton only).
    pub burned: Option<Cell>,
}

impl Default for CellStates {
    fn default() -> Self {
        Self {
            empty: DEFAULT_EMPTY,
            tree: DEFAULT_TREE,
            fire: DEFAULT_FIRE,
            burned: None,
        }
    }
}

impl CellStates {
    /// Declared values in the order empty, burned (if any), tree, fire.
    pub fn values(&self) -> Vec<Cell> {
        let mut values = vec![self.empty];
        values.extend(self.burned);
        values.push(self.tree);
        values.push(self.fire);
        values
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GridConfig {
    pub rows: usize,
    pub cols: usize,
    /// Sampling weights paired with [`CellStates::values`]; uniform when absent.
    pub initial_probabilities: Option<Vec<f64>>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: 16,
            cols: 16,
            initial_probabilities: None,
        }
    }
}

/// Parameters of the stochastic automaton.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StochasticConfig {
    /// Per-step probability that a tree without burning neighbors ignites.
    pub p_fire: f64,
    /// Per-step probability that an empty cell grows a tree.
    pub p_tree: f64,
}

impl Default for StochasticConfig {
    fn default() -> Self {
        Self {
            p_fire: 0.01,
            p_tree: 0.05,
        }
    }
}

/// Parameters of the windy automaton.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindConfig {
    /// `wind[1 + dr][1 + dc]` is the probability fire travels by `(dr, dc)` in one step.
    pub wind: WindMatrix,
    /// Center weight of the convolution kernel.
    pub identity: i64,
    /// Neighbor weight of the convolution kernel.
    pub propagation: i64,
}

impl Default for WindConfig {
    fn default() -> Self {
        Self {
            wind: [[0.3, 0.5, 0.3], [0.5, 0.0, 0.5], [0.3, 0.5, 0.3]],
            identity: DEFAULT_IDENTITY,
            propagation: DEFAULT_PROPAGATION,
        }
    }
}

/// Movement code sets. A code may belong to several sets (e.g. up-left).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MovementConfig {
    /// Size of the movement action space; codes are `0..n_actions`.
    pub n_actions: u32,
    pub up: Vec<i64>,
    pub down: Vec<i64>,
    pub left: Vec<i64>,
    pub right: Vec<i64>,
    pub not_move: Vec<i64>,
}

impl Default for MovementConfig {
    /// Keypad layout: 0 1 2 / 3 4 5 / 6 7 8 with 4 standing still.
    fn default() -> Self {
        Self {
            n_actions: 9,
            up: vec![0, 1, 2],
            down: vec![6, 7, 8],
            left: vec![0, 3, 6],
            right: vec![2, 5, 8],
            not_move: vec![4],
        }
    }
}

impl MovementConfig {
    fn codes(&self) -> impl Iterator<Item = i64> + '_ {
        self.up
            .iter()
            .chain(&self.down)
            .chain(&self.left)
            .chain(&self.right)
            .chain(&self.not_move)
            .copied()
    }

    /// Whether `code` moves the agent at all (belongs to a direction set).
    pub fn moves(&self, code: i64) -> bool {
        [&self.up, &self.down, &self.left, &self.right]
            .iter()
            .any(|set| set.contains(&code))
    }
}

/// Agent operator settings shared by both coordinators.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub movement: MovementConfig,
    /// Substitution table applied at the agent's position when it acts.
    pub effects: BTreeMap<Cell, Cell>,
    pub initial_position: Position,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            movement: MovementConfig::default(),
            effects: BTreeMap::from([(DEFAULT_FIRE, DEFAULT_EMPTY)]),
            initial_position: Position::new(8, 8),
        }
    }
}

/// Real time consumed per step, in automaton-update units.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeCosts {
    /// Charged on every step.
    pub any: f64,
    /// Charged when the movement code moves the agent.
    pub movement: f64,
    /// Charged when the agent acts on its cell.
    pub modify: f64,
    /// Charged per step regardless of the action, from the simulation state.
    pub state: f64,
}

impl Default for TimeCosts {
    fn default() -> Self {
        Self {
            any: 0.05,
            movement: 0.2,
            modify: 0.3,
            state: 0.0,
        }
    }
}

/// Windy automaton driven by the repeat-CA scheduler, plus a moving agent.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BulldozerConfig {
    /// Deterministic seed for reproducible runs.
    pub seed: u64,
    pub grid: GridConfig,
    pub cells: CellStates,
    pub wind: WindConfig,
    pub agent: AgentConfig,
    pub time: TimeCosts,
}

/// Stochastic automaton run at a fixed cadence, plus a moving agent.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HelicopterConfig {
    /// Deterministic seed for reproducible runs.
    pub seed: u64,
    pub grid: GridConfig,
    pub cells: CellStates,
    pub fire: StochasticConfig,
    pub agent: AgentConfig,
    /// Agent steps between automaton updates.
    pub freeze: u64,
}

impl Default for HelicopterConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            grid: GridConfig::default(),
            cells: CellStates::default(),
            fire: StochasticConfig::default(),
            agent: AgentConfig::default(),
            freeze: 4,
        }
    }
}

macro_rules! define_config_error {
    (
        $(
            $variant:ident $( { $($field:ident : $type:ty),* } )? => $fmt:literal $(, $arg:expr)*
        );* $(;)?
    ) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum ConfigError {
            $(
                $variant $( { $($field : $type),* } )?,
            )*
        }

        impl std::fmt::Display for ConfigError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        Self::$variant $( { $($field),* } )? => write!(f, $fmt $(, $arg)*),
                    )*
                }
            }
        }
    };
}

define_config_error! {
    InvalidGridShape => "grid rows and cols must be greater than 0";
    GridTooLarge { max: usize, rows: usize, cols: usize } => "grid {}x{} exceeds supported maximum {} per axis", rows, cols, max;
    DuplicateCellState { value: Cell } => "cell state code {} is used by more than one state", value;
    BurnedStateUnsupported => "the stochastic automaton has no burned state";
    InvalidInitialProbabilities => "initial_probabilities must pair with the cell states and be finite, non-negative with a positive sum";
    InvalidFireProbability => "p_fire must be finite and within [0,1]";
    InvalidTreeProbability => "p_tree must be finite and within [0,1]";
    InvalidWindProbability => "wind entries must be finite and within [0,1]";
    Encoding { source: EncodingError } => "invalid windy encoding: {}", source;
    Space { source: SpaceError } => "invalid grid space: {}", source;
    InvalidActionCount => "movement n_actions must be greater than 0";
    MovementCodeOutOfRange { code: i64, n_actions: u32 } => "movement code {} outside 0..{}", code, n_actions;
    UnknownEffectState { value: Cell } => "effect refers to undeclared cell state {}", value;
    InitialPositionOutOfBounds { position: Position } => "initial_position {} lies outside the grid", position;
    InvalidTimeCost => "time costs must be finite and non-negative";
    TimeCostTooLarge { total: f64, max: u64 } => "time costs sum to {} per step, more than {} automaton updates", total, max;
    MismatchedGridSpaces => "sub-operators declare different grid spaces";
    InitialContextOutOfSpace => "initial context lies outside the coordinator context space";
}

impl std::error::Error for ConfigError {}

impl From<EncodingError> for ConfigError {
    fn from(source: EncodingError) -> Self {
        ConfigError::Encoding { source }
    }
}

impl From<SpaceError> for ConfigError {
    fn from(source: SpaceError) -> Self {
        ConfigError::Space { source }
    }
}

impl GridConfig {
    /// Grid space over the declared cell states, sampled with `initial_probabilities`.
    pub fn grid_space(&self, cells: &CellStates) -> Result<GridSpace, ConfigError> {
        self.validate(cells)?;
        Ok(GridSpace::new(
            cells.values(),
            self.initial_probabilities.clone(),
            self.rows,
            self.cols,
        )?)
    }

    fn validate(&self, cells: &CellStates) -> Result<(), ConfigError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ConfigError::InvalidGridShape);
        }
        if self.rows > MAX_GRID_DIM || self.cols > MAX_GRID_DIM {
            return Err(ConfigError::GridTooLarge {
                max: MAX_GRID_DIM,
                rows: self.rows,
                cols: self.cols,
            });
        }
        if let Some(p) = &self.initial_probabilities {
            if p.len() != cells.values().len()
                || p.iter().any(|w| !w.is_finite() || *w < 0.0)
                || p.iter().sum::<f64>() <= 0.0
            {
                return Err(ConfigError::InvalidInitialProbabilities);
            }
        }
        Ok(())
    }
}

impl CellStates {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for value in self.values() {
            if !seen.insert(value) {
                return Err(ConfigError::DuplicateCellState { value });
            }
        }
        Ok(())
    }
}

impl StochasticConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.p_fire.is_finite() || !(0.0..=1.0).contains(&self.p_fire) {
            return Err(ConfigError::InvalidFireProbability);
        }
        if !self.p_tree.is_finite() || !(0.0..=1.0).contains(&self.p_tree) {
            return Err(ConfigError::InvalidTreeProbability);
        }
        Ok(())
    }
}

impl WindConfig {
    pub fn validate(&self, cells: &CellStates) -> Result<(), ConfigError> {
        if self
            .wind
            .iter()
            .flatten()
            .any(|w| !w.is_finite() || !(0.0..=1.0).contains(w))
        {
            return Err(ConfigError::InvalidWindProbability);
        }
        ConvolutionEncoding::new(*cells, self.identity, self.propagation)?;
        Ok(())
    }
}

impl MovementConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_actions == 0 {
            return Err(ConfigError::InvalidActionCount);
        }
        if let Some(code) = self
            .codes()
            .find(|&c| c < 0 || c >= i64::from(self.n_actions))
        {
            return Err(ConfigError::MovementCodeOutOfRange {
                code,
                n_actions: self.n_actions,
            });
        }
        Ok(())
    }
}

impl AgentConfig {
    pub fn validate(&self, grid: &GridConfig, cells: &CellStates) -> Result<(), ConfigError> {
        self.movement.validate()?;
        let declared = cells.values();
        if let Some(&value) = self
            .effects
            .iter()
            .flat_map(|(from, to)| [from, to])
            .find(|v| !declared.contains(*v))
        {
            return Err(ConfigError::UnknownEffectState { value });
        }
        if self.initial_position.row >= grid.rows || self.initial_position.col >= grid.cols {
            return Err(ConfigError::InitialPositionOutOfBounds {
                position: self.initial_position,
            });
        }
        Ok(())
    }
}

impl TimeCosts {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if [self.any, self.movement, self.modify, self.state]
            .iter()
            .any(|t| !t.is_finite() || *t < 0.0)
        {
            return Err(ConfigError::InvalidTimeCost);
        }
        // One unit of carried remainder can join the per-step maximum.
        let total = self.any + self.movement + self.modify + self.state;
        if total + 1.0 > MAX_REPEATS_PER_CALL as f64 {
            return Err(ConfigError::TimeCostTooLarge {
                total,
                max: MAX_REPEATS_PER_CALL,
            });
        }
        Ok(())
    }
}

impl BulldozerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cells.validate()?;
        self.grid.validate(&self.cells)?;
        self.wind.validate(&self.cells)?;
        self.agent.validate(&self.grid, &self.cells)?;
        self.time.validate()?;
        Ok(())
    }
}

impl HelicopterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cells.burned.is_some() {
            return Err(ConfigError::BurnedStateUnsupported);
        }
        self.cells.validate()?;
        self.grid.validate(&self.cells)?;
        self.fire.validate()?;
        self.agent.validate(&self.grid, &self.cells)?;
        Ok(())
    }
}
