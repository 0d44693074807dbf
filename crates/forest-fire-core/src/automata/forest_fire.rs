//! Stochastic Drossel-Schwabl forest-fire automaton.

use crate::config::{CellStates, ConfigError, HelicopterConfig, StochasticConfig};
use crate::grid::Grid;
use crate::neighborhood::neighborhood;
use crate::operator::{capability, Capabilities, Operator, OperatorError, Transition};
use crate::rng::create_rng;
use crate::space::{Action, ActionSpace, Context, ContextSpace, GridSpace};
use rand::Rng;
use rand_chacha::ChaCha12Rng;
use tracing::trace;

/// Synchronous per-cell update:
///
/// * tree with a burning neighbor -> fire
/// * tree otherwise -> fire with probability `p_fire`
/// * empty -> tree with probability `p_tree`
/// * fire -> empty
///
/// Neighbors outside the grid read as empty. The context is `Params([p_fire, p_tree])`;
/// the two draws are independent Bernoulli trials, so the probabilities need not
/// sum to one.
#[derive(Clone, Debug)]
pub struct ForestFire {
    states: CellStates,
    grid_space: GridSpace,
    action_space: ActionSpace,
    context_space: ContextSpace,
    rng: ChaCha12Rng,
}

impl ForestFire {
    pub fn new(states: CellStates, grid_space: GridSpace, seed: u64) -> Result<Self, ConfigError> {
        if states.burned.is_some() {
            return Err(ConfigError::BurnedStateUnsupported);
        }
        states.validate()?;
        Ok(Self {
            states,
            grid_space,
            action_space: ActionSpace::Ignored,
            context_space: ContextSpace::Params { len: 2 },
            rng: create_rng(seed),
        })
    }

    pub fn from_config(config: &HelicopterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let grid_space = config.grid.grid_space(&config.cells)?;
        Self::new(config.cells, grid_space, config.seed)
    }

    /// Context carrying the ignition and growth probabilities.
    pub fn context(params: &StochasticConfig) -> Context {
        Context::Params(vec![params.p_fire, params.p_tree])
    }

    pub fn states(&self) -> &CellStates {
        &self.states
    }
}

impl Operator for ForestFire {
    fn name(&self) -> &'static str {
        "forest_fire"
    }

    fn grid_space(&self) -> &GridSpace {
        &self.grid_space
    }

    fn action_space(&self) -> &ActionSpace {
        &self.action_space
    }

    fn context_space(&self) -> &ContextSpace {
        &self.context_space
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities(capability::GRID_DEPENDENT | capability::CONTEXT_DEPENDENT)
    }

    fn update(
        &mut self,
        grid: Grid,
        _action: &Action,
        context: Context,
    ) -> Result<Transition, OperatorError> {
        self.check_grid(&grid)?;
        self.context_space.check(&context)?;
        let Some(&[p_fire, p_tree]) = context.as_params() else {
            return Err(OperatorError::ContextOutOfSpace {
                context: context.clone(),
                expected: self.context_space.clone(),
            });
        };

        let CellStates {
            empty, tree, fire, ..
        } = self.states;
        // Reads only `grid`; writes only `next`.
        let mut next = grid.clone();
        let mut spread = 0usize;
        let mut lightning = 0usize;
        let mut growth = 0usize;
        for ((pos, cell), slot) in grid.iter().zip(next.data_mut().iter_mut()) {
            *slot = if cell == fire {
                empty
            } else if cell == tree {
                if neighborhood(&grid, pos, empty).contains(&fire) {
                    spread += 1;
                    fire
                } else if self.rng.random_bool(p_fire) {
                    lightning += 1;
                    fire
                } else {
                    tree
                }
            } else if cell == empty {
                if self.rng.random_bool(p_tree) {
                    growth += 1;
                    tree
                } else {
                    empty
                }
            } else {
                cell
            };
        }
        trace!(spread, lightning, growth, "forest fire step");

        Ok(Transition::new(next, context))
    }

    fn seed(&mut self, seed: u64) {
        self.rng = create_rng(seed);
    }
}
