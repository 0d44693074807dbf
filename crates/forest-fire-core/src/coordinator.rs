//! Top-level composites that thread one context tuple through their children.
//!
//! Both coordinators validate the whole action and context before any child runs,
//! so a rejected call never advances a random stream or consumes a step.

use crate::agent::{Modify, Move, MoveModify};
use crate::automata::{ForestFire, WindyForestFire};
use crate::config::{BulldozerConfig, ConfigError, HelicopterConfig};
use crate::grid::Grid;
use crate::operator::{Capabilities, Operator, OperatorError, Transition};
use crate::rng::derive_seed;
use crate::scheduler::RepeatCa;
use crate::space::{Action, ActionSpace, Context, ContextSpace, GridSpace};
use tracing::debug;

/// Derived-seed slot of the automaton inside a coordinator.
pub const AUTOMATON_STREAM: usize = 0;

fn unpack<const N: usize>(
    context: Context,
    space: &ContextSpace,
) -> Result<[Context; N], OperatorError> {
    let reject = |context| OperatorError::ContextOutOfSpace {
        context,
        expected: space.clone(),
    };
    match context {
        Context::Tuple(items) => {
            <[Context; N]>::try_from(items).map_err(|items| reject(Context::Tuple(items)))
        }
        other => Err(reject(other)),
    }
}

fn check_initial(space: &ContextSpace, initial: &Context) -> Result<(), ConfigError> {
    if space.contains(initial) {
        Ok(())
    } else {
        Err(ConfigError::InitialContextOutOfSpace)
    }
}

/// Runs the automaton once every `freeze + 1` calls and the agent on every call.
///
/// Context is `Tuple[automaton_ctx, Position, Counter(n)]`. When `n` is zero the
/// automaton runs first and the counter resets to `freeze`; otherwise the counter
/// just decrements.
pub struct FreezeCoordinator<A: Operator> {
    automaton: A,
    agent: MoveModify,
    freeze: u64,
    context_space: ContextSpace,
    initial: Context,
    automaton_ran: bool,
}

impl<A: Operator> FreezeCoordinator<A> {
    pub fn new(
        automaton: A,
        agent: MoveModify,
        freeze: u64,
        initial: Context,
    ) -> Result<Self, ConfigError> {
        if automaton.grid_space() != agent.grid_space() {
            return Err(ConfigError::MismatchedGridSpaces);
        }
        let context_space = ContextSpace::Tuple(vec![
            automaton.context_space().clone(),
            agent.context_space().clone(),
            ContextSpace::Counter { max: freeze },
        ]);
        check_initial(&context_space, &initial)?;
        Ok(Self {
            automaton,
            agent,
            freeze,
            context_space,
            initial,
            automaton_ran: false,
        })
    }

    pub fn initial_context(&self) -> Context {
        self.initial.clone()
    }

    pub fn automaton(&self) -> &A {
        &self.automaton
    }

    pub fn agent(&self) -> &MoveModify {
        &self.agent
    }

    pub fn freeze(&self) -> u64 {
        self.freeze
    }

    /// Whether the last call ran the automaton.
    pub fn automaton_ran(&self) -> bool {
        self.automaton_ran
    }

    /// Whether the last call's agent substituted a cell.
    pub fn hit(&self) -> bool {
        self.agent.hit()
    }
}

impl FreezeCoordinator<ForestFire> {
    pub fn from_config(config: &HelicopterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let grid_space = config.grid.grid_space(&config.cells)?;
        let automaton = ForestFire::new(
            config.cells,
            grid_space.clone(),
            derive_seed(config.seed, AUTOMATON_STREAM),
        )?;
        let agent = MoveModify::from_config(&config.agent, &grid_space)?;
        let initial = Context::Tuple(vec![
            ForestFire::context(&config.fire),
            Context::Position(config.agent.initial_position),
            Context::Counter(config.freeze),
        ]);
        Self::new(automaton, agent, config.freeze, initial)
    }
}

impl<A: Operator> Operator for FreezeCoordinator<A> {
    fn name(&self) -> &'static str {
        "freeze_coordinator"
    }

    fn grid_space(&self) -> &GridSpace {
        self.automaton.grid_space()
    }

    fn action_space(&self) -> &ActionSpace {
        self.agent.action_space()
    }

    fn context_space(&self) -> &ContextSpace {
        &self.context_space
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::combine([self.automaton.capabilities(), self.agent.capabilities()])
    }

    fn update(
        &mut self,
        grid: Grid,
        action: &Action,
        context: Context,
    ) -> Result<Transition, OperatorError> {
        self.check_grid(&grid)?;
        let mut anomalies = Vec::new();
        let action = self.agent.action_space().admit(action, &mut anomalies)?;
        self.context_space.check(&context)?;
        let [ca, position, counter] = unpack(context, &self.context_space)?;
        let remaining = match counter {
            Context::Counter(n) => n,
            other => {
                return Err(OperatorError::ContextOutOfSpace {
                    context: other,
                    expected: ContextSpace::Counter { max: self.freeze },
                })
            }
        };

        let (grid, ca, remaining) = if remaining == 0 {
            let step = self.automaton.update(grid, &Action::None, ca)?;
            anomalies.extend(step.anomalies);
            self.automaton_ran = true;
            (step.grid, step.context, self.freeze)
        } else {
            self.automaton_ran = false;
            (grid, ca, remaining - 1)
        };
        debug!(ran = self.automaton_ran, remaining, "freeze cadence");

        let agent = self.agent.update(grid, &action, position)?;
        anomalies.extend(agent.anomalies);
        Ok(Transition::new(
            agent.grid,
            Context::Tuple(vec![ca, agent.context, Context::Counter(remaining)]),
        )
        .with_anomalies(anomalies))
    }

    fn seed(&mut self, seed: u64) {
        self.automaton.seed(derive_seed(seed, AUTOMATON_STREAM));
    }

    fn suboperators(&self) -> Vec<&dyn Operator> {
        vec![&self.automaton, &self.agent]
    }
}

/// Scheduler, then [`Move`], then [`Modify`], on every call.
///
/// Action is `Tuple[move_code, act_flag]`, priced in full by the scheduler's time
/// function. Context is `Tuple[Repeat { automaton_ctx, time }, Position]`.
pub struct RepeatCaCoordinator {
    scheduler: RepeatCa,
    movement: Move,
    modify: Modify,
    action_space: ActionSpace,
    context_space: ContextSpace,
    initial: Context,
}

impl RepeatCaCoordinator {
    pub fn new(
        scheduler: RepeatCa,
        movement: Move,
        modify: Modify,
        initial: Context,
    ) -> Result<Self, ConfigError> {
        if scheduler.grid_space() != movement.grid_space()
            || movement.grid_space() != modify.grid_space()
        {
            return Err(ConfigError::MismatchedGridSpaces);
        }
        let action_space = ActionSpace::Product(vec![
            movement.action_space().clone(),
            modify.action_space().clone(),
        ]);
        let context_space = ContextSpace::Tuple(vec![
            scheduler.context_space().clone(),
            movement.context_space().clone(),
        ]);
        check_initial(&context_space, &initial)?;
        Ok(Self {
            scheduler,
            movement,
            modify,
            action_space,
            context_space,
            initial,
        })
    }

    pub fn from_config(config: &BulldozerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let grid_space = config.grid.grid_space(&config.cells)?;
        let automaton = WindyForestFire::new(
            config.cells,
            config.wind.identity,
            config.wind.propagation,
            grid_space.clone(),
            derive_seed(config.seed, AUTOMATON_STREAM),
        )?;
        let movement = Move::new(config.agent.movement.clone(), grid_space.clone())?;
        let modify = Modify::new(config.agent.effects.clone(), grid_space)?;
        let action_space = ActionSpace::Product(vec![
            movement.action_space().clone(),
            modify.action_space().clone(),
        ]);
        let scheduler = RepeatCa::new(
            Box::new(automaton),
            action_space,
            config.time.action_time(&config.agent.movement),
            config.time.state_time(),
        );
        let initial = Context::Tuple(vec![
            RepeatCa::context(WindyForestFire::context(&config.wind)),
            Context::Position(config.agent.initial_position),
        ]);
        Self::new(scheduler, movement, modify, initial)
    }

    pub fn initial_context(&self) -> Context {
        self.initial.clone()
    }

    pub fn scheduler(&self) -> &RepeatCa {
        &self.scheduler
    }

    /// Automaton updates run by the last call.
    pub fn last_repeats(&self) -> u64 {
        self.scheduler.last_repeats()
    }

    pub fn hit(&self) -> bool {
        self.modify.hit()
    }
}

impl Operator for RepeatCaCoordinator {
    fn name(&self) -> &'static str {
        "repeat_ca_coordinator"
    }

    fn grid_space(&self) -> &GridSpace {
        self.movement.grid_space()
    }

    fn action_space(&self) -> &ActionSpace {
        &self.action_space
    }

    fn context_space(&self) -> &ContextSpace {
        &self.context_space
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::combine([
            self.scheduler.capabilities(),
            self.movement.capabilities(),
            self.modify.capabilities(),
        ])
    }

    fn update(
        &mut self,
        grid: Grid,
        action: &Action,
        context: Context,
    ) -> Result<Transition, OperatorError> {
        self.check_grid(&grid)?;
        let mut anomalies = Vec::new();
        let action = self.action_space.admit(action, &mut anomalies)?;
        self.context_space.check(&context)?;
        let Some([move_action, modify_action]) = action.as_tuple() else {
            return Err(OperatorError::ActionOutOfSpace {
                action: action.clone(),
                expected: self.action_space.clone(),
            });
        };
        let [repeat, position] = unpack(context, &self.context_space)?;

        let scheduled = self.scheduler.update(grid, &action, repeat)?;
        let moved = self.movement.update(scheduled.grid, move_action, position)?;
        let modified = self.modify.update(moved.grid, modify_action, moved.context)?;
        anomalies.extend(scheduled.anomalies);
        anomalies.extend(moved.anomalies);
        anomalies.extend(modified.anomalies);

        Ok(Transition::new(
            modified.grid,
            Context::Tuple(vec![scheduled.context, modified.context]),
        )
        .with_anomalies(anomalies))
    }

    fn seed(&mut self, seed: u64) {
        self.scheduler.seed(derive_seed(seed, AUTOMATON_STREAM));
    }

    fn suboperators(&self) -> Vec<&dyn Operator> {
        vec![&self.scheduler, &self.movement, &self.modify]
    }
}
