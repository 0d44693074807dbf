//! Time-multiplexed automaton scheduling.
//!
//! Every call adds the real time consumed by the action and by the current state
//! to a carried remainder `t` in `[0, 1)`, runs the automaton once per whole unit
//! of the total and carries the fractional part forward:
//!
//! ```text
//! t' = t + time_for_action(action) + time_for_state(grid, context)
//! k  = floor(t' + EPS)        automaton repeats this call
//! r  = max(t' - k, 0)         new remainder
//! ```
//!
//! Decimal increments are not exact in binary, so a total that is whole in exact
//! arithmetic can land one ulp below it (ten additions of `0.1` give
//! `0.9999999999999999`). `EPS` is [`TIME_SNAP_EPSILON`]: a total within it below
//! a whole number counts as that whole number and the remainder becomes zero.
//! Each snap adds at most `EPS` of time, so after `n` calls `sum(k) + r` equals the
//! sum of all charged times within `n * EPS` plus the rounding of the additions.
//! A total above [`MAX_REPEATS_PER_CALL`] is rejected before any update runs.

use crate::agent::modify::ACT;
use crate::config::{MovementConfig, TimeCosts};
use crate::constants::{MAX_REPEATS_PER_CALL, TIME_SNAP_EPSILON};
use crate::grid::Grid;
use crate::operator::{capability, Capabilities, Operator, OperatorError, Transition};
use crate::space::{Action, ActionSpace, Context, ContextSpace, GridSpace};
use tracing::debug;

/// Real time consumed by an action, in automaton-update units.
pub type ActionTime = Box<dyn Fn(&Action) -> f64>;

/// Real time consumed per call by the current state, in automaton-update units.
pub type StateTime = Box<dyn Fn(&Grid, &Context) -> f64>;

/// Runs a wrapped automaton a variable, possibly zero, number of times per call.
///
/// Context is `Repeat { inner, time }` where `inner` is the automaton's own context
/// and `time` the carried remainder.
pub struct RepeatCa {
    automaton: Box<dyn Operator>,
    time_for_action: ActionTime,
    time_for_state: StateTime,
    action_space: ActionSpace,
    context_space: ContextSpace,
    last_repeats: u64,
}

impl RepeatCa {
    /// `action_space` is the space of actions the time functions price; the
    /// automaton itself is always called with [`Action::None`].
    pub fn new(
        automaton: Box<dyn Operator>,
        action_space: ActionSpace,
        time_for_action: ActionTime,
        time_for_state: StateTime,
    ) -> Self {
        let context_space = ContextSpace::Repeat(Box::new(automaton.context_space().clone()));
        Self {
            automaton,
            time_for_action,
            time_for_state,
            action_space,
            context_space,
            last_repeats: 0,
        }
    }

    /// Initial scheduler context wrapping `inner` with no carried time.
    pub fn context(inner: Context) -> Context {
        Context::Repeat {
            inner: Box::new(inner),
            time: 0.0,
        }
    }

    pub fn automaton(&self) -> &dyn Operator {
        self.automaton.as_ref()
    }

    /// Automaton updates run by the last call.
    pub fn last_repeats(&self) -> u64 {
        self.last_repeats
    }
}

/// Splits accumulated time into whole automaton updates and a remainder in `[0, 1)`.
fn split_time(total: f64) -> Result<(u64, f64), OperatorError> {
    let whole = (total + TIME_SNAP_EPSILON).floor();
    if whole > MAX_REPEATS_PER_CALL as f64 {
        return Err(OperatorError::TooManyRepeats {
            total,
            max: MAX_REPEATS_PER_CALL,
        });
    }
    Ok((whole as u64, (total - whole).max(0.0)))
}

fn checked_time(source: &'static str, value: f64) -> Result<f64, OperatorError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(OperatorError::InvalidTime { source, value })
    }
}

impl Operator for RepeatCa {
    fn name(&self) -> &'static str {
        "repeat_ca"
    }

    fn grid_space(&self) -> &GridSpace {
        self.automaton.grid_space()
    }

    fn action_space(&self) -> &ActionSpace {
        &self.action_space
    }

    fn context_space(&self) -> &ContextSpace {
        &self.context_space
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::combine([
            self.automaton.capabilities(),
            Capabilities(
                capability::ACTION_DEPENDENT
                    | capability::CONTEXT_DEPENDENT
                    | capability::DETERMINISTIC,
            ),
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
        let (inner, time) = match context {
            Context::Repeat { inner, time } => (*inner, time),
            other => {
                return Err(OperatorError::ContextOutOfSpace {
                    context: other,
                    expected: self.context_space.clone(),
                })
            }
        };

        let action_time = checked_time("time_for_action", (self.time_for_action)(&action))?;
        let state_time = checked_time("time_for_state", (self.time_for_state)(&grid, &inner))?;
        let total = checked_time("accumulated time", time + action_time + state_time)?;
        let (repeats, remainder) = split_time(total)?;

        let mut grid = grid;
        let mut inner = inner;
        for _ in 0..repeats {
            let step = self.automaton.update(grid, &Action::None, inner)?;
            anomalies.extend(step.anomalies);
            grid = step.grid;
            inner = step.context;
        }
        self.last_repeats = repeats;
        debug!(repeats, remainder, "repeat ca");

        Ok(Transition::new(
            grid,
            Context::Repeat {
                inner: Box::new(inner),
                time: remainder,
            },
        )
        .with_anomalies(anomalies))
    }

    fn seed(&mut self, seed: u64) {
        self.automaton.seed(seed);
    }

    fn suboperators(&self) -> Vec<&dyn Operator> {
        vec![self.automaton.as_ref()]
    }
}

impl TimeCosts {
    /// Prices `Tuple[move_code, act_flag]`: `any`, plus `movement` when the code
    /// moves the agent, plus `modify` when it acts. Any other action costs `any`.
    pub fn action_time(&self, movement: &MovementConfig) -> ActionTime {
        let costs = *self;
        let movement = movement.clone();
        Box::new(move |action: &Action| {
            let mut time = costs.any;
            if let Some([move_action, modify_action]) = action.as_tuple() {
                if move_action.as_discrete().is_some_and(|code| movement.moves(code)) {
                    time += costs.movement;
                }
                if modify_action.as_discrete() == Some(ACT) {
                    time += costs.modify;
                }
            }
            time
        })
    }

    /// Constant per-call state time.
    pub fn state_time(&self) -> StateTime {
        let state = self.state;
        Box::new(move |_: &Grid, _: &Context| state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Position;
    use proptest::prelude::*;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Deterministic automaton that counts its calls in its context.
    struct Tally {
        grid_space: GridSpace,
        action_space: ActionSpace,
        context_space: ContextSpace,
        calls: Rc<Cell<u64>>,
    }

    impl Operator for Tally {
        fn name(&self) -> &'static str {
            "tally"
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
            Capabilities(capability::CONTEXT_DEPENDENT | capability::DETERMINISTIC)
        }

        fn update(
            &mut self,
            grid: Grid,
            _action: &Action,
            context: Context,
        ) -> Result<Transition, OperatorError> {
            self.calls.set(self.calls.get() + 1);
            match context {
                Context::Counter(n) => Ok(Transition::new(grid, Context::Counter(n + 1))),
                other => Err(OperatorError::ContextOutOfSpace {
                    context: other,
                    expected: self.context_space.clone(),
                }),
            }
        }
    }

    fn scheduler(action_time: f64, state_time: f64) -> (RepeatCa, Rc<Cell<u64>>) {
        let calls = Rc::new(Cell::new(0));
        let tally = Tally {
            grid_space: GridSpace::uniform(vec![0, 1], 2, 2).unwrap(),
            action_space: ActionSpace::Ignored,
            context_space: ContextSpace::Counter { max: u64::MAX },
            calls: Rc::clone(&calls),
        };
        let op = RepeatCa::new(
            Box::new(tally),
            ActionSpace::Ignored,
            Box::new(move |_: &Action| action_time),
            Box::new(move |_: &Grid, _: &Context| state_time),
        );
        (op, calls)
    }

    fn grid() -> Grid {
        Grid::filled(2, 2, 0).unwrap()
    }

    fn split(context: &Context) -> (u64, f64) {
        match context {
            Context::Repeat { inner, time } => match **inner {
                Context::Counter(n) => (n, *time),
                _ => panic!("unexpected inner context {inner:?}"),
            },
            other => panic!("unexpected context {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn conserves_fractional_time_over_many_calls(
            delta in prop_oneof![Just(0.1), Just(0.3), Just(0.35), Just(0.7), 0.0f64..3.0],
            share in 0.0f64..1.0,
        ) {
            let (mut op, calls) = scheduler(delta * share, delta * (1.0 - share));
            let mut grid = grid();
            let mut context = RepeatCa::context(Context::Counter(0));
            for _ in 0..1000 {
                let out = op.update(grid, &Action::None, context).unwrap();
                grid = out.grid;
                context = out.context;
            }
            let total = 1000.0 * delta;
            let expected = (total + TIME_SNAP_EPSILON).floor();
            let (repeats, remainder) = split(&context);
            prop_assert_eq!(repeats, expected as u64);
            prop_assert_eq!(calls.get(), repeats);
            prop_assert!((0.0..1.0).contains(&remainder));
            prop_assert!((remainder - (total - expected).max(0.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn decimal_increments_reach_whole_units_on_time() {
        let (mut op, _) = scheduler(0.1, 0.0);
        let mut context = RepeatCa::context(Context::Counter(0));
        for call in 1..=10 {
            let out = op.update(grid(), &Action::None, context).unwrap();
            assert_eq!(op.last_repeats(), u64::from(call == 10), "call {call}");
            context = out.context;
        }
        assert_eq!(split(&context), (1, 0.0));
    }

    #[test]
    fn rejects_totals_beyond_the_per_call_cap() {
        let (mut op, calls) = scheduler(1e300, 0.0);
        let err = op
            .update(grid(), &Action::None, RepeatCa::context(Context::Counter(0)))
            .unwrap_err();
        assert!(matches!(err, OperatorError::TooManyRepeats { max: MAX_REPEATS_PER_CALL, .. }));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn small_increments_run_nothing_until_a_unit_accrues() {
        let (mut op, calls) = scheduler(0.3, 0.0);
        let mut context = RepeatCa::context(Context::Counter(0));
        for expected in [0, 0, 0, 1] {
            let out = op.update(grid(), &Action::None, context).unwrap();
            assert_eq!(op.last_repeats(), expected);
            context = out.context;
        }
        assert_eq!(calls.get(), 1);
        let (_, remainder) = split(&context);
        assert!((remainder - 0.2).abs() < 1e-12);
    }

    #[test]
    fn several_repeats_in_one_call() {
        let (mut op, _) = scheduler(2.5, 0.75);
        let out = op
            .update(grid(), &Action::None, RepeatCa::context(Context::Counter(0)))
            .unwrap();
        assert_eq!(split(&out.context), (3, 0.25));
    }

    #[test]
    fn rejects_negative_and_non_finite_times() {
        let (mut op, calls) = scheduler(-0.1, 0.0);
        let err = op
            .update(grid(), &Action::None, RepeatCa::context(Context::Counter(0)))
            .unwrap_err();
        assert!(matches!(err, OperatorError::InvalidTime { source: "time_for_action", .. }));

        let (mut op, _) = scheduler(0.0, f64::NAN);
        let err = op
            .update(grid(), &Action::None, RepeatCa::context(Context::Counter(0)))
            .unwrap_err();
        assert!(matches!(err, OperatorError::InvalidTime { source: "time_for_state", .. }));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn rejects_remainder_outside_unit_interval() {
        let (mut op, _) = scheduler(0.1, 0.0);
        let context = Context::Repeat {
            inner: Box::new(Context::Counter(0)),
            time: 1.0,
        };
        assert!(matches!(
            op.update(grid(), &Action::None, context),
            Err(OperatorError::ContextOutOfSpace { .. })
        ));
    }

    #[test]
    fn time_costs_price_moves_and_acts() {
        let costs = TimeCosts {
            any: 0.05,
            movement: 0.2,
            modify: 0.3,
            state: 0.1,
        };
        let price = costs.action_time(&MovementConfig::default());
        let act = |code, flag| Action::Tuple(vec![Action::Discrete(code), Action::Discrete(flag)]);
        assert!((price(&act(4, 0)) - 0.05).abs() < 1e-12);
        assert!((price(&act(1, 0)) - 0.25).abs() < 1e-12);
        assert!((price(&act(4, 1)) - 0.35).abs() < 1e-12);
        assert!((price(&act(8, 1)) - 0.55).abs() < 1e-12);
        assert!((price(&Action::None) - 0.05).abs() < 1e-12);

        let state = costs.state_time();
        assert_eq!(state(&grid(), &Context::Position(Position::new(0, 0))), 0.1);
    }
}
