use crate::config::ConfigError;
use crate::grid::{Cell, Grid};
use crate::operator::{capability, Capabilities, Operator, OperatorError, Transition};
use crate::space::{Action, ActionSpace, Context, ContextSpace, GridSpace};
use std::collections::BTreeMap;

/// Action code that applies the effect table.
pub const ACT: i64 = 1;

/// Rewrites the cell at the context position through a substitution table when
/// the action is [`ACT`].
#[derive(Clone, Debug)]
pub struct Modify {
    effects: BTreeMap<Cell, Cell>,
    grid_space: GridSpace,
    action_space: ActionSpace,
    context_space: ContextSpace,
    hit: bool,
}

impl Modify {
    pub fn new(effects: BTreeMap<Cell, Cell>, grid_space: GridSpace) -> Result<Self, ConfigError> {
        if let Some(&value) = effects
            .iter()
            .flat_map(|(from, to)| [from, to])
            .find(|v| !grid_space.values().contains(*v))
        {
            return Err(ConfigError::UnknownEffectState { value });
        }
        let (rows, cols) = grid_space.shape();
        Ok(Self {
            effects,
            action_space: ActionSpace::Discrete { n: 2 },
            context_space: ContextSpace::Position { rows, cols },
            grid_space,
            hit: false,
        })
    }

    pub fn effects(&self) -> &BTreeMap<Cell, Cell> {
        &self.effects
    }

    /// Whether the last update substituted a cell.
    pub fn hit(&self) -> bool {
        self.hit
    }
}

impl Operator for Modify {
    fn name(&self) -> &'static str {
        "modify"
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
        Capabilities(
            capability::GRID_DEPENDENT
                | capability::ACTION_DEPENDENT
                | capability::CONTEXT_DEPENDENT
                | capability::DETERMINISTIC,
        )
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
        let Some(pos) = context.as_position() else {
            return Err(OperatorError::ContextOutOfSpace {
                context,
                expected: self.context_space.clone(),
            });
        };

        self.hit = false;
        let mut grid = grid;
        if action.as_discrete() == Some(ACT) {
            if let Some(&to) = self.effects.get(&grid.get(pos)) {
                grid.set(pos, to);
                self.hit = true;
            }
        }
        Ok(Transition::new(grid, context).with_anomalies(anomalies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Position;

    const EMPTY: Cell = 0;
    const TREE: Cell = 3;
    const FIRE: Cell = 25;

    fn make_modify() -> Modify {
        let space = GridSpace::uniform(vec![EMPTY, TREE, FIRE], 2, 2).unwrap();
        Modify::new(BTreeMap::from([(FIRE, EMPTY)]), space).unwrap()
    }

    fn grid() -> Grid {
        Grid::from_rows(&[[FIRE, TREE], [EMPTY, FIRE]]).unwrap()
    }

    #[test]
    fn acting_on_fire_extinguishes() {
        let mut op = make_modify();
        let pos = Context::Position(Position::new(0, 0));
        let out = op.update(grid(), &Action::Discrete(ACT), pos.clone()).unwrap();
        assert_eq!(out.grid.get(Position::new(0, 0)), EMPTY);
        assert_eq!(out.grid.get(Position::new(1, 1)), FIRE);
        assert_eq!(out.context, pos);
        assert!(op.hit());
    }

    #[test]
    fn acting_on_tree_changes_nothing() {
        let mut op = make_modify();
        let out = op
            .update(grid(), &Action::Discrete(ACT), Context::Position(Position::new(0, 1)))
            .unwrap();
        assert_eq!(out.grid, grid());
        assert!(!op.hit());
    }

    #[test]
    fn not_acting_clears_hit() {
        let mut op = make_modify();
        let pos = Context::Position(Position::new(1, 1));
        op.update(grid(), &Action::Discrete(ACT), pos.clone()).unwrap();
        assert!(op.hit());
        let out = op.update(grid(), &Action::Discrete(0), pos).unwrap();
        assert_eq!(out.grid, grid());
        assert!(!op.hit());
    }

    #[test]
    fn rejects_effects_outside_the_grid_space() {
        let space = GridSpace::uniform(vec![EMPTY, TREE, FIRE], 2, 2).unwrap();
        let err = Modify::new(BTreeMap::from([(FIRE, 7)]), space).unwrap_err();
        assert_eq!(err, ConfigError::UnknownEffectState { value: 7 });
    }

    #[test]
    fn rejects_non_boolean_action() {
        let mut op = make_modify();
        assert!(matches!(
            op.update(grid(), &Action::Discrete(2), Context::Position(Position::new(0, 0))),
            Err(OperatorError::ActionOutOfSpace { .. })
        ));
    }
}
