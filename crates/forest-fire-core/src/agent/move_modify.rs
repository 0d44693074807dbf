use super::{Modify, Move};
use crate::config::{AgentConfig, ConfigError};
use crate::grid::Grid;
use crate::operator::{Capabilities, Operator, OperatorError, Transition};
use crate::space::{Action, ActionSpace, Context, ContextSpace, GridSpace};

/// [`Move`] then [`Modify`] at the new position.
///
/// Action is `Tuple[move_code, act_flag]`; context is the agent position.
#[derive(Clone, Debug)]
pub struct MoveModify {
    movement: Move,
    modify: Modify,
    action_space: ActionSpace,
}

impl MoveModify {
    pub fn new(movement: Move, modify: Modify) -> Self {
        let action_space = ActionSpace::Product(vec![
            movement.action_space().clone(),
            modify.action_space().clone(),
        ]);
        Self {
            movement,
            modify,
            action_space,
        }
    }

    pub fn from_config(agent: &AgentConfig, grid_space: &GridSpace) -> Result<Self, ConfigError> {
        let movement = Move::new(agent.movement.clone(), grid_space.clone())?;
        let modify = Modify::new(agent.effects.clone(), grid_space.clone())?;
        Ok(Self::new(movement, modify))
    }

    pub fn movement(&self) -> &Move {
        &self.movement
    }

    pub fn modify(&self) -> &Modify {
        &self.modify
    }

    pub fn hit(&self) -> bool {
        self.modify.hit()
    }
}

impl Operator for MoveModify {
    fn name(&self) -> &'static str {
        "move_modify"
    }

    fn grid_space(&self) -> &GridSpace {
        self.movement.grid_space()
    }

    fn action_space(&self) -> &ActionSpace {
        &self.action_space
    }

    fn context_space(&self) -> &ContextSpace {
        self.movement.context_space()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::combine([self.movement.capabilities(), self.modify.capabilities()])
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
        self.context_space().check(&context)?;
        let Some([move_action, modify_action]) = action.as_tuple() else {
            return Err(OperatorError::ActionOutOfSpace {
                action: action.clone(),
                expected: self.action_space.clone(),
            });
        };

        let moved = self.movement.update(grid, move_action, context)?;
        anomalies.extend(moved.anomalies);
        let modified = self.modify.update(moved.grid, modify_action, moved.context)?;
        anomalies.extend(modified.anomalies);
        Ok(Transition::new(modified.grid, modified.context).with_anomalies(anomalies))
    }

    fn suboperators(&self) -> Vec<&dyn Operator> {
        vec![&self.movement, &self.modify]
    }
}
