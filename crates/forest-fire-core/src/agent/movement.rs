use crate::config::{ConfigError, MovementConfig};
use crate::grid::{Grid, Position};
use crate::operator::{capability, Anomaly, Capabilities, Operator, OperatorError, Transition};
use crate::space::{Action, ActionSpace, Context, ContextSpace, GridSpace};

/// Moves a position one cell per axis, clamped to the grid.
///
/// Context is the current [`Position`]; the grid passes through untouched.
#[derive(Clone, Debug)]
pub struct Move {
    movement: MovementConfig,
    grid_space: GridSpace,
    action_space: ActionSpace,
    context_space: ContextSpace,
}

impl Move {
    pub fn new(movement: MovementConfig, grid_space: GridSpace) -> Result<Self, ConfigError> {
        movement.validate()?;
        let (rows, cols) = grid_space.shape();
        Ok(Self {
            action_space: ActionSpace::Discrete {
                n: movement.n_actions,
            },
            context_space: ContextSpace::Position { rows, cols },
            movement,
            grid_space,
        })
    }

    pub fn movement(&self) -> &MovementConfig {
        &self.movement
    }

    /// Position after applying `code`, or `None` if `code` is in no direction set
    /// and not a declared stand-still code.
    pub fn step(&self, pos: Position, code: i64) -> Option<Position> {
        let m = &self.movement;
        if !m.moves(code) {
            return m.not_move.contains(&code).then_some(pos);
        }
        let (rows, cols) = self.grid_space.shape();
        let mut next = pos;
        if m.up.contains(&code) && next.row > 0 {
            next.row -= 1;
        }
        if m.down.contains(&code) && next.row + 1 < rows {
            next.row += 1;
        }
        if m.left.contains(&code) && next.col > 0 {
            next.col -= 1;
        }
        if m.right.contains(&code) && next.col + 1 < cols {
            next.col += 1;
        }
        Some(next)
    }
}

impl Operator for Move {
    fn name(&self) -> &'static str {
        "move"
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
            capability::ACTION_DEPENDENT
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
        let (Some(code), Some(pos)) = (action.as_discrete(), context.as_position()) else {
            return Err(OperatorError::ContextOutOfSpace {
                context,
                expected: self.context_space.clone(),
            });
        };

        let next = match self.step(pos, code) {
            Some(next) => next,
            None => {
                let anomaly = Anomaly::UnmappedMovement { code };
                anomaly.log();
                anomalies.push(anomaly);
                pos
            }
        };
        Ok(Transition::new(grid, Context::Position(next)).with_anomalies(anomalies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn make_move(rows: usize, cols: usize) -> Move {
        let space = GridSpace::uniform(vec![0, 3, 25], rows, cols).unwrap();
        Move::new(MovementConfig::default(), space).unwrap()
    }

    fn run(op: &mut Move, pos: Position, action: Action) -> Transition {
        let (rows, cols) = op.grid_space().shape();
        let grid = Grid::filled(rows, cols, 0).unwrap();
        op.update(grid, &action, Context::Position(pos)).unwrap()
    }

    #[test]
    fn keypad_directions() {
        let mut op = make_move(5, 5);
        let center = Position::new(2, 2);
        let expected = [
            (0, (1, 1)),
            (1, (1, 2)),
            (2, (1, 3)),
            (3, (2, 1)),
            (4, (2, 2)),
            (5, (2, 3)),
            (6, (3, 1)),
            (7, (3, 2)),
            (8, (3, 3)),
        ];
        for (code, (row, col)) in expected {
            let out = run(&mut op, center, Action::Discrete(code));
            assert_eq!(out.context, Context::Position(Position::new(row, col)), "code {code}");
            assert!(out.anomalies.is_empty());
        }
    }

    #[test]
    fn clamps_at_corner() {
        let mut op = make_move(3, 4);
        let out = run(&mut op, Position::new(0, 0), Action::Discrete(0));
        assert_eq!(out.context, Context::Position(Position::new(0, 0)));
        let out = run(&mut op, Position::new(2, 3), Action::Discrete(8));
        assert_eq!(out.context, Context::Position(Position::new(2, 3)));
    }

    #[test]
    fn unmapped_code_keeps_position_with_warning() {
        let movement = MovementConfig {
            n_actions: 10,
            ..MovementConfig::default()
        };
        let space = GridSpace::uniform(vec![0, 3, 25], 3, 3).unwrap();
        let mut op = Move::new(movement, space).unwrap();
        let out = run(&mut op, Position::new(1, 1), Action::Discrete(9));
        assert_eq!(out.context, Context::Position(Position::new(1, 1)));
        assert_eq!(out.anomalies, vec![Anomaly::UnmappedMovement { code: 9 }]);
    }

    #[test]
    fn boxed_action_is_cast_with_warning() {
        let mut op = make_move(3, 3);
        let out = run(&mut op, Position::new(1, 1), Action::Boxed(vec![7.9]));
        assert_eq!(out.context, Context::Position(Position::new(2, 1)));
        assert_eq!(
            out.anomalies,
            vec![Anomaly::ActionCast {
                original: vec![7.9],
                cast: 7
            }]
        );
    }

    #[test]
    fn rejects_out_of_space_action_and_position() {
        let mut op = make_move(3, 3);
        let grid = Grid::filled(3, 3, 0).unwrap();
        let err = op
            .update(grid.clone(), &Action::Discrete(9), Context::Position(Position::new(0, 0)))
            .unwrap_err();
        assert_eq!(
            err,
            OperatorError::ActionOutOfSpace {
                action: Action::Discrete(9),
                expected: ActionSpace::Discrete { n: 9 },
            }
        );
        assert!(matches!(
            op.update(grid, &Action::Discrete(4), Context::Position(Position::new(3, 0))),
            Err(OperatorError::ContextOutOfSpace { .. })
        ));
    }

    #[test]
    fn grid_is_returned_unchanged() {
        let mut op = make_move(2, 2);
        let grid = Grid::from_rows(&[[0, 3], [25, 3]]).unwrap();
        let out = op
            .update(grid.clone(), &Action::Discrete(8), Context::Position(Position::new(0, 0)))
            .unwrap();
        assert_eq!(out.grid, grid);
    }

    proptest! {
        #[test]
        fn stays_in_bounds_and_moves_at_most_one(
            rows in 1usize..12,
            cols in 1usize..12,
            row_seed in 0usize..100,
            col_seed in 0usize..100,
            code in 0i64..9,
        ) {
            let mut op = make_move(rows, cols);
            let start = Position::new(row_seed % rows, col_seed % cols);
            let out = run(&mut op, start, Action::Discrete(code));
            let end = out.context.as_position().unwrap();
            prop_assert!(end.row < rows && end.col < cols);
            prop_assert!(end.row.abs_diff(start.row) <= 1);
            prop_assert!(end.col.abs_diff(start.col) <= 1);
        }
    }
}
