//! Wind-gated forest fire driven by a single integer convolution.

use super::convolution::convolve_same;
use super::encoding::ConvolutionEncoding;
use crate::config::{BulldozerConfig, CellStates, ConfigError, WindConfig};
use crate::grid::Grid;
use crate::operator::{capability, Capabilities, Operator, OperatorError, Transition};
use crate::rng::create_rng;
use crate::space::{Action, ActionSpace, Context, ContextSpace, GridSpace, WindMatrix};
use rand::Rng;
use rand_chacha::ChaCha12Rng;
use tracing::trace;

/// Forest fire whose spread is gated per direction by a wind matrix.
///
/// Each step draws one uniform per neighbor direction (row-major, center
/// skipped). Direction `(r, c)` is blocked for the whole grid this step iff
/// `wind[r][c] <= u[r][c]`. The open directions form the kernel handed to
/// [`convolve_same`], and [`ConvolutionEncoding::classify`] turns every sum
/// back into a state. There is no regrowth and no spontaneous ignition.
#[derive(Clone, Debug)]
pub struct WindyForestFire {
    encoding: ConvolutionEncoding,
    grid_space: GridSpace,
    action_space: ActionSpace,
    context_space: ContextSpace,
    rng: ChaCha12Rng,
}

impl WindyForestFire {
    pub fn new(
        states: CellStates,
        identity: i64,
        propagation: i64,
        grid_space: GridSpace,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        states.validate()?;
        let encoding = ConvolutionEncoding::new(states, identity, propagation)?;
        Ok(Self {
            encoding,
            grid_space,
            action_space: ActionSpace::Ignored,
            context_space: ContextSpace::Wind,
            rng: create_rng(seed),
        })
    }

    pub fn from_config(config: &BulldozerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let grid_space = config.grid.grid_space(&config.cells)?;
        Self::new(
            config.cells,
            config.wind.identity,
            config.wind.propagation,
            grid_space,
            config.seed,
        )
    }

    pub fn context(wind: &WindConfig) -> Context {
        Context::Wind(wind.wind)
    }

    pub fn encoding(&self) -> &ConvolutionEncoding {
        &self.encoding
    }

    fn draw_propagation(&mut self, wind: &WindMatrix) -> [[bool; 3]; 3] {
        let mut propagates = [[false; 3]; 3];
        for (r, row) in propagates.iter_mut().enumerate() {
            for (c, open) in row.iter_mut().enumerate() {
                if (r, c) == (1, 1) {
                    continue;
                }
                let u: f64 = self.rng.random();
                *open = wind[r][c] > u;
            }
        }
        propagates
    }
}

impl Operator for WindyForestFire {
    fn name(&self) -> &'static str {
        "windy_forest_fire"
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
        let Context::Wind(wind) = context else {
            return Err(OperatorError::ContextOutOfSpace {
                context,
                expected: self.context_space.clone(),
            });
        };

        let propagates = self.draw_propagation(&wind);
        let kernel = self.encoding.kernel(&propagates);
        let sums = convolve_same(&grid, &kernel, self.encoding.states().empty);

        let mut next = grid;
        for (slot, sum) in next.data_mut().iter_mut().zip(sums) {
            *slot = self.encoding.classify(sum);
        }
        trace!(
            open = propagates.iter().flatten().filter(|&&p| p).count(),
            "windy forest fire step"
        );

        Ok(Transition::new(next, Context::Wind(wind)))
    }

    fn seed(&mut self, seed: u64) {
        self.rng = create_rng(seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DEFAULT_BURNED, DEFAULT_IDENTITY, DEFAULT_PROPAGATION};
    use crate::grid::Cell;
    use crate::neighborhood::neighborhood;
    use proptest::prelude::*;

    const EMPTY: Cell = 0;
    const BURNED: Cell = DEFAULT_BURNED;
    const TREE: Cell = 3;
    const FIRE: Cell = 25;

    const CALM: WindMatrix = [[0.0; 3]; 3];
    const GALE: WindMatrix = [[1.0; 3]; 3];

    fn states(burned: bool) -> CellStates {
        CellStates {
            burned: burned.then_some(BURNED),
            ..CellStates::default()
        }
    }

    fn make_rule(rows: usize, cols: usize, burned: bool, seed: u64) -> WindyForestFire {
        let states = states(burned);
        let space = GridSpace::uniform(states.values(), rows, cols).unwrap();
        WindyForestFire::new(states, DEFAULT_IDENTITY, DEFAULT_PROPAGATION, space, seed).unwrap()
    }

    /// Unconditional spread: every fire neighbor ignites a tree.
    fn brute_force(grid: &Grid, burned: bool) -> Grid {
        let mut next = grid.clone();
        for (pos, cell) in grid.iter() {
            let value = match cell {
                FIRE if burned => BURNED,
                FIRE => EMPTY,
                TREE if neighborhood(grid, pos, EMPTY).contains(&FIRE) => FIRE,
                other => other,
            };
            next.set(pos, value);
        }
        next
    }

    #[test]
    fn calm_wind_only_burns_out() {
        let mut rule = make_rule(3, 3, false, 0);
        let grid = Grid::from_rows(&[[TREE; 3], [TREE, FIRE, TREE], [EMPTY, TREE, TREE]]).unwrap();
        let out = rule.update(grid, &Action::None, Context::Wind(CALM)).unwrap();
        let expected =
            Grid::from_rows(&[[TREE; 3], [TREE, EMPTY, TREE], [EMPTY, TREE, TREE]]).unwrap();
        assert_eq!(out.grid, expected);
        assert_eq!(out.context, Context::Wind(CALM));
    }

    #[test]
    fn wind_entry_is_the_direction_of_travel() {
        // Only (dr, dc) = (0, +1) is open: fire moves one column to the right.
        let mut wind = CALM;
        wind[1][2] = 1.0;
        let mut rule = make_rule(1, 3, false, 3);
        let grid = Grid::from_rows(&[[FIRE, TREE, TREE]]).unwrap();
        let out = rule.update(grid, &Action::None, Context::Wind(wind)).unwrap();
        assert_eq!(out.grid.data(), &[EMPTY, FIRE, TREE]);

        let grid = Grid::from_rows(&[[TREE, TREE, FIRE]]).unwrap();
        let out = rule.update(grid, &Action::None, Context::Wind(wind)).unwrap();
        assert_eq!(out.grid.data(), &[TREE, TREE, EMPTY]);
    }

    #[test]
    fn burned_state_is_absorbing() {
        let mut rule = make_rule(2, 2, true, 0);
        let grid = Grid::from_rows(&[[FIRE, BURNED], [TREE, EMPTY]]).unwrap();
        let out = rule.update(grid, &Action::None, Context::Wind(GALE)).unwrap();
        let expected = Grid::from_rows(&[[BURNED, BURNED], [FIRE, EMPTY]]).unwrap();
        assert_eq!(out.grid, expected);
    }

    #[test]
    fn rejects_wind_outside_unit_interval() {
        let mut rule = make_rule(2, 2, false, 0);
        let mut wind = GALE;
        wind[0][0] = 1.5;
        let grid = Grid::filled(2, 2, TREE).unwrap();
        assert!(matches!(
            rule.update(grid, &Action::None, Context::Wind(wind)),
            Err(OperatorError::ContextOutOfSpace { .. })
        ));
    }

    #[test]
    fn rejects_inconsistent_encoding_at_construction() {
        let space = GridSpace::uniform(CellStates::default().values(), 2, 2).unwrap();
        let err = WindyForestFire::new(CellStates::default(), 8, 1, space, 0).unwrap_err();
        assert!(matches!(err, ConfigError::Encoding { .. }));
    }

    #[test]
    fn from_config_builds_four_state_encoding() {
        let config = BulldozerConfig {
            cells: states(true),
            ..BulldozerConfig::default()
        };
        let rule = WindyForestFire::from_config(&config).unwrap();
        assert_eq!(rule.encoding().states().burned, Some(BURNED));
        assert_eq!(rule.encoding().identity(), DEFAULT_IDENTITY);
        assert_eq!(WindyForestFire::context(&config.wind), Context::Wind(config.wind.wind));
    }

    #[test]
    fn reseeding_reproduces_the_sequence() {
        let half = [[0.5; 3]; 3];
        let space = GridSpace::uniform(states(false).values(), 10, 10).unwrap();
        let grid = space.sample(&mut create_rng(4));
        let mut rule = make_rule(10, 10, false, 17);
        let mut first = Vec::new();
        let mut g = grid.clone();
        for _ in 0..5 {
            g = rule.update(g, &Action::None, Context::Wind(half)).unwrap().grid;
            first.push(g.clone());
        }
        rule.seed(17);
        let mut g = grid;
        for expected in &first {
            g = rule.update(g, &Action::None, Context::Wind(half)).unwrap().grid;
            assert_eq!(&g, expected);
        }
    }

    proptest! {
        #[test]
        fn full_wind_matches_unconditional_spread(
            rows in 1usize..8,
            cols in 1usize..8,
            burned in any::<bool>(),
            picks in proptest::collection::vec(0usize..4, 64),
            seed in any::<u64>(),
        ) {
            let values = states(burned).values();
            let cells = picks[..rows * cols].iter().map(|&i| values[i % values.len()]).collect();
            let grid = Grid::from_vec(rows, cols, cells).unwrap();
            let mut rule = make_rule(rows, cols, burned, seed);
            let out = rule.update(grid.clone(), &Action::None, Context::Wind(GALE)).unwrap();
            prop_assert_eq!(out.grid, brute_force(&grid, burned));
        }
    }
}
