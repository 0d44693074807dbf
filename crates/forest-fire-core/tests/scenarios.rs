use forest_fire_core::agent::Modify;
use forest_fire_core::automata::{ForestFire, WindyForestFire};
use forest_fire_core::config::{BulldozerConfig, CellStates, HelicopterConfig, StochasticConfig};
use forest_fire_core::rng::create_rng;
use forest_fire_core::{
    Action, Context, FreezeCoordinator, Grid, GridSpace, Operator, Position, RepeatCaCoordinator,
};
use std::collections::BTreeMap;

const EMPTY: u8 = 0;
const TREE: u8 = 3;
const FIRE: u8 = 25;

fn stochastic(rows: usize, cols: usize) -> ForestFire {
    let space = GridSpace::uniform(vec![EMPTY, TREE, FIRE], rows, cols).unwrap();
    ForestFire::new(CellStates::default(), space, 0).unwrap()
}

fn calm() -> Context {
    ForestFire::context(&StochasticConfig {
        p_fire: 0.0,
        p_tree: 0.0,
    })
}

#[test]
fn all_tree_grid_without_random_transitions_is_unchanged() {
    let mut rule = stochastic(3, 3);
    let grid = Grid::filled(3, 3, TREE).unwrap();
    let out = rule.update(grid.clone(), &Action::None, calm()).unwrap();
    assert_eq!(out.grid, grid);
}

#[test]
fn centre_fire_ignites_the_whole_ring_and_burns_out() {
    let mut rule = stochastic(3, 3);
    let mut grid = Grid::filled(3, 3, TREE).unwrap();
    grid.set(Position::new(1, 1), FIRE);
    let out = rule.update(grid, &Action::None, calm()).unwrap();
    for (pos, cell) in out.grid.iter() {
        let expected = if pos == Position::new(1, 1) { EMPTY } else { FIRE };
        assert_eq!(cell, expected, "cell {pos}");
    }
}

#[test]
fn modify_extinguishes_fire_and_reports_hit() {
    let space = GridSpace::uniform(vec![EMPTY, TREE, FIRE], 1, 2).unwrap();
    let mut modify = Modify::new(BTreeMap::from([(FIRE, EMPTY)]), space).unwrap();
    let grid = Grid::from_rows(&[[FIRE, TREE]]).unwrap();

    let out = modify
        .update(grid, &Action::Discrete(1), Context::Position(Position::new(0, 0)))
        .unwrap();
    assert_eq!(out.grid.data(), &[EMPTY, TREE]);
    assert!(modify.hit());

    let out = modify
        .update(out.grid, &Action::Discrete(1), Context::Position(Position::new(0, 1)))
        .unwrap();
    assert_eq!(out.grid.data(), &[EMPTY, TREE]);
    assert!(!modify.hit());
}

#[test]
fn windy_rule_with_certain_wind_matches_the_stochastic_rule_without_draws() {
    let space = GridSpace::uniform(vec![EMPTY, TREE, FIRE], 12, 12).unwrap();
    let mut windy = WindyForestFire::new(CellStates::default(), 256, 1, space.clone(), 5).unwrap();
    let mut plain = stochastic(12, 12);
    let mut rng = create_rng(21);
    for _ in 0..20 {
        let grid = space.sample(&mut rng);
        let a = windy
            .update(grid.clone(), &Action::None, Context::Wind([[1.0; 3]; 3]))
            .unwrap();
        let b = plain.update(grid, &Action::None, calm()).unwrap();
        assert_eq!(a.grid, b.grid);
    }
}

#[test]
fn coordinators_built_from_defaults_run_and_keep_context_shape() {
    let helicopter = HelicopterConfig::default();
    let mut freeze = FreezeCoordinator::from_config(&helicopter).unwrap();
    let mut grid = freeze.grid_space().sample(&mut create_rng(helicopter.seed));
    let mut context = freeze.initial_context();
    for step in 0..50 {
        let action = Action::Tuple(vec![Action::Discrete(step % 9), Action::Discrete(step % 2)]);
        let out = freeze.update(grid, &action, context).unwrap();
        assert!(freeze.context_space().contains(&out.context));
        assert!(freeze.grid_space().contains(&out.grid));
        grid = out.grid;
        context = out.context;
    }

    let bulldozer = BulldozerConfig::default();
    let mut repeat = RepeatCaCoordinator::from_config(&bulldozer).unwrap();
    let mut grid = repeat.grid_space().sample(&mut create_rng(bulldozer.seed));
    let mut context = repeat.initial_context();
    let mut repeats = 0;
    for step in 0..50 {
        let action = Action::Tuple(vec![Action::Discrete(step % 9), Action::Discrete(step % 2)]);
        let out = repeat.update(grid, &action, context).unwrap();
        repeats += repeat.last_repeats();
        assert!(repeat.context_space().contains(&out.context));
        assert!(repeat.grid_space().contains(&out.grid));
        grid = out.grid;
        context = out.context;
    }
    assert!(repeats > 0);
}
