use crate::config::CellStates;
use crate::grid::Grid;
use crate::operator::{Operator, OperatorError};
use crate::space::{Action, Context};
use serde::{Deserialize, Serialize};

/// Per-state cell counts after one step.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct StepMetrics {
    pub step: usize,
    pub empty: usize,
    pub tree: usize,
    pub fire: usize,
    /// Always 0 without a burned state.
    pub burned: usize,
    /// Anomalies reported by the step's update.
    pub anomalies: usize,
}

impl StepMetrics {
    pub fn observe(step: usize, grid: &Grid, cells: &CellStates, anomalies: usize) -> Self {
        Self {
            step,
            empty: grid.count(cells.empty),
            tree: grid.count(cells.tree),
            fire: grid.count(cells.fire),
            burned: cells.burned.map_or(0, |b| grid.count(b)),
            anomalies,
        }
    }
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub steps: usize,
    pub sample_every: usize,
    pub samples: Vec<StepMetrics>,
    pub final_metrics: StepMetrics,
    #[serde(default)]
    pub peak_fire: usize,
    #[serde(default)]
    pub total_anomalies: usize,
}

/// Drive `operator` for `steps` calls, taking each action from `policy(step)`.
///
/// Samples every `sample_every` steps (and always the last); `sample_every == 0`
/// keeps only the final metrics.
pub fn run_experiment<F>(
    operator: &mut dyn Operator,
    grid: Grid,
    context: Context,
    cells: &CellStates,
    steps: usize,
    sample_every: usize,
    mut policy: F,
) -> Result<RunSummary, OperatorError>
where
    F: FnMut(usize) -> Action,
{
    let mut grid = grid;
    let mut context = context;
    let mut samples = Vec::new();
    let mut final_metrics = StepMetrics::observe(0, &grid, cells, 0);
    let mut peak_fire = final_metrics.fire;
    let mut total_anomalies = 0;

    for step in 1..=steps {
        let action = policy(step);
        let out = operator.update(grid, &action, context)?;
        grid = out.grid;
        context = out.context;

        let metrics = StepMetrics::observe(step, &grid, cells, out.anomalies.len());
        peak_fire = peak_fire.max(metrics.fire);
        total_anomalies += metrics.anomalies;
        if sample_every > 0 && (step % sample_every == 0 || step == steps) {
            samples.push(metrics.clone());
        }
        final_metrics = metrics;
    }

    Ok(RunSummary {
        schema_version: default_schema_version(),
        steps,
        sample_every,
        samples,
        final_metrics,
        peak_fire,
        total_anomalies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HelicopterConfig;
    use crate::coordinator::FreezeCoordinator;
    use crate::rng::create_rng;

    #[test]
    fn counts_every_cell_once() {
        let cells = CellStates {
            burned: Some(1),
            ..CellStates::default()
        };
        let grid = Grid::from_rows(&[[0, 1, 3], [25, 25, 3]]).unwrap();
        let metrics = StepMetrics::observe(7, &grid, &cells, 2);
        assert_eq!(
            metrics,
            StepMetrics {
                step: 7,
                empty: 1,
                tree: 2,
                fire: 2,
                burned: 1,
                anomalies: 2,
            }
        );
    }

    #[test]
    fn samples_on_cadence_and_last_step() {
        let config = HelicopterConfig::default();
        let mut coordinator = FreezeCoordinator::from_config(&config).unwrap();
        let grid = coordinator.grid_space().sample(&mut create_rng(3));
        let context = coordinator.initial_context();
        let policy = |step: usize| {
            Action::Tuple(vec![
                Action::Discrete((step % 9) as i64),
                Action::Discrete(1),
            ])
        };
        let summary =
            run_experiment(&mut coordinator, grid, context, &config.cells, 25, 10, policy)
                .unwrap();

        let steps: Vec<_> = summary.samples.iter().map(|m| m.step).collect();
        assert_eq!(steps, [10, 20, 25]);
        assert_eq!(summary.final_metrics.step, 25);
        let m = &summary.final_metrics;
        assert_eq!(m.empty + m.tree + m.fire, 16 * 16);
        assert_eq!(summary.total_anomalies, 0);

        let json = serde_json::to_string(&summary).unwrap();
        let back: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }
}
