use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use forest_fire_core::config::{BulldozerConfig, CellStates, GridConfig, HelicopterConfig};
use forest_fire_core::rng::derive_rng;
use forest_fire_core::{
    run_experiment, Action, Context, FreezeCoordinator, Operator, RepeatCaCoordinator, RunSummary,
    StepMetrics,
};
use rand::Rng;
use rand_chacha::ChaCha12Rng;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

const GRID_STREAM: usize = 1;
const POLICY_STREAM: usize = 2;
const BENCHMARK_STEPS: usize = 200;

#[derive(Parser)]
#[command(name = "forest-fire")]
#[command(about = "Forest-fire cellular automaton runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    /// Stochastic automaton every `freeze + 1` agent steps
    Helicopter,
    /// Windy automaton scheduled by the time cost of each agent action
    Bulldozer,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation driven by seeded random agent actions
    Run {
        #[arg(long, value_enum, default_value_t = Preset::Helicopter)]
        preset: Preset,

        /// Path to config file (JSON); preset defaults when absent
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the config seed
        #[arg(long)]
        seed: Option<u64>,

        /// Number of agent steps to run
        #[arg(long, default_value_t = 1000)]
        steps: usize,

        /// Record metrics every N steps
        #[arg(long, default_value_t = 100)]
        sample_every: usize,

        /// Output directory for summary.json (optional)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Time both coordinators on a few grid sizes
    Benchmark,
    /// Dump the default configuration of a preset to stdout
    DumpDefaultConfig {
        #[arg(long, value_enum, default_value_t = Preset::Helicopter)]
        preset: Preset,
    },
}

fn load<T: serde::de::DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let file = File::open(path).with_context(|| format!("failed to open config file {path:?}"))?;
    serde_json::from_reader(BufReader::new(file)).context("failed to parse config")
}

/// Random `Tuple[move_code, act_flag]` actions.
fn random_policy(mut rng: ChaCha12Rng, n_actions: u32) -> impl FnMut(usize) -> Action {
    move |_| {
        Action::Tuple(vec![
            Action::Discrete(i64::from(rng.random_range(0..n_actions))),
            Action::Discrete(rng.random_range(0..2)),
        ])
    }
}

struct Simulation {
    operator: Box<dyn Operator>,
    context: Context,
    cells: CellStates,
    n_actions: u32,
    seed: u64,
}

impl Simulation {
    fn helicopter(config: &HelicopterConfig) -> Result<Self> {
        let coordinator =
            FreezeCoordinator::from_config(config).context("helicopter config validation error")?;
        Ok(Self {
            context: coordinator.initial_context(),
            operator: Box::new(coordinator),
            cells: config.cells,
            n_actions: config.agent.movement.n_actions,
            seed: config.seed,
        })
    }

    fn bulldozer(config: &BulldozerConfig) -> Result<Self> {
        let coordinator =
            RepeatCaCoordinator::from_config(config).context("bulldozer config validation error")?;
        Ok(Self {
            context: coordinator.initial_context(),
            operator: Box::new(coordinator),
            cells: config.cells,
            n_actions: config.agent.movement.n_actions,
            seed: config.seed,
        })
    }

    fn run(mut self, steps: usize, sample_every: usize) -> Result<RunSummary> {
        let grid = self
            .operator
            .grid_space()
            .sample(&mut derive_rng(self.seed, GRID_STREAM));
        let policy = random_policy(derive_rng(self.seed, POLICY_STREAM), self.n_actions);
        run_experiment(
            self.operator.as_mut(),
            grid,
            self.context,
            &self.cells,
            steps,
            sample_every,
            policy,
        )
        .context("simulation step failed")
    }
}

fn build(preset: Preset, config: Option<&Path>, seed: Option<u64>) -> Result<Simulation> {
    match preset {
        Preset::Helicopter => {
            let mut config: HelicopterConfig = load(config)?;
            config.seed = seed.unwrap_or(config.seed);
            Simulation::helicopter(&config)
        }
        Preset::Bulldozer => {
            let mut config: BulldozerConfig = load(config)?;
            config.seed = seed.unwrap_or(config.seed);
            Simulation::bulldozer(&config)
        }
    }
}

fn run_benchmark(preset: Preset, side: usize) -> Result<()> {
    let grid = GridConfig {
        rows: side,
        cols: side,
        initial_probabilities: None,
    };
    let simulation = match preset {
        Preset::Helicopter => {
            let mut config = HelicopterConfig {
                grid,
                ..HelicopterConfig::default()
            };
            config.agent.initial_position.row = side / 2;
            config.agent.initial_position.col = side / 2;
            Simulation::helicopter(&config)?
        }
        Preset::Bulldozer => {
            let mut config = BulldozerConfig {
                grid,
                ..BulldozerConfig::default()
            };
            config.agent.initial_position.row = side / 2;
            config.agent.initial_position.col = side / 2;
            Simulation::bulldozer(&config)?
        }
    };

    let start = Instant::now();
    let summary = simulation.run(BENCHMARK_STEPS, 0)?;
    let elapsed = start.elapsed().as_secs_f64();
    let steps_per_sec = summary.steps as f64 / elapsed;
    let cells_per_sec = steps_per_sec * (side * side) as f64;

    println!("--- {preset:?} {side}x{side} ---");
    println!("  Avg step:      {:.0} us ({steps_per_sec:.1} steps/sec)", 1e6 / steps_per_sec);
    println!("  Throughput:    {:.2e} cells/sec", cells_per_sec);
    println!("  Peak fire:     {}", summary.peak_fire);
    println!();
    Ok(())
}

fn print_row(m: &StepMetrics) {
    println!(
        "{:>8} {:>8} {:>8} {:>8} {:>8}",
        m.step, m.empty, m.tree, m.fire, m.burned
    );
}

fn print_summary(summary: &RunSummary) {
    println!("{:>8} {:>8} {:>8} {:>8} {:>8}", "step", "empty", "tree", "fire", "burned");
    for m in &summary.samples {
        print_row(m);
    }
    if summary.samples.last().map(|m| m.step) != Some(summary.final_metrics.step) {
        print_row(&summary.final_metrics);
    }
    println!(
        "Run complete. Peak fire: {}, anomalies: {}",
        summary.peak_fire, summary.total_anomalies
    );
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::DumpDefaultConfig { preset } => {
            let json = match preset {
                Preset::Helicopter => serde_json::to_string_pretty(&HelicopterConfig::default())?,
                Preset::Bulldozer => serde_json::to_string_pretty(&BulldozerConfig::default())?,
            };
            println!("{json}");
        }
        Commands::Benchmark => {
            if cfg!(debug_assertions) {
                eprintln!("WARNING: running in debug mode. Results are not representative.");
                eprintln!("         Use: cargo run -p forest-fire-cli --release -- benchmark");
                eprintln!();
            }
            println!("=== Forest Fire Benchmark ===");
            println!("Benchmark: {BENCHMARK_STEPS} agent steps per configuration");
            println!();
            for preset in [Preset::Helicopter, Preset::Bulldozer] {
                for side in [64, 256, 1024] {
                    run_benchmark(preset, side)?;
                }
            }
        }
        Commands::Run {
            preset,
            config,
            seed,
            steps,
            sample_every,
            out,
        } => {
            let simulation = build(preset, config.as_deref(), seed)?;
            info!(?preset, steps, seed = simulation.seed, "starting run");
            let summary = simulation.run(steps, sample_every)?;

            if let Some(out_dir) = out {
                std::fs::create_dir_all(&out_dir).context("failed to create output directory")?;
                let summary_path = out_dir.join("summary.json");
                let file = File::create(summary_path).context("failed to create summary file")?;
                serde_json::to_writer_pretty(file, &summary).context("failed to write summary")?;
                println!("Run complete. Results saved to {:?}", out_dir);
            } else {
                print_summary(&summary);
            }
        }
    }
    Ok(())
}
