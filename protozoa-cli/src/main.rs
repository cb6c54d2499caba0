use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use protozoa_config::load_world_config_from_path;
use protozoa_core::Simulation;
use protozoa_types::{ChampionInfo, MetricsSnapshot, OrganismId, WorldConfig, WorldSnapshot};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "protozoa")]
#[command(about = "Decision-tree organism simulation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Run {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 100)]
        cycles: u32,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Step {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 1)]
        cycles: u32,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value_t = false)]
        print_state: bool,
    },
    Benchmark {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 200)]
        cycles: u32,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long)]
        organisms: Option<u32>,
        #[arg(long)]
        max_tree_size: Option<u32>,
    },
    Export {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 50)]
        cycles: u32,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, value_enum, default_value_t = ExportFormat::Jsonl)]
        format: ExportFormat,
        #[arg(long)]
        out: PathBuf,
    },
    Inspect {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, default_value_t = 500)]
        cycles: u32,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Organism whose decision tree is printed; defaults to the all-time champion.
        #[arg(long)]
        organism: Option<u64>,
        #[arg(long, default_value_t = 5)]
        top_lineages: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Jsonl,
    Json,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    cycles: u32,
    seed: u64,
    final_cycle: u64,
    organism_count: usize,
    food_items: u32,
    total_organisms_created: u64,
    births_last_cycle: u32,
    deaths_last_cycle: u32,
    best_all_time_children: u32,
}

#[derive(Debug, Serialize)]
struct StepSummary {
    cycles: u32,
    final_cycle: u64,
    organism_count: usize,
    food_eaten_last_cycle: u64,
}

#[derive(Debug, Serialize)]
struct BenchmarkSummary {
    cycles: u32,
    elapsed_ms: u128,
    avg_ms_per_cycle: f64,
    normalized_us_per_organism_cycle: f64,
    final_metrics: MetricsSnapshot,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "protozoa_cli=info,protozoa_core=info".to_owned()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            cycles,
            seed,
            format,
            out,
        } => run_command(config, cycles, seed, format, out),
        Commands::Step {
            config,
            cycles,
            seed,
            print_state,
        } => step_command(config, cycles, seed, print_state),
        Commands::Benchmark {
            config,
            cycles,
            seed,
            organisms,
            max_tree_size,
        } => benchmark_command(config, cycles, seed, organisms, max_tree_size),
        Commands::Export {
            config,
            cycles,
            seed,
            format,
            out,
        } => export_command(config, cycles, seed, format, out),
        Commands::Inspect {
            config,
            cycles,
            seed,
            organism,
            top_lineages,
        } => inspect_command(config, cycles, seed, organism, top_lineages),
    }
}

fn run_command(
    config_path: Option<PathBuf>,
    cycles: u32,
    seed: u64,
    format: OutputFormat,
    out: Option<PathBuf>,
) -> Result<()> {
    let cfg = load_config(config_path)?;
    let mut sim = Simulation::new(cfg, seed)?;
    sim.step_n(cycles)?;
    let metrics = sim.metrics();

    let summary = RunSummary {
        cycles,
        seed,
        final_cycle: sim.cycle(),
        organism_count: sim.organism_count(),
        food_items: metrics.food_items,
        total_organisms_created: metrics.total_organisms_created,
        births_last_cycle: metrics.births_last_cycle,
        deaths_last_cycle: metrics.deaths_last_cycle,
        best_all_time_children: sim.best_all_time().children,
    };

    let text = match format {
        OutputFormat::Pretty => format!(
            "cycles={} seed={} final_cycle={} organisms={} food_items={} created={} births_last_cycle={} deaths_last_cycle={} best_children={}",
            summary.cycles,
            summary.seed,
            summary.final_cycle,
            summary.organism_count,
            summary.food_items,
            summary.total_organisms_created,
            summary.births_last_cycle,
            summary.deaths_last_cycle,
            summary.best_all_time_children,
        ),
        OutputFormat::Json => serde_json::to_string_pretty(&summary)?,
    };
    write_output(text, out)
}

fn step_command(
    config_path: Option<PathBuf>,
    cycles: u32,
    seed: u64,
    print_state: bool,
) -> Result<()> {
    let cfg = load_config(config_path)?;
    let mut sim = Simulation::new(cfg, seed)?;
    let deltas = sim.step_n(cycles.max(1))?;

    let summary = StepSummary {
        cycles: cycles.max(1),
        final_cycle: sim.cycle(),
        organism_count: sim.organism_count(),
        food_eaten_last_cycle: deltas
            .last()
            .map_or(0, |delta| delta.metrics.food_eaten_last_cycle),
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    if print_state {
        println!("{}", serde_json::to_string_pretty(&sim.snapshot())?);
    }
    Ok(())
}

fn benchmark_command(
    config_path: Option<PathBuf>,
    cycles: u32,
    seed: u64,
    organisms: Option<u32>,
    max_tree_size: Option<u32>,
) -> Result<()> {
    let mut cfg = load_config(config_path)?;
    if let Some(v) = organisms {
        cfg.initial_organisms = v;
    }
    if let Some(v) = max_tree_size {
        cfg.max_decision_tree_size = v;
    }

    let mut sim = Simulation::new(cfg, seed)?;
    let cycles = cycles.max(1);
    let mut organism_cycles = 0_u64;
    let start = Instant::now();
    for _ in 0..cycles {
        organism_cycles += sim.organism_count() as u64;
        sim.tick()?;
    }
    let elapsed = start.elapsed();

    let summary = BenchmarkSummary {
        cycles,
        elapsed_ms: elapsed.as_millis(),
        avg_ms_per_cycle: elapsed.as_secs_f64() * 1000.0 / f64::from(cycles),
        normalized_us_per_organism_cycle: elapsed.as_secs_f64() * 1_000_000.0
            / (organism_cycles.max(1) as f64),
        final_metrics: sim.metrics().clone(),
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn export_command(
    config_path: Option<PathBuf>,
    cycles: u32,
    seed: u64,
    format: ExportFormat,
    out: PathBuf,
) -> Result<()> {
    let cfg = load_config(config_path)?;
    let mut sim = Simulation::new(cfg, seed)?;
    let lines = sim.export_trace_jsonl(cycles)?;

    let payload = match format {
        ExportFormat::Jsonl => lines.join("\n"),
        ExportFormat::Json => {
            let snapshots: Vec<WorldSnapshot> = lines
                .iter()
                .map(|line| serde_json::from_str::<WorldSnapshot>(line))
                .collect::<std::result::Result<_, _>>()?;
            serde_json::to_string_pretty(&snapshots)?
        }
    };

    fs::write(&out, payload)
        .with_context(|| format!("failed writing export to {}", out.display()))?;
    info!(cycles, path = %out.display(), "exported trace");
    Ok(())
}

fn inspect_command(
    config_path: Option<PathBuf>,
    cycles: u32,
    seed: u64,
    organism: Option<u64>,
    top_lineages: usize,
) -> Result<()> {
    let cfg = load_config(config_path)?;
    let mut sim = Simulation::new(cfg, seed)?;
    sim.step_n(cycles)?;

    println!(
        "cycle={} organisms={} food_items={}",
        sim.cycle(),
        sim.organism_count(),
        sim.metrics().food_items
    );
    print_champion("best this cycle", sim.best_current());
    print_champion("best all time", sim.best_all_time());

    let mut lineages: Vec<(OrganismId, u32)> = sim
        .lineage_counts()
        .iter()
        .map(|(ancestor, count)| (*ancestor, *count))
        .collect();
    lineages.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    println!("top lineages:");
    for (ancestor, count) in lineages.into_iter().take(top_lineages) {
        println!("  ancestor {ancestor}: {count} descendants");
    }

    let target = organism.map(OrganismId).or_else(|| {
        sim.best_all_time()
            .id
            .filter(|id| sim.organism(*id).is_some())
            .or_else(|| sim.update_order().first().copied())
    });
    if let Some(id) = target {
        let found = sim
            .organism(id)
            .with_context(|| format!("organism {id} is not alive at cycle {}", sim.cycle()))?;
        println!(
            "organism {} age={} health={:.2} size={:.2} children={} ancestor={}",
            found.id,
            found.age,
            found.health,
            found.size,
            found.children,
            found.original_ancestor_id
        );
        println!("traits: {}", serde_json::to_string(&found.traits)?);
        print!("{}", found.decision_tree.scored());
    }
    Ok(())
}

fn print_champion(label: &str, champion: &ChampionInfo) {
    match champion.id {
        Some(id) => {
            println!(
                "{label}: organism {id} children={} age={} size={:.2} health={:.2}",
                champion.children, champion.age, champion.size, champion.health
            );
            print!("{}", champion.decision_tree);
        }
        None => println!("{label}: none"),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<WorldConfig> {
    match path {
        Some(path) => load_world_config_from_path(&path),
        None => Ok(WorldConfig::default()),
    }
}

fn write_output(text: String, out: Option<PathBuf>) -> Result<()> {
    if let Some(path) = out {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating output directory {}", parent.display())
            })?;
        }
        fs::write(&path, text).with_context(|| format!("failed writing {}", path.display()))?;
        info!(path = %path.display(), "wrote output");
    } else {
        println!("{text}");
    }
    Ok(())
}
