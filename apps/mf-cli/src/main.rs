use clap::{Parser, Subcommand, ValueEnum};
use mf_adapt::{
    AdaptationOutcome, AdaptationProgress, BatchJob, IntegratorType, run_adaptation_with_progress,
    run_batch,
};
use mf_network::NetworkSnapshot;
use mf_project::Project;
use mf_solver::{FlowSolution, LinearSolverKind, solve_flow};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mf-cli")]
#[command(about = "MicroFlow CLI - Microvascular blood flow and structural adaptation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate project file syntax and network structure
    Validate {
        /// Path to the project file (YAML or JSON)
        project_path: PathBuf,
    },
    /// Solve the flow field on the project's network
    Solve {
        /// Path to the project file (YAML or JSON)
        project_path: PathBuf,
        /// Override the linear solver
        #[arg(long, value_enum)]
        linear: Option<LinearArg>,
        /// Output JSON file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Adapt vessel diameters until steady state or the step cap
    Adapt {
        /// Path to the project file (YAML or JSON)
        project_path: PathBuf,
        /// Override the step cap
        #[arg(long)]
        max_steps: Option<usize>,
        /// Override the integrator
        #[arg(long, value_enum)]
        integrator: Option<IntegratorArg>,
        /// Output JSON file path (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Adapt several projects in parallel and print a summary
    Batch {
        /// Paths to the project files
        #[arg(required = true)]
        project_paths: Vec<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LinearArg {
    Direct,
    Multigrid,
    Auto,
}

#[derive(Clone, Copy, ValueEnum)]
enum IntegratorArg {
    Euler,
    Heun,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Project(#[from] mf_project::ProjectError),

    #[error(transparent)]
    Solver(#[from] mf_solver::SolverError),

    #[error(transparent)]
    Adapt(#[from] mf_adapt::AdaptError),

    #[error("Failed to write output: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{failed} of {total} batch jobs failed")]
    BatchFailed { failed: usize, total: usize },
}

type CliResult<T> = Result<T, CliError>;

#[derive(Serialize)]
struct SolveReport<'a> {
    project: &'a str,
    solution: &'a FlowSolution,
    network: NetworkSnapshot,
}

#[derive(Serialize)]
struct AdaptReport<'a> {
    project: &'a str,
    outcome: &'a AdaptationOutcome,
    network: NetworkSnapshot,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { project_path } => cmd_validate(&project_path),
        Commands::Solve {
            project_path,
            linear,
            output,
        } => cmd_solve(&project_path, linear, output.as_deref()),
        Commands::Adapt {
            project_path,
            max_steps,
            integrator,
            output,
        } => cmd_adapt(&project_path, max_steps, integrator, output.as_deref()),
        Commands::Batch { project_paths } => cmd_batch(&project_paths),
    }
}

fn cmd_validate(project_path: &Path) -> CliResult<()> {
    eprintln!("Validating project: {}", project_path.display());
    let project = mf_project::load(project_path)?;
    let compiled = project.compile()?;
    eprintln!(
        "✓ Project is valid ({} nodes, {} vessels)",
        compiled.network.node_count(),
        compiled.network.vessel_count()
    );
    Ok(())
}

fn cmd_solve(project_path: &Path, linear: Option<LinearArg>, output: Option<&Path>) -> CliResult<()> {
    let mut project = mf_project::load(project_path)?;
    if let Some(linear) = linear {
        project.flow.linear.kind = match linear {
            LinearArg::Direct => LinearSolverKind::Direct,
            LinearArg::Multigrid => LinearSolverKind::Multigrid,
            LinearArg::Auto => LinearSolverKind::Auto,
        };
    }
    let mut compiled = project.compile()?;

    let start = Instant::now();
    let solution = solve_flow(&mut compiled.network, &project.flow)?;
    eprintln!(
        "✓ Flow solved in {} iterations ({}, {:.2}s)",
        solution.iterations,
        solution.backend,
        start.elapsed().as_secs_f64()
    );
    eprintln!(
        "  flow residual {:.2e}, red-cell residual {:.2e}",
        solution.flow_residual, solution.rbc_residual
    );

    let report = SolveReport {
        project: &project.name,
        solution: &solution,
        network: compiled.network.snapshot(),
    };
    write_json(output, &report)
}

fn cmd_adapt(
    project_path: &Path,
    max_steps: Option<usize>,
    integrator: Option<IntegratorArg>,
    output: Option<&Path>,
) -> CliResult<()> {
    let mut project = mf_project::load(project_path)?;
    if let Some(n) = max_steps {
        project.adaptation.max_steps = n;
    }
    if let Some(integrator) = integrator {
        project.adaptation.integrator = match integrator {
            IntegratorArg::Euler => IntegratorType::ForwardEuler,
            IntegratorArg::Heun => IntegratorType::Heun,
        };
    }
    let mut compiled = project.compile()?;

    let mut last_emit = Instant::now();
    let outcome = run_adaptation_with_progress(
        &mut compiled.network,
        &project.flow,
        &project.adaptation,
        &mut |p: &AdaptationProgress| {
            if p.step == 1 || p.step == p.max_steps || last_emit.elapsed().as_millis() >= 100 {
                render_progress(p);
                last_emit = Instant::now();
            }
        },
    )?;
    clear_progress_line();

    if outcome.converged() {
        eprintln!("✓ Steady state after {} steps", outcome.steps_taken);
    } else {
        eprintln!(
            "! Step cap reached after {} steps (last relative change {:.2e})",
            outcome.steps_taken, outcome.max_relative_change
        );
    }

    let report = AdaptReport {
        project: &project.name,
        outcome: &outcome,
        network: compiled.network.snapshot(),
    };
    write_json(output, &report)
}

fn cmd_batch(project_paths: &[PathBuf]) -> CliResult<()> {
    let mut jobs = Vec::with_capacity(project_paths.len());
    for path in project_paths {
        let project: Project = mf_project::load(path)?;
        let compiled = project.compile()?;
        jobs.push(BatchJob {
            name: path.display().to_string(),
            network: compiled.network,
            flow: project.flow,
            adaptation: project.adaptation,
        });
    }

    let total = jobs.len();
    let results = run_batch(jobs);
    let mut failed = 0;
    for result in &results {
        match &result.outcome {
            Ok(outcome) => println!(
                "{}: {:?} after {} steps, diameters {:.2}-{:.2} µm",
                result.name,
                outcome.status,
                outcome.steps_taken,
                result.network.snapshot().min_diameter() * 1e6,
                result.network.snapshot().max_diameter() * 1e6,
            ),
            Err(e) => {
                failed += 1;
                println!("{}: failed: {}", result.name, e);
            }
        }
    }

    if failed > 0 {
        return Err(CliError::BatchFailed { failed, total });
    }
    Ok(())
}

fn write_json<T: Serialize>(output: Option<&Path>, value: &T) -> CliResult<()> {
    let content = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, content)?;
            eprintln!("✓ Wrote {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn clear_progress_line() {
    eprint!("\r{}\r", " ".repeat(100));
    let _ = io::stderr().flush();
}

fn render_progress(p: &AdaptationProgress) {
    let width = 28usize;
    let fraction = p.step as f64 / p.max_steps as f64;
    let filled = ((fraction * width as f64).round() as usize).min(width);
    let bar = format!(
        "{}{}",
        "#".repeat(filled),
        "-".repeat(width.saturating_sub(filled))
    );
    eprint!(
        "\r[{}] step={}/{}  change={:.2e}  flow_iters={}",
        bar, p.step, p.max_steps, p.max_relative_change, p.flow_iterations
    );
    let _ = io::stderr().flush();
}
