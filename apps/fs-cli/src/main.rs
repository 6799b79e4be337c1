use clap::{Parser, Subcommand};
use fs_app::{AppError, AppResult, CheckReport, RunReport, project_service, run_service};
use fs_report::render_listing;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser)]
#[command(name = "fs-cli")]
#[command(about = "flowtear CLI - steady-state flowsheet solver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the degrees-of-freedom report
    Check {
        /// Path to the flowsheet YAML or JSON file
        flowsheet_path: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Solve the flowsheet, tearing recycles when the file declares them
    Solve {
        /// Path to the flowsheet YAML or JSON file
        flowsheet_path: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the tearing loop from every point of the initial-guess grid
    Sweep {
        /// Path to the flowsheet YAML or JSON file
        flowsheet_path: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-solve along the values of the file's swept parameter
    ParamSweep {
        /// Path to the flowsheet YAML or JSON file
        flowsheet_path: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List equations that are linearly dependent on the others
    Redundant {
        /// Path to the flowsheet YAML or JSON file
        flowsheet_path: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> AppResult<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            flowsheet_path,
            json,
        } => cmd_check(&flowsheet_path, json),
        Commands::Solve {
            flowsheet_path,
            json,
        } => cmd_solve(&flowsheet_path, json),
        Commands::Sweep {
            flowsheet_path,
            json,
        } => cmd_sweep(&flowsheet_path, json),
        Commands::ParamSweep {
            flowsheet_path,
            json,
        } => cmd_param_sweep(&flowsheet_path, json),
        Commands::Redundant {
            flowsheet_path,
            json,
        } => cmd_redundant(&flowsheet_path, json),
    }
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Project(format!("Failed to serialize report: {}", e)))?;
    println!("{}", text);
    Ok(())
}

fn print_warnings(warnings: &[String]) {
    for w in warnings {
        println!("  warning: {}", w);
    }
}

fn cmd_check(path: &Path, json: bool) -> AppResult<()> {
    let built = project_service::load_flowsheet(path)?;
    let report = run_service::check(&built);
    if json {
        print_json(&report)?;
    } else {
        print_check(&report);
    }
    if report.is_square() {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Flowsheet '{}' is not square",
            report.name
        )))
    }
}

fn print_check(report: &CheckReport) {
    println!("Flowsheet: {}", report.name);
    println!("  Fingerprint: {}", report.fingerprint);
    println!(
        "  Untorn: {} equations, {} unknowns, DOF {} ({})",
        report.dof.equations, report.dof.unknowns, report.dof.dof, report.dof.status
    );
    if let Some(torn) = &report.torn_dof {
        println!(
            "  Torn:   {} equations, {} unknowns, DOF {} ({})",
            torn.equations, torn.unknowns, torn.dof, torn.status
        );
    }
    if !report.fully_fixed.is_empty() {
        println!("  Equations over fixed values only:");
        for s in &report.fully_fixed {
            println!("    {}", s);
        }
    }
    if !report.suspended.is_empty() {
        println!("  Suspended equations:");
        for s in &report.suspended {
            println!("    {}", s);
        }
    }
    if !report.unreferenced.is_empty() {
        println!("  Unreferenced unknowns:");
        for u in &report.unreferenced {
            println!("    {}", u);
        }
    }
    print_warnings(&report.warnings);
}

fn cmd_solve(path: &Path, json: bool) -> AppResult<()> {
    let built = project_service::load_flowsheet(path)?;
    debug!(summary = ?project_service::summarize(&built), "solving");
    let report = run_service::run(&built)?;
    if json {
        print_json(&report)?;
    } else {
        print_run(&report);
    }
    if report.succeeded {
        Ok(())
    } else {
        Err(AppError::Solver(format!(
            "Flowsheet '{}' did not solve: {}",
            report.name, report.status
        )))
    }
}

fn print_run(report: &RunReport) {
    println!("Flowsheet: {} ({:?})", report.name, report.mode);
    println!("  Status: {}", report.status);
    println!("  Iterations: {}", report.iterations);
    if let Some(err) = report.final_error {
        println!("  Final error: {:.3e}", err);
    }
    print_warnings(&report.warnings);
    println!();
    print!("{}", report.streams.render());
    println!();
    print!("{}", render_listing(&report.listing));
}

fn cmd_sweep(path: &Path, json: bool) -> AppResult<()> {
    let built = project_service::load_flowsheet(path)?;
    let summary = run_service::sweep(&built)?;
    if json {
        return print_json(&summary);
    }

    println!("Sweep: {} ({} points)", summary.name, summary.points.len());
    for p in &summary.points {
        let guesses: Vec<String> = p.guesses.iter().map(|g| format!("{}", g)).collect();
        print!("  #{} [{}] {}", p.index, guesses.join(", "), p.status);
        if let Some(it) = p.iterations {
            print!(", {} iterations", it);
        }
        if let Some(err) = p.error {
            print!(", error {:.3e}", err);
        }
        if let Some(msg) = &p.message {
            print!(": {}", msg);
        }
        println!();
    }
    println!(
        "  Converged: {}, failed: {}",
        summary.converged, summary.failed
    );
    match summary.best {
        Some(best) => println!("  Best point: #{}", best),
        None => println!("  No point converged"),
    }
    Ok(())
}

fn cmd_param_sweep(path: &Path, json: bool) -> AppResult<()> {
    let built = project_service::load_flowsheet(path)?;
    let summary = run_service::parameter_sweep(&built)?;
    if json {
        return print_json(&summary);
    }

    println!(
        "Parameter sweep: {} over {} ({} points, {:?})",
        summary.name,
        summary.parameter,
        summary.points.len(),
        summary.mode
    );
    for p in &summary.points {
        print!("  #{} {} = {} {}", p.index, summary.parameter, p.value, p.status);
        if let Some(it) = p.iterations {
            print!(", {} iterations", it);
        }
        if let Some(obj) = p.objective {
            print!(", objective {:.6}", obj);
        }
        if let Some(msg) = &p.message {
            print!(": {}", msg);
        }
        println!();
    }
    println!(
        "  Converged: {}, failed: {}",
        summary.converged, summary.failed
    );
    match summary.best.and_then(|i| summary.points.get(i)) {
        Some(best) => println!("  Best point: #{} ({} = {})", best.index, summary.parameter, best.value),
        None => println!("  No point with an objective value"),
    }
    Ok(())
}

fn cmd_redundant(path: &Path, json: bool) -> AppResult<()> {
    let built = project_service::load_flowsheet(path)?;
    let report = run_service::redundant(&built)?;
    if json {
        return print_json(&report);
    }

    println!(
        "Flowsheet: {} ({} equations, {} unknowns, rank {})",
        report.name, report.equations, report.variables, report.rank
    );
    if report.candidates.is_empty() {
        println!("  No redundant equations");
    } else {
        println!("  Redundancy candidates:");
        for c in &report.candidates {
            println!("    {}", c);
        }
    }
    Ok(())
}
