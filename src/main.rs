use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use graphplan::{build_graph, parse_plan, router, verify_plan, Graph, RunOptions, WorkspaceGuard};
use serde_json::Value;
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "graphplan")]
#[command(about = "Structured source-code transformation engine over tree-sitter CSTs", long_about = None)]
#[command(version)]
struct Cli {
    /// Workspace root for the edit-safety guard (defaults to the
    /// current directory).
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the structural graph (symbols, imports, line kinds) for files
    #[command(name = "build_graph")]
    BuildGraph {
        /// Source files or directories to index
        paths: Vec<PathBuf>,
    },

    /// Statically verify a plan against the file system and a graph
    #[command(name = "verify_plan")]
    VerifyPlan {
        /// Plan JSON (inline, @file, or - for stdin)
        plan: String,
        /// Graph JSON (inline, @file, or - for stdin)
        graph: String,
    },

    /// Execute a single plan step
    #[command(name = "execute_step")]
    ExecuteStep {
        /// Step JSON (inline, @file, or - for stdin)
        step: String,
        /// Plan-defined composed operators JSON (array of definitions)
        #[arg(long)]
        operators: Option<String>,
    },

    /// Resolve a locator and report node metadata
    #[command(name = "locate")]
    Locate {
        /// Locator JSON (inline, @file, or - for stdin)
        locator: String,
    },

    /// Resolve a locator and report the byte region of the first match
    #[command(name = "locate_region")]
    LocateRegion {
        /// Locator JSON (inline, @file, or - for stdin)
        locator: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let workspace = cli
        .workspace
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let guard = WorkspaceGuard::new(&workspace)
        .with_context(|| format!("invalid workspace root: {}", workspace.display()))?;

    match cli.command {
        Commands::BuildGraph { paths } => cmd_build_graph(paths),
        Commands::VerifyPlan { plan, graph } => cmd_verify_plan(&plan, &graph),
        Commands::ExecuteStep { step, operators } => {
            cmd_execute_step(&step, operators.as_deref(), &guard)
        }
        Commands::Locate { locator } => cmd_locate("locate", &locator),
        Commands::LocateRegion { locator } => cmd_locate("locate_region", &locator),
    }
}

/// Read a JSON argument: `-` reads stdin, `@path` reads a file, inline
/// text starting with `{` or `[` is parsed directly, anything else is
/// treated as a file path.
fn read_json_arg(arg: &str) -> Result<Value> {
    let text = if arg == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else if let Some(path) = arg.strip_prefix('@') {
        std::fs::read_to_string(path).with_context(|| format!("cannot read {path}"))?
    } else if arg.trim_start().starts_with('{') || arg.trim_start().starts_with('[') {
        arg.to_string()
    } else {
        std::fs::read_to_string(arg).with_context(|| format!("cannot read {arg}"))?
    };
    serde_json::from_str(&text).context("invalid JSON")
}

fn print_json(value: &Value) {
    println!("{}", serde_json::to_string(value).unwrap_or_else(|_| "{}".into()));
}

fn cmd_build_graph(paths: Vec<PathBuf>) -> Result<()> {
    let graph = build_graph(&paths);
    if !graph.errors.is_empty() {
        eprintln!(
            "{}",
            format!("{} file(s) reported errors", graph.errors.len()).yellow()
        );
    }
    print_json(&serde_json::to_value(&graph)?);
    Ok(())
}

fn cmd_verify_plan(plan_arg: &str, graph_arg: &str) -> Result<()> {
    let plan = read_json_arg(plan_arg)?;
    let graph: Graph = serde_json::from_value(read_json_arg(graph_arg)?)
        .context("graph JSON does not match the graph schema")?;

    let report = verify_plan(&plan, &graph);
    if !report.passed {
        eprintln!(
            "{}",
            format!("plan verification failed with {} error(s)", report.errors.len()).red()
        );
    } else if !report.warnings.is_empty() {
        eprintln!(
            "{}",
            format!("plan verified with {} warning(s)", report.warnings.len()).yellow()
        );
    }
    print_json(&serde_json::to_value(&report)?);
    Ok(())
}

fn cmd_execute_step(step_arg: &str, operators: Option<&str>, guard: &WorkspaceGuard) -> Result<()> {
    let step = read_json_arg(step_arg)?;

    let custom_ops = match operators {
        Some(arg) => {
            let value = read_json_arg(arg)?;
            // Accept either a bare operator array or a full plan document.
            if value.get("define_operators").is_some() {
                parse_plan(&value).map(|(ops, _)| ops).unwrap_or_default()
            } else {
                serde_json::from_value(value).context("invalid operator definitions")?
            }
        }
        None => Vec::new(),
    };

    let opts = RunOptions {
        guard: Some(guard),
        ..Default::default()
    };
    let result = router::execute_step(&step, &custom_ops, opts);
    let success = result.get("success") == Some(&Value::Bool(true));
    print_json(&result);
    if !success {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_locate(op: &str, locator_arg: &str) -> Result<()> {
    let locator = read_json_arg(locator_arg)?;
    let params = serde_json::json!({ "locator": locator });
    let result = graphplan::execute_readonly(op, &params);
    let success = result.get("success") == Some(&Value::Bool(true));
    print_json(&result);
    if !success {
        std::process::exit(1);
    }
    Ok(())
}
