use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use plan_flowchart::dot;
use plan_flowchart::graph::PlanGraph;
use plan_flowchart::plan::PlanSource;
use plan_flowchart::render::{render_graph, GraphvizRenderer, OutputFormat};

const EXAMPLES: &str = "\
Examples:
  plan-flowchart conf/instances.json conf/loop_plan.json
  plan-flowchart plan.json --format svg --output-dir out/
  plan-flowchart plan.json --print-dot | dot -Tpng > plan.png

Requires Graphviz (`dot`) on PATH, or FLOWCHART_DOT_BIN pointing at it.";

/// Draw the action dependency graph of a chaos plan.
///
/// With one file, it must hold both `instances` and `actions`. With two, the
/// first holds `instances` and the second `actions`. The output is named
/// after the last file's base name.
#[derive(Parser, Debug)]
#[command(name = "plan-flowchart", version)]
#[command(after_help = EXAMPLES)]
struct Cli {
    /// <PLAN_FILE> or <INSTANCE_FILE> <ACTION_FILE>
    #[arg(value_name = "FILE", required = true, num_args = 1..=2)]
    files: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Png)]
    format: OutputFormat,

    /// Directory the graph source and image are written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Print the DOT source to stdout instead of rendering
    #[arg(long)]
    print_dot: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn print_error_chain(err: &anyhow::Error) {
    eprintln!("Error: {err}");

    let mut n = 0;
    let mut cur = err.source();
    while let Some(cause) = cur {
        eprintln!("  {n}: {cause}");
        n += 1;
        cur = cause.source();
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = real_main(&cli) {
        print_error_chain(&err);
        std::process::exit(1);
    }
}

fn real_main(cli: &Cli) -> Result<()> {
    let source = PlanSource::from_paths(&cli.files)
        .context("expected <PLAN_FILE> or <INSTANCE_FILE> <ACTION_FILE>")?;

    let plan = source.load().with_context(|| {
        format!(
            "failed to load plan: {}",
            source.naming_path().display()
        )
    })?;

    let graph = PlanGraph::from_plan(&plan)?;

    if cli.print_dot {
        print!("{}", dot::to_dot(&graph));
        return Ok(());
    }

    let renderer = GraphvizRenderer::from_env();
    let output = render_graph(&graph, &cli.output_dir, cli.format, &renderer)?;
    println!("{}", output.display());
    Ok(())
}
