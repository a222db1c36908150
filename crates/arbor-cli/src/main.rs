//! arbor CLI.
//!
//! - `arbor list` - show the built-in demos
//! - `arbor demo <name>` - tick a built-in demo tree
//! - `arbor run <file>` - load a JSON tree description and tick it

mod demos;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use arbor::{BehaviourTree, NodeId, Traversal, Tree, TreeConfig};

#[derive(Parser)]
#[command(name = "arbor")]
#[command(about = "Tick-driven behaviour trees", version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in demos
    List,

    /// Tick a built-in demo
    Demo {
        name: String,

        /// Number of ticks (defaults to the demo's own length)
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Load a JSON tree file and tick it
    Run {
        file: PathBuf,

        /// Number of ticks (defaults to `max_ticks` from the file)
        #[arg(long)]
        ticks: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::List => {
            list_demos();
            Ok(())
        }
        Commands::Demo { name, ticks } => run_demo(&name, ticks),
        Commands::Run { file, ticks } => run_file(&file, ticks),
    }
}

fn list_demos() {
    let width = demos::DEMOS.iter().map(|d| d.name.len()).max().unwrap_or(0);
    for demo in demos::DEMOS {
        println!("  {:width$}  {}", demo.name, demo.about);
    }
}

fn run_demo(name: &str, ticks: Option<u64>) -> Result<()> {
    let Some(demo) = demos::find(name) else {
        bail!("unknown demo '{name}' (try `arbor list`)");
    };
    tracing::info!(demo = demo.name, "running demo");

    let mut bt = demo.build()?;
    bt.setup(Duration::from_secs(1))
        .with_context(|| format!("setting up demo '{name}'"))?;
    drive(&mut bt, ticks.unwrap_or(demo.ticks));
    Ok(())
}

fn run_file(path: &PathBuf, ticks: Option<u64>) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config = TreeConfig::from_json_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    tracing::info!(file = %path.display(), "running tree file");

    let timeout = config.setup_timeout();
    let max_ticks = ticks.unwrap_or(config.max_ticks);
    let mut bt = config
        .build()
        .with_context(|| format!("building tree from {}", path.display()))?;
    bt.setup(timeout).context("tree setup")?;
    drive(&mut bt, max_ticks);
    Ok(())
}

/// Ticks until the root resolves or `max_ticks` ticks have run, printing
/// each traversal.
fn drive(bt: &mut BehaviourTree, max_ticks: u64) {
    for _ in 0..max_ticks {
        let traversal = bt.tick();
        print_tick(bt.tree(), &traversal);
        if bt.status().is_resolved() {
            break;
        }
    }

    let keys: Vec<&str> = bt.blackboard().keys().collect();
    if !keys.is_empty() {
        println!("blackboard keys: {}", keys.join(", "));
    }
    tracing::info!(ticks = bt.count(), status = %bt.status(), "done");
}

fn print_tick(tree: &Tree, traversal: &Traversal) {
    let root = &tree[tree.root()];
    println!("--- tick {} [{}] ---", traversal.tick(), root.status());
    for &id in traversal {
        let entry = &tree[id];
        let indent = "  ".repeat(depth(tree, id));
        let feedback = entry.feedback_message();
        if feedback.is_empty() {
            println!("{indent}{} [{}]", entry.name(), entry.status());
        } else {
            println!("{indent}{} [{}] -- {feedback}", entry.name(), entry.status());
        }
    }
}

fn depth(tree: &Tree, id: NodeId) -> usize {
    std::iter::successors(tree.get(id).and_then(|e| e.parent()), |p| {
        tree.get(*p).and_then(|e| e.parent())
    })
    .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor::Status;

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["arbor", "demo", "retry", "--ticks", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Demo { ref name, ticks: Some(3) } if name == "retry"
        ));

        let cli = Cli::try_parse_from(["arbor", "-v", "run", "tree.json"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Run { ticks: None, .. }));
    }

    #[test]
    fn sample_patrol_tree_completes() {
        let config = TreeConfig::from_json_str(include_str!("../trees/patrol.json")).unwrap();
        let max_ticks = config.max_ticks;
        let mut bt = config.build().unwrap();
        bt.setup(Duration::from_millis(500)).unwrap();

        assert_eq!(bt.tick_until_resolved(max_ticks), Status::Success);
        assert_eq!(bt.count(), 9);
    }

    #[test]
    fn drive_stops_once_the_root_resolves() {
        let mut bt = demos::find("sequence").unwrap().build().unwrap();
        drive(&mut bt, 50);
        assert_eq!(bt.count(), 3);
        assert_eq!(bt.status(), Status::Success);

        let mut bt = demos::find("skeleton").unwrap().build().unwrap();
        drive(&mut bt, 2);
        assert_eq!(bt.count(), 2);
    }

    #[test]
    fn depth_counts_ancestors() {
        let bt = demos::find("skeleton").unwrap().build().unwrap();
        let tree = bt.tree();
        let job = tree.find("Job").unwrap();
        assert_eq!(depth(tree, tree.root()), 0);
        assert_eq!(depth(tree, job), 3);
    }
}
