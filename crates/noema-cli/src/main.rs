//! noema - command line host for the reasoning engine
//!
//! Loads rule and operator files, posts simple assertions, runs cognition
//! cycles, and dumps engine state for inspection. The engine itself never
//! touches the terminal; everything user-facing lives here.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use noema_core::{Core, NodeList, VERSION};

#[derive(Parser)]
#[command(name = "noema", version = VERSION, about = "Attention-driven reasoning engine host")]
struct Cli {
    /// Knowledge base stem (loads <base>.rules / <base>.ops plus any
    /// <base>.conf / <base>.pref overrides). May repeat.
    #[arg(short, long)]
    kb: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run cognition cycles, optionally seeding foci from a file.
    Run {
        /// Number of cycles to execute.
        #[arg(short, long, default_value_t = 5)]
        cycles: usize,

        /// Chain file to seed the attention tree with.
        #[arg(long)]
        foci: Option<PathBuf>,

        /// Garbage collect between cycles.
        #[arg(long)]
        gc: bool,

        /// Dump remaining foci to this file afterwards.
        #[arg(long)]
        dump: Option<PathBuf>,
    },

    /// Validate knowledge files by loading and re-serializing them.
    Check,

    /// Print engine statistics as JSON after loading.
    Stats,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut core = Core::new();

    for base in &cli.kb {
        let (nr, no) = core.load_kb(base, 1);
        eprintln!(
            "{} {} rules, {} operators from {}",
            "loaded".green(),
            nr,
            no,
            base.display()
        );
    }

    match cli.command {
        Command::Run {
            cycles,
            foci,
            gc,
            dump,
        } => {
            if let Some(path) = foci {
                let n = core
                    .load_foci(&path, true)
                    .with_context(|| format!("reading {}", path.display()))?;
                eprintln!("{} {} foci from {}", "seeded".green(), n, path.display());
            }
            for i in 0..cycles {
                let served = core.cycle(gc);
                println!(
                    "{} {:3}: {} foci serviced, {} live, {} nodes",
                    "cycle".bold(),
                    i + 1,
                    served,
                    core.atree.active(),
                    core.wmem.wmem_size()
                );
            }
            print_memory(&core);
            if let Some(path) = dump {
                let n = core.save_foci(&path)?;
                eprintln!("{} {} foci to {}", "dumped".green(), n, path.display());
            }
        }

        Command::Check => {
            let mut rules_out = String::new();
            for r in core.amem.rules() {
                r.save(&mut rules_out, 2)
                    .map_err(|e| anyhow::anyhow!("rule {} failed to format: {e}", r.id))?;
                rules_out.push('\n');
            }
            let mut ops_out = String::new();
            for op in core.pmem.operators() {
                op.save(&mut ops_out)
                    .map_err(|e| anyhow::anyhow!("operator {} failed to format: {e}", op.id))?;
                ops_out.push('\n');
            }
            println!("{rules_out}{ops_out}");
            eprintln!(
                "{} {} rules, {} operators",
                "ok".green(),
                core.amem.len(),
                core.pmem.len()
            );
        }

        Command::Stats => {
            core.cycle(false);
            let stats = serde_json::json!({
                "memory": core.wmem.stats(),
                "foci": core.atree.stats(core.now()),
                "mood": core.mood,
                "rules": core.amem.len(),
                "operators": core.pmem.len(),
            });
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }
    Ok(())
}

/// Pretty-print the believed contents of working memory.
fn print_memory(core: &Core) {
    println!("\n{} ({} nodes)", "WMEM".bold(), core.wmem.wmem_size());
    let pool = core.wmem.pool();
    for id in pool.ids() {
        let Some(n) = pool.node(id) else { continue };
        if !n.visible() || n.belief() <= 0.0 {
            continue;
        }
        let mut line = format!("  {}", n.nick());
        if let Some(w) = n.lex() {
            line.push_str(&format!(" -lex- {w}"));
        }
        if n.neg() > 0 {
            line.push_str(" -neg- 1");
        }
        for a in n.args_view() {
            let tgt = pool.node(a.val).map(|v| v.nick()).unwrap_or_default();
            line.push_str(&format!(" -{}-> {}", a.slot, tgt));
        }
        if n.belief() != 1.0 {
            line.push_str(&format!("  ({:4.2})", n.belief()));
        }
        println!("{line}");
    }

    let halo = core.wmem.halo_pool();
    if halo.node_count() > 0 {
        println!("\n{} ({} nodes)", "HALO".bold(), halo.node_count());
        for id in halo.ids() {
            let Some(n) = halo.node(id) else { continue };
            let mut line = format!("  {}", n.nick().dimmed());
            if let Some(w) = n.lex() {
                line.push_str(&format!(" -lex- {w}"));
            }
            for a in n.args_view() {
                let tgt = core
                    .wmem
                    .get(a.val)
                    .map(|v| v.nick())
                    .unwrap_or_default();
                line.push_str(&format!(" -{}-> {}", a.slot, tgt));
            }
            line.push_str(&format!("  ({:4.2})", n.belief()));
            println!("{line}");
        }
    }
}
