//! Expbook trainer - maintenance CLI for the experience tree
//!
//! A command-line front end over the exptree crate:
//! - `stats` / `dump`: inspect the store without changing it
//! - `sample`: draw a book move the way a playing engine would
//! - `train`: run the depth-scheduled trainer with the built-in hexapawn
//!   search until every level meets the time bar, or a stop is requested
//! - `pack`: compact the tree into a fresh file, shedding damage
//! - `audit`: two-pass reference-integrity check
//! - `delete`: tombstone a branch
//!
//! A running `train` can be stopped from outside by creating the signal
//! file (`trainer.close` by default) next to the tree; the trainer flushes,
//! removes the file, and exits cleanly. There is no in-process watcher;
//! the file is polled between searched positions.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use book_config::CentralConfig;
use book_core::{Move, Position};
use exptree::{audit, pack, train, CancelToken, ExperienceTree, Slot, TrainStatus};
use games_hexapawn::{format_move, parse_move, Hexapawn};

mod search;

#[derive(Parser)]
#[command(name = "book-trainer", version, about = "Maintain an Expbook experience tree")]
struct Cli {
    /// Tree file to operate on (default: <data_dir>/<tree_file> from config)
    #[arg(long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show store-level statistics
    Stats,

    /// List recorded continuations after a move sequence (e.g. `dump b1b2`)
    Dump {
        /// Moves from the start position, like `b1b2 a3b2`
        #[arg(value_name = "MOVE")]
        path: Vec<String>,
    },

    /// Draw a book move for the position after a move sequence
    Sample {
        /// RNG seed, for reproducible draws
        #[arg(long, default_value_t = 0)]
        seed: u64,

        #[arg(value_name = "MOVE")]
        path: Vec<String>,
    },

    /// Run the depth-scheduled trainer until done or signalled to stop
    Train {
        /// Analysis budget per position in centiseconds (default from config)
        #[arg(long)]
        time_limit: Option<i32>,
    },

    /// Compact the tree into OUTPUT, dropping damaged and wild lines
    Pack {
        output: PathBuf,

        /// Score window outside which subtrees are pruned (default from config)
        #[arg(long)]
        window: Option<i16>,

        /// Read every copied branch back and compare it
        #[arg(long)]
        verify: bool,
    },

    /// Check sibling/child reference integrity without modifying the tree
    Audit,

    /// Tombstone the branch addressed by a move sequence (last move is the
    /// target, the rest is the path to it)
    Delete {
        #[arg(value_name = "MOVE", required = true)]
        path: Vec<String>,
    },
}

fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = book_config::load_config();
    init_tracing(&config.common.log_level);

    let tree_path = cli.file.clone().unwrap_or_else(|| {
        Path::new(&config.common.data_dir).join(&config.common.tree_file)
    });

    match cli.command {
        Command::Stats => stats(&tree_path),
        Command::Dump { path } => dump(&tree_path, &path),
        Command::Sample { seed, path } => sample(&tree_path, &config, seed, &path),
        Command::Train { time_limit } => run_trainer(&tree_path, &config, time_limit),
        Command::Pack {
            output,
            window,
            verify,
        } => run_pack(&tree_path, &output, &config, window, verify),
        Command::Audit => run_audit(&tree_path),
        Command::Delete { path } => delete(&tree_path, &path),
    }
}

/// Replay a textual move sequence from the start, checking legality.
fn replay(texts: &[String]) -> Result<(Hexapawn, Vec<Move>)> {
    let mut game = Hexapawn::new();
    let mut path = Vec::new();
    for text in texts {
        let mv = parse_move(text).with_context(|| format!("bad move {text:?}"))?;
        if !game.is_legal(mv) {
            bail!("{text} is not legal after {}", join_path(&path));
        }
        game.make_move(mv);
        path.push(mv);
    }
    Ok((game, path))
}

fn join_path(path: &[Move]) -> String {
    if path.is_empty() {
        "the start position".to_string()
    } else {
        path.iter()
            .map(|&m| format_move(m))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn stats(tree_path: &Path) -> Result<()> {
    let mut tree = open_tree(tree_path)?;
    let nodes = tree.num_nodes()?;
    let mut tombstones = 0i64;
    let mut analyzed = 0i64;
    for index in 0..nodes {
        let branch = tree.read(Slot::from_index(index))?;
        if branch.is_tombstone() {
            tombstones += 1;
        }
        if branch.time_analyzed > 0 {
            analyzed += 1;
        }
    }
    println!("tree file : {}", tree_path.display());
    println!("records   : {nodes}");
    println!("analyzed  : {analyzed}");
    println!("tombstones: {tombstones}");
    println!("root moves: {}", tree.branches_at(&[])?.len());
    Ok(())
}

fn dump(tree_path: &Path, texts: &[String]) -> Result<()> {
    let (_, path) = replay(texts)?;
    let mut tree = open_tree(tree_path)?;
    let branches = tree.branches_at(&path)?;
    if branches.is_empty() {
        println!("no continuations recorded after {}", join_path(&path));
        return Ok(());
    }
    println!(
        "{:>8}  {:<6} {:>6} {:>8} {:>5} {:>9} {:>7}  {:>8} {:>8}",
        "slot", "move", "score", "time(cs)", "w/l", "nodes", "picked", "child", "sibling"
    );
    for (slot, branch) in branches {
        let text = if branch.is_tombstone() {
            "------".to_string()
        } else {
            format_move(branch.mv)
        };
        println!(
            "{:>8}  {:<6} {:>6} {:>8} {:>5} {:>9} {:>7}  {:>8} {:>8}",
            slot.to_string(),
            text,
            branch.mv.score,
            branch.time_analyzed,
            branch.wins_and_losses,
            branch.nodes_evaluated,
            branch.num_accesses,
            branch.child.to_string(),
            branch.sibling.to_string(),
        );
    }
    Ok(())
}

fn sample(tree_path: &Path, config: &CentralConfig, seed: u64, texts: &[String]) -> Result<()> {
    let (game, path) = replay(texts)?;
    let mut tree = open_tree(tree_path)?;
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    match tree.familiar_position(&game, &path, config.learning.min_trust_time, &mut rng)? {
        Some(mv) => println!("{} (score {})", format_move(mv), mv.score),
        None => println!(
            "no trusted continuation after {} (threshold {}cs)",
            join_path(&path),
            config.learning.min_trust_time
        ),
    }
    Ok(())
}

fn run_trainer(tree_path: &Path, config: &CentralConfig, time_limit: Option<i32>) -> Result<()> {
    if let Some(parent) = tree_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut tree = ExperienceTree::open_or_create(tree_path)
        .with_context(|| format!("cannot open or create {}", tree_path.display()))?
        .with_max_depth(config.learning.max_learn_depth as usize);

    let time_limit = time_limit.unwrap_or(config.trainer.time_limit);
    let signal_path = tree_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&config.trainer.signal_file);
    if signal_path.exists() {
        bail!(
            "stale signal file {}; remove it before training",
            signal_path.display()
        );
    }

    info!(
        tree = %tree_path.display(),
        time_limit,
        signal = %signal_path.display(),
        "starting trainer"
    );

    let token = CancelToken::new();
    let poll_token = token.clone();
    let poll_path = signal_path.clone();
    let mut game = Hexapawn::new();
    let search = move |pos: &mut Hexapawn| {
        // The signal file is the external stop request; polling here keeps
        // the check at the same between-positions granularity as the token.
        if poll_path.exists() {
            info!(signal = %poll_path.display(), "stop requested via signal file");
            poll_token.cancel();
        }
        search::search_position(pos)
    };

    let report = train(&mut tree, &mut game, search, time_limit, &token)?;
    println!(
        "{}: {} positions, {} new branches, {} updates",
        match report.status {
            TrainStatus::Completed => "training complete",
            TrainStatus::Cancelled => "training stopped",
        },
        report.positions_finished,
        report.branches_added,
        report.branches_updated
    );

    if report.status == TrainStatus::Cancelled && signal_path.exists() {
        // Removing the file tells the signaller the store is closed.
        std::fs::remove_file(&signal_path)
            .with_context(|| format!("cannot remove {}", signal_path.display()))?;
        info!("signal file removed");
    }
    Ok(())
}

fn run_pack(
    tree_path: &Path,
    output: &Path,
    config: &CentralConfig,
    window: Option<i16>,
    verify: bool,
) -> Result<()> {
    let window = window.unwrap_or(config.pack.window);
    let mut game = Hexapawn::new();
    let stats = pack(tree_path, output, &mut game, window, verify)
        .with_context(|| format!("packing {} failed", tree_path.display()))?;
    println!(
        "packed {} -> {}: {} copied, {} illegal, {} tombstones dropped, {} unreadable",
        tree_path.display(),
        output.display(),
        stats.copied,
        stats.illegal,
        stats.tombstones,
        stats.unreadable
    );
    if verify {
        println!("verify mismatches: {}", stats.verify_mismatches);
    }
    Ok(())
}

fn run_audit(tree_path: &Path) -> Result<()> {
    let mut tree = open_tree(tree_path)?;
    let mut game = Hexapawn::new();
    let report = audit(&mut tree, &mut game, Slot::ROOT)?;
    println!("records            : {}", report.nodes);
    println!("orphans            : {}", report.orphans.len());
    println!("multiply referenced: {}", report.multiply_referenced.len());
    println!("bad links          : {}", report.bad_links);
    println!("unreadable         : {}", report.unreadable);
    for slot in &report.orphans {
        println!("  orphan at slot {slot}");
    }
    for (slot, count) in &report.multiply_referenced {
        println!("  slot {slot} referenced {count} times");
    }
    if report.is_clean() {
        println!("tree is clean");
    } else {
        warn!("tree has integrity problems; consider packing into a fresh file");
    }
    Ok(())
}

fn delete(tree_path: &Path, texts: &[String]) -> Result<()> {
    let Some((target_text, prefix)) = texts.split_last() else {
        bail!("delete needs at least one move");
    };
    let (_, path) = replay(prefix)?;
    let target =
        parse_move(target_text).with_context(|| format!("bad move {target_text:?}"))?;

    let mut tree = open_tree(tree_path)?;
    match tree.locate_branch(&path, target)? {
        Some((slot, _)) => {
            tree.tombstone(slot)?;
            println!("tombstoned {} after {}", target_text, join_path(&path));
            Ok(())
        }
        None => bail!("{} is not recorded after {}", target_text, join_path(&path)),
    }
}

fn open_tree(tree_path: &Path) -> Result<ExperienceTree> {
    ExperienceTree::open(tree_path)
        .with_context(|| format!("cannot open tree file {}", tree_path.display()))
}
