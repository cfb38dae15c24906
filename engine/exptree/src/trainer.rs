//! Depth-scheduled exhaustive training.
//!
//! The trainer sweeps the tree one ply level at a time: for every position
//! at the current depth whose recorded analysis falls short of the time
//! limit, it invokes the injected search callback and feeds the verdict
//! back through `remember_position`. Newly discovered branches extend the
//! frontier, so each completed level seeds the next.
//!
//! Cancellation is cooperative: a [`CancelToken`] is polled between
//! positions, and a cancelled run flushes the store and returns control to
//! the caller with a [`TrainStatus::Cancelled`] report. The process is
//! never torn down from in here.

use book_core::{Move, Position};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::error::TreeResult;
use crate::record::Slot;
use crate::tree::{ExperienceTree, Remember};

/// Shared flag asking a running trainer to stop after the current node.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What the injected search produced for one position. The score travels
/// inside `best.score`.
#[derive(Debug, Clone, Copy)]
pub struct SearchOutcome {
    pub best: Move,
    pub nodes_evaluated: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainStatus {
    Completed,
    Cancelled,
}

/// Counters from one training run.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub status: TrainStatus,
    pub positions_finished: u64,
    pub branches_added: u64,
    pub branches_updated: u64,
}

/// Count positions at exactly `target_depth` plies below `root` whose
/// analysis investment is still below `search_time`.
///
/// Recursion only follows branches that are legal continuations of the
/// current position, mirroring the trainer itself, and a ply whose sibling
/// chain already holds a sufficiently analyzed legal move counts zero:
/// that position has been done as well or better.
pub fn num_nodes_at_depth<P: Position>(
    tree: &mut ExperienceTree,
    pos: &mut P,
    root: Slot,
    target_depth: usize,
    search_time: i32,
) -> TreeResult<i64> {
    let budget = tree.num_nodes()?.max(1);
    count_at_depth(tree, pos, root, target_depth, 0, search_time, budget)
}

#[allow(clippy::too_many_arguments)]
fn count_at_depth<P: Position>(
    tree: &mut ExperienceTree,
    pos: &mut P,
    root: Slot,
    target_depth: usize,
    current_depth: usize,
    search_time: i32,
    budget: i64,
) -> TreeResult<i64> {
    let legal = pos.legal_moves();

    if current_depth < target_depth {
        let mut total = 0;
        let mut offset = root;
        let mut steps = 0i64;
        while offset.is_some() {
            steps += 1;
            if steps > budget {
                return Ok(0);
            }
            let Ok(branch) = tree.read(offset) else {
                return Ok(0);
            };
            if branch.child.is_some() && is_in(&legal, branch.mv) {
                let undo = pos.make_move(branch.mv);
                total += count_at_depth(
                    tree,
                    pos,
                    branch.child,
                    target_depth,
                    current_depth + 1,
                    search_time,
                    budget,
                )?;
                pos.unmake_move(branch.mv, undo);
            }
            offset = branch.sibling;
        }
        Ok(total)
    } else {
        let mut offset = root;
        let mut steps = 0i64;
        while offset.is_some() {
            steps += 1;
            if steps > budget {
                return Ok(0);
            }
            let Ok(branch) = tree.read(offset) else {
                return Ok(0);
            };
            if branch.time_analyzed >= search_time && is_in(&legal, branch.mv) {
                return Ok(0);
            }
            offset = branch.sibling;
        }
        // Nothing here meets the bar (or the position is still unexplored):
        // one position's worth of work.
        Ok(1)
    }
}

/// Run an exhaustive training pass over the whole tree.
///
/// `pos` must be the game's starting position; it is restored before
/// returning. `search` is called once per position needing work and its
/// verdict recorded with `time_limit` as the investment.
pub fn train<P, F>(
    tree: &mut ExperienceTree,
    pos: &mut P,
    search: F,
    time_limit: i32,
    token: &CancelToken,
) -> TreeResult<TrainReport>
where
    P: Position,
    F: FnMut(&mut P) -> SearchOutcome,
{
    let total = tree.num_nodes()?;
    let max_depth = tree.max_depth();
    info!(total_nodes = total, time_limit, "starting training pass");

    let mut table = vec![0i64; max_depth + 2];
    for (depth, entry) in table.iter_mut().enumerate() {
        *entry = num_nodes_at_depth(tree, pos, Slot::ROOT, depth, time_limit)?;
    }
    info!(?table, "positions needing work per depth");

    let mut run = TrainRun {
        tree,
        search,
        time_limit,
        token,
        table,
        path: Vec::new(),
        report: TrainReport {
            status: TrainStatus::Completed,
            positions_finished: 0,
            branches_added: 0,
            branches_updated: 0,
        },
    };

    for depth in 0..=max_depth {
        if token.is_cancelled() {
            run.report.status = TrainStatus::Cancelled;
            break;
        }
        if run.table[depth] <= 0 {
            continue;
        }
        info!(depth, remaining = run.table[depth], "examining depth");
        if run.train_depth(Slot::ROOT, pos, depth, 0)? == Flow::Stop {
            run.report.status = TrainStatus::Cancelled;
            break;
        }
    }

    run.tree.flush()?;
    let report = run.report;
    match report.status {
        TrainStatus::Completed => info!(
            finished = report.positions_finished,
            added = report.branches_added,
            updated = report.branches_updated,
            "training pass complete"
        ),
        TrainStatus::Cancelled => info!(
            finished = report.positions_finished,
            "training cancelled; store flushed"
        ),
    }
    Ok(report)
}

#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct TrainRun<'t, F> {
    tree: &'t mut ExperienceTree,
    search: F,
    time_limit: i32,
    token: &'t CancelToken,
    table: Vec<i64>,
    path: Vec<Move>,
    report: TrainReport,
}

impl<F> TrainRun<'_, F> {
    fn train_depth<P>(
        &mut self,
        mut offset: Slot,
        pos: &mut P,
        target_depth: usize,
        current_depth: usize,
    ) -> TreeResult<Flow>
    where
        P: Position,
        F: FnMut(&mut P) -> SearchOutcome,
    {
        let legal = pos.legal_moves();
        if legal.is_empty() || pos.is_draw() {
            return Ok(Flow::Continue);
        }

        if current_depth < target_depth {
            while offset.is_some() {
                let Ok(branch) = self.tree.read(offset) else {
                    return Ok(Flow::Continue);
                };
                if is_in(&legal, branch.mv) {
                    let undo = pos.make_move(branch.mv);
                    self.path.push(branch.mv);
                    let flow =
                        self.train_depth(branch.child, pos, target_depth, current_depth + 1)?;
                    self.path.pop();
                    pos.unmake_move(branch.mv, undo);
                    if flow == Flow::Stop {
                        return Ok(Flow::Stop);
                    }
                }
                offset = branch.sibling;
            }
            return Ok(Flow::Continue);
        }

        // At the target depth: skip the whole group if any sibling has
        // already been analyzed this well.
        let mut scan = offset;
        while scan.is_some() {
            let Ok(branch) = self.tree.read(scan) else {
                return Ok(Flow::Continue);
            };
            if branch.time_analyzed >= self.time_limit {
                return Ok(Flow::Continue);
            }
            scan = branch.sibling;
        }

        if self.token.is_cancelled() {
            return Ok(Flow::Stop);
        }

        if self.table[target_depth] > 0 {
            self.table[target_depth] -= 1;
        }
        debug!(
            depth = target_depth,
            remaining = self.table[target_depth],
            "analyzing position"
        );

        let outcome = (self.search)(pos);
        trace!(
            best = %outcome.best,
            score = outcome.best.score,
            nodes = outcome.nodes_evaluated,
            "search verdict"
        );

        match self.tree.remember_position(
            pos,
            &self.path,
            outcome.best,
            self.time_limit,
            outcome.nodes_evaluated,
            1,
            0,
        )? {
            Remember::Inserted => {
                self.report.branches_added += 1;
                // The new branch is a fresh position one level down.
                if target_depth + 1 < self.table.len() {
                    self.table[target_depth + 1] += 1;
                }
            }
            Remember::Updated => self.report.branches_updated += 1,
            Remember::Unchanged => {}
        }
        self.report.positions_finished += 1;
        Ok(Flow::Continue)
    }
}

fn is_in(legal: &[Move], mv: Move) -> bool {
    legal.iter().any(|m| m.same_squares(mv))
}
