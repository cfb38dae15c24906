//! Corruption-tolerant tree compaction.
//!
//! Packing rebuilds a tree into a fresh store, dropping what is no longer
//! worth keeping: subtrees rooted in illegal (or tombstoned) moves, and the
//! continuations of branches whose score says the game has already gone off
//! the rails. Records the source file cannot even deliver are logged and
//! skipped; a store damaged by an old bug or a crash must still pack as
//! far as it can, because this is exactly the tool that repairs it.

use book_core::{Move, Position};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::TreeResult;
use crate::record::Slot;
use crate::tree::ExperienceTree;

/// Counters from one pack run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackStats {
    /// Branches re-inserted into the output store.
    pub copied: u64,
    /// Branches dropped because their move is illegal where it sits.
    pub illegal: u64,
    /// Tombstones silently left behind.
    pub tombstones: u64,
    /// Records the source store could not read.
    pub unreadable: u64,
    /// Read-back verification failures (only with `verify`).
    pub verify_mismatches: u64,
}

/// Rebuild the tree at `in_path` into a fresh store at `out_path`.
///
/// `pos` must be the game's starting position; it is restored before
/// returning. Subtrees are pruned beneath any analyzed branch whose score
/// lies outside `[-window, window]`; the branch itself is kept as a record
/// of the judgment, but lines that unbalanced are not worth carrying.
/// With `verify`, every copied branch is immediately read back from the
/// output store and compared.
pub fn pack<P: Position>(
    in_path: impl AsRef<Path>,
    out_path: impl AsRef<Path>,
    pos: &mut P,
    window: i16,
    verify: bool,
) -> TreeResult<PackStats> {
    let mut input = ExperienceTree::open(in_path.as_ref())?;
    let budget = input.num_nodes()?.max(1);
    let output = ExperienceTree::create(out_path.as_ref())?;

    let mut run = PackRun {
        input,
        output,
        window,
        verify,
        budget,
        path: Vec::new(),
        stats: PackStats::default(),
    };
    run.packer(Slot::ROOT, pos, 0)?;
    run.output.flush()?;

    info!(
        copied = run.stats.copied,
        illegal = run.stats.illegal,
        tombstones = run.stats.tombstones,
        unreadable = run.stats.unreadable,
        "pack finished"
    );
    Ok(run.stats)
}

struct PackRun {
    input: ExperienceTree,
    output: ExperienceTree,
    window: i16,
    verify: bool,
    budget: i64,
    path: Vec<Move>,
    stats: PackStats,
}

impl PackRun {
    fn packer<P: Position>(
        &mut self,
        mut offset: Slot,
        pos: &mut P,
        depth: i64,
    ) -> TreeResult<()> {
        if depth > self.budget {
            warn!(depth, "recursion deeper than the store is large; abandoning cyclic subtree");
            return Ok(());
        }
        let legal = pos.legal_moves();

        let mut prev = Slot::NONE;
        let mut steps = 0i64;
        while offset.is_some() {
            steps += 1;
            if steps > self.budget {
                warn!(%offset, "sibling chain cycles; abandoning the rest");
                break;
            }
            let branch = match self.input.read(offset) {
                Ok(branch) => branch,
                Err(err) => {
                    warn!(%offset, %prev, %err, "cannot read branch; skipping the rest of this chain");
                    self.stats.unreadable += 1;
                    break;
                }
            };

            if legal.iter().any(|m| m.same_squares(branch.mv)) {
                self.output.remember_position(
                    pos,
                    &self.path,
                    branch.mv,
                    branch.time_analyzed,
                    branch.nodes_evaluated,
                    branch.num_accesses,
                    branch.wins_and_losses,
                )?;
                self.stats.copied += 1;
                if self.verify {
                    self.verify_copy(&branch, offset)?;
                }

                let keep_subtree = branch.child.is_some()
                    && (branch.nodes_evaluated == 0
                        || (branch.mv.score >= -self.window && branch.mv.score <= self.window));
                let undo = pos.make_move(branch.mv);
                if keep_subtree {
                    self.path.push(branch.mv);
                    self.packer(branch.child, pos, depth + 1)?;
                    self.path.pop();
                } else if branch.child.is_some() {
                    debug!(%offset, score = branch.mv.score, "score outside window; pruning subtree");
                }
                pos.unmake_move(branch.mv, undo);
            } else if branch.is_tombstone() {
                self.stats.tombstones += 1;
            } else {
                warn!(
                    %offset,
                    source = branch.mv.source,
                    dest = branch.mv.dest,
                    "illegal move in tree; dropping its subtree"
                );
                self.stats.illegal += 1;
            }

            prev = offset;
            offset = branch.sibling;
        }
        Ok(())
    }

    /// Read the branch we just wrote back out of the output store and make
    /// sure nothing was lost in translation.
    fn verify_copy(&mut self, original: &crate::record::Branch, offset: Slot) -> TreeResult<()> {
        match self.output.locate_branch(&self.path, original.mv)? {
            Some((_, written)) => {
                let matches = written.mv == original.mv
                    && written.time_analyzed == original.time_analyzed
                    && written.wins_and_losses == original.wins_and_losses
                    && written.nodes_evaluated == original.nodes_evaluated
                    && written.num_accesses == original.num_accesses;
                if !matches {
                    warn!(%offset, "read-back branch differs from source");
                    self.stats.verify_mismatches += 1;
                }
            }
            None => {
                warn!(%offset, "cannot read back branch just written");
                self.stats.verify_mismatches += 1;
            }
        }
        Ok(())
    }
}
