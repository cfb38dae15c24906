//! The experience tree: path-addressed storage of move judgments.
//!
//! A path, the sequence of moves played from the game start, addresses at
//! most one branch per ply: start at the root sibling chain (record 0),
//! scan siblings for the branch matching the path's move, then descend
//! through its child link. The tree is never held in memory; every walk is
//! a series of positional reads against the store.
//!
//! Sibling scans carry a step budget of the current node count, so a store
//! whose links were damaged into a cycle produces an error instead of an
//! endless loop.

use book_core::{Move, Position, Side, Winner};
use rand::Rng;
use rand_chacha::ChaCha20Rng;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{StoreError, TreeResult};
use crate::record::{Branch, Slot};
use crate::store::TreeFile;

/// Plies past this depth are never recorded unless the caller overrides it.
pub const DEFAULT_MAX_LEARN_DEPTH: usize = 30;

/// Weight of one observed win/loss relative to one second of analysis when
/// scoring branches for retrieval.
const GAME_VALUE: i32 = 5;

/// What `remember_position` did with the observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remember {
    /// Policy rejection: nothing was written.
    Unchanged,
    /// An existing branch matched; it was refreshed if the new observation
    /// carried more authority.
    Updated,
    /// A new branch was appended.
    Inserted,
}

/// Path-addressed view over a [`TreeFile`].
#[derive(Debug)]
pub struct ExperienceTree {
    store: TreeFile,
    max_depth: usize,
}

impl ExperienceTree {
    pub fn create(path: impl AsRef<Path>) -> TreeResult<Self> {
        Ok(Self::wrap(TreeFile::create(path)?))
    }

    pub fn open(path: impl AsRef<Path>) -> TreeResult<Self> {
        Ok(Self::wrap(TreeFile::open(path)?))
    }

    pub fn open_or_create(path: impl AsRef<Path>) -> TreeResult<Self> {
        Ok(Self::wrap(TreeFile::open_or_create(path)?))
    }

    fn wrap(store: TreeFile) -> Self {
        Self {
            store,
            max_depth: DEFAULT_MAX_LEARN_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn num_nodes(&mut self) -> TreeResult<i64> {
        self.store.num_nodes()
    }

    pub fn flush(&mut self) -> TreeResult<()> {
        self.store.flush()
    }

    /// Direct record access for maintenance passes (pack, audit, editor).
    pub fn read(&mut self, slot: Slot) -> TreeResult<Branch> {
        self.store.read(slot)
    }

    /// Direct record write for maintenance passes.
    pub fn write(&mut self, slot: Slot, branch: &Branch) -> TreeResult<()> {
        self.store.write(slot, branch)
    }

    /// Record that `best` was judged the strongest continuation after
    /// `path`. `pos` must be the position reached by playing `path`.
    ///
    /// Missing plies along the path are auto-created as zero-investment
    /// placeholders. At the final ply, an existing branch is only
    /// overwritten when the new observation carries more authority: nodes
    /// evaluated when the stored branch has a nodes count, analysis time
    /// otherwise. Inserts and updates are flushed immediately.
    ///
    /// Returns [`Remember::Unchanged`] without touching the store when the
    /// path is deeper than the learn limit or `best` is not legal in `pos`.
    #[allow(clippy::too_many_arguments)]
    pub fn remember_position<P: Position>(
        &mut self,
        pos: &P,
        path: &[Move],
        best: Move,
        time_analyzed: i32,
        nodes_evaluated: i32,
        num_accesses: i32,
        wins_and_losses: i32,
    ) -> TreeResult<Remember> {
        if path.len() > self.max_depth {
            return Ok(Remember::Unchanged);
        }
        if !pos.is_legal(best) {
            // Safety valve: never let a bad caller corrupt the tree.
            return Ok(Remember::Unchanged);
        }

        // Walk the path, creating missing spine branches as we go.
        let mut budget = self.chain_budget()?;
        let mut offset = Slot::ROOT;
        let mut parent = Slot::NONE;
        for &mv in path {
            let mut child = Slot::NONE;
            let mut found = false;
            let mut steps = 0i64;
            while offset.is_some() && !found {
                steps += 1;
                if steps > budget {
                    return Err(StoreError::CyclicChain { slot: offset });
                }
                match self.store.read(offset) {
                    Ok(branch) => {
                        if branch.mv.same_squares(mv) {
                            found = true;
                            child = branch.child;
                        } else {
                            offset = branch.sibling;
                        }
                    }
                    Err(_) => {
                        // A brand-new store has no record 0 yet; treat the
                        // chain as ended and let the insert below build it.
                        debug!(%offset, "unreadable record while walking path");
                        child = Slot::NONE;
                        offset = Slot::NONE;
                    }
                }
            }

            if !found {
                let mut placeholder = Branch::new(mv);
                offset = self.store.insert(&mut placeholder, parent)?;
                budget += 1;
                child = Slot::NONE;
            }

            parent = offset;
            offset = child;
        }

        // Look for the move among the continuations at the final ply.
        let mut steps = 0i64;
        while offset.is_some() {
            steps += 1;
            if steps > budget {
                return Err(StoreError::CyclicChain { slot: offset });
            }
            let Ok(mut branch) = self.store.read(offset) else {
                break;
            };
            if branch.mv.same_squares(best) {
                let supersedes = if branch.nodes_evaluated > 0 {
                    nodes_evaluated > branch.nodes_evaluated
                } else {
                    time_analyzed > branch.time_analyzed
                };
                if supersedes {
                    branch.time_analyzed = time_analyzed;
                    branch.mv.score = best.score;
                    branch.nodes_evaluated = nodes_evaluated;
                    branch.num_accesses = num_accesses + 1;
                    branch.wins_and_losses = wins_and_losses;
                    self.store.write(offset, &branch)?;
                    self.store.flush()?;
                }
                return Ok(Remember::Updated);
            }
            offset = branch.sibling;
        }

        let mut branch = Branch {
            mv: best,
            time_analyzed,
            nodes_evaluated,
            num_accesses,
            wins_and_losses,
            ..Branch::default()
        };
        self.store.insert(&mut branch, parent)?;
        self.store.flush()?;
        Ok(Remember::Inserted)
    }

    /// Pick a trusted continuation for the position reached by `path`, or
    /// `None` when the store has nothing it believes in.
    ///
    /// Every recorded continuation is weighted by analysis time plus a
    /// win/loss bonus from the mover's point of view; a weighted random
    /// draw then favors well-studied, well-scoring lines while keeping
    /// variety. The gate: unless some branch has at least `min_time`
    /// centiseconds of analysis, the whole position is considered
    /// unfamiliar. The chosen move is re-checked against `pos`; a mismatch
    /// means the store is corrupt and nothing is returned.
    pub fn familiar_position<P: Position>(
        &mut self,
        pos: &P,
        path: &[Move],
        min_time: i32,
        rng: &mut ChaCha20Rng,
    ) -> TreeResult<Option<Move>> {
        let Some(mut offset) = self.chain_at(path)? else {
            return Ok(None);
        };

        let white_to_move = pos.side_to_move() == Side::White;
        let mut candidates: Vec<(Slot, Move, i32)> = Vec::new();
        let mut total: i64 = 0;
        let mut max_time = 0i32;

        let budget = self.chain_budget()?;
        let mut steps = 0i64;
        while offset.is_some() {
            steps += 1;
            if steps > budget {
                return Err(StoreError::CyclicChain { slot: offset });
            }
            let branch = match self.store.read(offset) {
                Ok(branch) => branch,
                Err(err) => {
                    warn!(%offset, %err, "damaged sibling chain; ignoring the rest");
                    break;
                }
            };
            let weight = branch_weight(&branch, white_to_move);
            total += weight as i64;
            candidates.push((offset, branch.mv, weight));
            max_time = max_time.max(branch.time_analyzed);
            offset = branch.sibling;
        }

        if max_time < min_time || total == 0 {
            return Ok(None);
        }

        let mut draw = rng.gen_range(0..total);
        for (slot, mv, weight) in candidates {
            draw -= weight as i64;
            if draw < 0 {
                if !pos.is_legal(mv) {
                    warn!(%slot, %mv, "stored move fails the legality check (corrupt store)");
                    return Ok(None);
                }
                if let Ok(mut branch) = self.store.read(slot) {
                    branch.num_accesses += 1;
                    self.store.write(slot, &branch)?;
                    self.store.flush()?;
                }
                return Ok(Some(mv));
            }
        }

        Ok(None)
    }

    /// Fold a finished game into the win/loss tallies along the path that
    /// was actually played.
    ///
    /// Draws are deliberately not absorbed: `Winner::Neither` is a no-op.
    /// Callers should not rely on that staying true forever. The walk stops
    /// quietly at the first ply the tree has never seen.
    pub fn learn_from_game(&mut self, path: &[Move], winner: Winner) -> TreeResult<()> {
        let delta = match winner {
            Winner::White => 1,
            Winner::Black => -1,
            Winner::Neither => return Ok(()),
        };

        let budget = self.chain_budget()?;
        let mut offset = Slot::ROOT;
        'plies: for &mv in path {
            let mut steps = 0i64;
            while offset.is_some() {
                steps += 1;
                if steps > budget {
                    return Err(StoreError::CyclicChain { slot: offset });
                }
                let Ok(mut branch) = self.store.read(offset) else {
                    break 'plies;
                };
                if branch.mv.same_squares(mv) {
                    branch.wins_and_losses += delta;
                    self.store.write(offset, &branch)?;
                    offset = branch.child;
                    continue 'plies;
                }
                offset = branch.sibling;
            }
            // This continuation was never recorded; nothing left to credit.
            break;
        }
        self.store.flush()
    }

    /// Find the branch for `mv` at the end of `path`, for read-back
    /// verification and editing.
    pub fn locate_branch(&mut self, path: &[Move], mv: Move) -> TreeResult<Option<(Slot, Branch)>> {
        let Some(mut offset) = self.chain_at(path)? else {
            return Ok(None);
        };
        let budget = self.chain_budget()?;
        let mut steps = 0i64;
        while offset.is_some() {
            steps += 1;
            if steps > budget {
                return Err(StoreError::CyclicChain { slot: offset });
            }
            let Ok(branch) = self.store.read(offset) else {
                return Ok(None);
            };
            if branch.mv.same_squares(mv) {
                return Ok(Some((offset, branch)));
            }
            offset = branch.sibling;
        }
        Ok(None)
    }

    /// All recorded continuations at the end of `path`, in stored order.
    pub fn branches_at(&mut self, path: &[Move]) -> TreeResult<Vec<(Slot, Branch)>> {
        let Some(mut offset) = self.chain_at(path)? else {
            return Ok(Vec::new());
        };
        let budget = self.chain_budget()?;
        let mut steps = 0i64;
        let mut out = Vec::new();
        while offset.is_some() {
            steps += 1;
            if steps > budget {
                return Err(StoreError::CyclicChain { slot: offset });
            }
            let Ok(branch) = self.store.read(offset) else {
                break;
            };
            out.push((offset, branch));
            offset = branch.sibling;
        }
        Ok(out)
    }

    /// Tombstone the branch at `slot`: zero its move so traversals skip it,
    /// but keep its links so later siblings stay reachable. Records are
    /// never physically removed and offsets never renumbered; in-flight
    /// paths elsewhere depend on them staying put.
    pub fn tombstone(&mut self, slot: Slot) -> TreeResult<()> {
        let mut branch = self.store.read(slot)?;
        branch.mv = Move::default();
        self.store.write(slot, &branch)?;
        self.store.flush()
    }

    /// Head of the sibling chain at the end of `path`: `None` when some ply
    /// along the way is missing or unreadable, `Some(Slot::NONE)` when the
    /// path exists but has no recorded continuations yet.
    fn chain_at(&mut self, path: &[Move]) -> TreeResult<Option<Slot>> {
        let budget = self.chain_budget()?;
        let mut offset = Slot::ROOT;
        for &mv in path {
            let mut found = None;
            let mut steps = 0i64;
            while offset.is_some() && found.is_none() {
                steps += 1;
                if steps > budget {
                    return Err(StoreError::CyclicChain { slot: offset });
                }
                let Ok(branch) = self.store.read(offset) else {
                    return Ok(None);
                };
                if branch.mv.same_squares(mv) {
                    found = Some(branch.child);
                } else {
                    offset = branch.sibling;
                }
            }
            match found {
                Some(child) => offset = child,
                None => return Ok(None),
            }
        }
        Ok(Some(offset))
    }

    fn chain_budget(&mut self) -> TreeResult<i64> {
        Ok(self.store.num_nodes()?.max(1))
    }
}

/// Retrieval weight of one branch: a second of analysis counts 1, each
/// observed win counts `GAME_VALUE` toward the side it favors. Never
/// negative; a branch the tallies argue against simply gets no weight.
fn branch_weight(branch: &Branch, white_to_move: bool) -> i32 {
    let mut score = branch.time_analyzed / 100;
    if white_to_move {
        score += GAME_VALUE * branch.wins_and_losses;
    } else {
        score -= GAME_VALUE * branch.wins_and_losses;
    }
    score.max(0)
}
