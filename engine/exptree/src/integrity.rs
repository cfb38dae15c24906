//! Two-pass reference-integrity audit.
//!
//! Pass one walks the tree depth-first from a starting slot, counting how
//! many times each record is reached through sibling/child links. Pass two
//! scans every record linearly: a count of zero is an orphan (unreachable
//! by normal traversal), a count above one means two parents claim the
//! same record, and a true tree has exactly one reference to every node.
//!
//! The counts live in a table allocated for the run and thrown away with
//! it; the audit never writes to the store and never changes tree shape.

use book_core::Position;
use tracing::warn;

use crate::error::TreeResult;
use crate::record::Slot;
use crate::tree::ExperienceTree;

/// Findings from one audit run. The audit only reads; repairs are the
/// caller's business (usually a pack into a fresh store).
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    /// Records in the store when the audit started.
    pub nodes: i64,
    /// Records no traversal from the start slot ever reached.
    pub orphans: Vec<Slot>,
    /// Records reached more than once, with their reference counts.
    pub multiply_referenced: Vec<(Slot, u32)>,
    /// Links pointing outside the store.
    pub bad_links: u64,
    /// Records that could not be read during the walk.
    pub unreadable: u64,
}

impl IntegrityReport {
    /// A tree with nothing to report.
    pub fn is_clean(&self) -> bool {
        self.orphans.is_empty()
            && self.multiply_referenced.is_empty()
            && self.bad_links == 0
            && self.unreadable == 0
    }
}

/// Audit the tree reachable from `start` (normally [`Slot::ROOT`]).
///
/// `pos` must be the position the start slot's sibling chain describes
/// continuations of; it is restored before returning. Child links are only
/// followed beneath branches whose move is legal where it sits, mirroring
/// every other traversal; an illegal branch's subtree is unreachable in
/// practice and shows up here as orphans.
pub fn audit<P: Position>(
    tree: &mut ExperienceTree,
    pos: &mut P,
    start: Slot,
) -> TreeResult<IntegrityReport> {
    let nodes = tree.num_nodes()?;
    let mut counts = vec![0u32; nodes as usize];
    let mut report = IntegrityReport {
        nodes,
        ..IntegrityReport::default()
    };

    if nodes > 0 {
        mark(tree, pos, start, &mut counts, &mut report)?;
    }

    for (index, &count) in counts.iter().enumerate() {
        let slot = Slot::from_index(index as i64);
        if count == 0 {
            report.orphans.push(slot);
        } else if count > 1 {
            report.multiply_referenced.push((slot, count));
        }
    }
    Ok(report)
}

fn mark<P: Position>(
    tree: &mut ExperienceTree,
    pos: &mut P,
    mut offset: Slot,
    counts: &mut Vec<u32>,
    report: &mut IntegrityReport,
) -> TreeResult<()> {
    let legal = pos.legal_moves();
    if legal.is_empty() || pos.is_draw() {
        return Ok(());
    }

    let mut steps = 0i64;
    while offset.is_some() {
        steps += 1;
        if steps > report.nodes {
            warn!(%offset, "sibling chain longer than the store; link cycle");
            report.bad_links += 1;
            return Ok(());
        }

        let Some(index) = offset.index().filter(|&i| i < counts.len() as u64) else {
            warn!(%offset, nodes = report.nodes, "link points outside the store");
            report.bad_links += 1;
            return Ok(());
        };

        let branch = match tree.read(offset) {
            Ok(branch) => branch,
            Err(err) => {
                warn!(%offset, %err, "unreadable record during audit");
                report.unreadable += 1;
                return Ok(());
            }
        };

        let first_visit = counts[index as usize] == 0;
        counts[index as usize] += 1;

        let legal_move = legal.iter().any(|m| m.same_squares(branch.mv));
        if !legal_move && !branch.is_tombstone() {
            warn!(
                %offset,
                source = branch.mv.source,
                dest = branch.mv.dest,
                "illegal move stored in tree"
            );
        }

        // Only descend on the first visit: a multiply-referenced branch is
        // already damage, and following it again could recurse forever.
        if branch.child.is_some() && legal_move && first_visit {
            let undo = pos.make_move(branch.mv);
            mark(tree, pos, branch.child, counts, report)?;
            pos.unmake_move(branch.mv, undo);
        }

        offset = branch.sibling;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Branch;
    use crate::store::TreeFile;
    use book_core::Move;
    use games_hexapawn::{parse_move, Hexapawn};
    use tempfile::tempdir;

    fn mv(text: &str) -> Move {
        parse_move(text).unwrap()
    }

    fn grown_tree(dir: &tempfile::TempDir) -> ExperienceTree {
        let mut tree = ExperienceTree::create(dir.path().join("t.tree")).unwrap();
        let mut game = Hexapawn::new();
        let mut path = Vec::new();
        // A short line plus alternatives at the root.
        for text in ["b1b2", "c3b2", "c1c2"] {
            let m = mv(text);
            tree.remember_position(&game, &path, m, 100, 10, 1, 0).unwrap();
            game.make_move(m);
            path.push(m);
        }
        let game = Hexapawn::new();
        tree.remember_position(&game, &[], mv("a1a2"), 100, 10, 1, 0)
            .unwrap();
        tree.remember_position(&game, &[], mv("c1c2"), 100, 10, 1, 0)
            .unwrap();
        tree
    }

    #[test]
    fn clean_tree_audits_clean() {
        let dir = tempdir().unwrap();
        let mut tree = grown_tree(&dir);
        let mut game = Hexapawn::new();
        let report = audit(&mut tree, &mut game, Slot::ROOT).unwrap();

        assert_eq!(report.nodes, 5);
        assert!(report.is_clean(), "report: {report:?}");
        assert_eq!(game, Hexapawn::new(), "board restored after audit");
    }

    #[test]
    fn skipped_sibling_is_an_orphan() {
        // Build a raw store where record 0 links straight to record 2,
        // leaving record 1 unreachable.
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tree");
        {
            let mut store = TreeFile::create(&path).unwrap();
            let mut first = Branch::new(mv("a1a2"));
            first.sibling = Slot::from_raw(2);
            store.append(&first).unwrap();
            store.append(&Branch::new(mv("b1b2"))).unwrap();
            store.append(&Branch::new(mv("c1c2"))).unwrap();
        }

        let mut tree = ExperienceTree::open(&path).unwrap();
        let mut game = Hexapawn::new();
        let report = audit(&mut tree, &mut game, Slot::ROOT).unwrap();

        assert_eq!(report.orphans, vec![Slot::from_raw(1)]);
        assert!(report.multiply_referenced.is_empty());
    }

    #[test]
    fn doubly_linked_branch_is_reported() {
        // Two records at the root whose sibling links both lead to record 2.
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tree");
        {
            let mut store = TreeFile::create(&path).unwrap();
            let mut first = Branch::new(mv("a1a2"));
            first.sibling = Slot::from_raw(1);
            first.child = Slot::from_raw(2);
            store.append(&first).unwrap();
            let mut second = Branch::new(mv("b1b2"));
            second.child = Slot::from_raw(2);
            store.append(&second).unwrap();
            // Reply reachable from both parents. Legal after either push.
            store.append(&Branch::new(mv("c3c2"))).unwrap();
        }

        let mut tree = ExperienceTree::open(&path).unwrap();
        let mut game = Hexapawn::new();
        let report = audit(&mut tree, &mut game, Slot::ROOT).unwrap();

        assert_eq!(report.multiply_referenced, vec![(Slot::from_raw(2), 2)]);
        assert!(report.orphans.is_empty());
    }

    #[test]
    fn out_of_range_link_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tree");
        {
            let mut store = TreeFile::create(&path).unwrap();
            let mut first = Branch::new(mv("a1a2"));
            first.sibling = Slot::from_raw(40);
            store.append(&first).unwrap();
        }

        let mut tree = ExperienceTree::open(&path).unwrap();
        let mut game = Hexapawn::new();
        let report = audit(&mut tree, &mut game, Slot::ROOT).unwrap();

        assert_eq!(report.bad_links, 1);
        assert!(report.orphans.is_empty());
    }

    #[test]
    fn audit_terminates_on_cycle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tree");
        {
            let mut store = TreeFile::create(&path).unwrap();
            let mut first = Branch::new(mv("a1a2"));
            first.sibling = Slot::from_raw(1);
            store.append(&first).unwrap();
            let mut second = Branch::new(mv("b1b2"));
            second.sibling = Slot::ROOT;
            store.append(&second).unwrap();
        }

        let mut tree = ExperienceTree::open(&path).unwrap();
        let mut game = Hexapawn::new();
        let report = audit(&mut tree, &mut game, Slot::ROOT).unwrap();

        assert!(report.bad_links > 0, "cycle reported as a bad link");
        assert!(report.orphans.is_empty(), "both records were still reached");
    }

    #[test]
    fn tombstones_do_not_trip_the_audit() {
        let dir = tempdir().unwrap();
        let mut tree = grown_tree(&dir);
        let (slot, _) = tree.locate_branch(&[], mv("a1a2")).unwrap().unwrap();
        tree.tombstone(slot).unwrap();

        let mut game = Hexapawn::new();
        let report = audit(&mut tree, &mut game, Slot::ROOT).unwrap();
        assert!(report.is_clean(), "tombstones stay linked and reachable");
    }

    #[test]
    fn empty_store_audits_clean() {
        let dir = tempdir().unwrap();
        let mut tree = ExperienceTree::create(dir.path().join("t.tree")).unwrap();
        let mut game = Hexapawn::new();
        let report = audit(&mut tree, &mut game, Slot::ROOT).unwrap();
        assert_eq!(report.nodes, 0);
        assert!(report.is_clean());
    }
}
