//! Fixed-size branch records and the slot handles that link them.
//!
//! The tree file is nothing but a flat array of 36-byte records. Links
//! between records are stored as signed 32-bit indices with -1 meaning
//! "none"; in memory they are wrapped in the [`Slot`] newtype so traversal
//! code never does raw pointer-style arithmetic.

use book_core::Move;
use std::fmt;

/// Bytes per record in the tree file.
pub const RECORD_SIZE: u64 = 36;

/// Index of a record in the tree file. Using a newtype for type safety.
///
/// The on-disk representation is a little-endian i32; -1 is the "none"
/// sentinel. Anything else negative, or at/past the node count, is a
/// corrupt link; consumers check with [`Slot::is_sane_link`] rather than
/// trusting the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot(i32);

impl Slot {
    pub const NONE: Slot = Slot(-1);

    /// The root-level sibling chain always starts at record 0.
    pub const ROOT: Slot = Slot(0);

    /// Wrap a record index. Panics on indices that cannot be represented
    /// on disk; stores that large are far beyond any real tree.
    pub fn from_index(index: i64) -> Slot {
        assert!(
            (0..=i32::MAX as i64).contains(&index),
            "record index {index} out of range"
        );
        Slot(index as i32)
    }

    /// Wrap a raw on-disk link value without validation.
    pub fn from_raw(raw: i32) -> Slot {
        Slot(raw)
    }

    pub fn raw(self) -> i32 {
        self.0
    }

    /// The record index, or `None` for the sentinel (and for negative
    /// garbage, which ends a chain the same way).
    #[inline]
    pub fn index(self) -> Option<u64> {
        if self.0 >= 0 {
            Some(self.0 as u64)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub fn is_some(self) -> bool {
        !self.is_none()
    }

    /// Whether a stored link is structurally plausible for a store of
    /// `nodes` records: either the none sentinel or a valid index.
    pub fn is_sane_link(self, nodes: i64) -> bool {
        self.0 == -1 || (self.0 >= 0 && (self.0 as i64) < nodes)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// One branch of the experience tree: a move reachable from its parent
/// position, plus everything the store has learned about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Branch {
    /// The move this branch represents. A zeroed move is a tombstone.
    pub mv: Move,

    /// Cumulative analysis spent on this move, in centiseconds.
    pub time_analyzed: i32,

    /// +1 for every White win, -1 for every Black win observed along the
    /// path through this branch.
    pub wins_and_losses: i32,

    /// First branch of the continuation after this move.
    pub child: Slot,

    /// Next alternative move at the same ply.
    pub sibling: Slot,

    /// Nodes evaluated by the search that produced this judgment; the
    /// primary authority metric when deciding whether new analysis
    /// supersedes stored analysis.
    pub nodes_evaluated: i32,

    /// Times the retrieval sampler picked this branch.
    pub num_accesses: i32,

    /// Scratch space kept for file-format compatibility. This
    /// implementation never interprets it.
    pub reserved: [i32; 2],
}

impl Default for Branch {
    fn default() -> Self {
        Self {
            mv: Move::default(),
            time_analyzed: 0,
            wins_and_losses: 0,
            child: Slot::NONE,
            sibling: Slot::NONE,
            nodes_evaluated: 0,
            num_accesses: 0,
            reserved: [0; 2],
        }
    }
}

impl Branch {
    /// A fresh unanalyzed branch for `mv`, unlinked.
    pub fn new(mv: Move) -> Self {
        Self {
            mv,
            ..Self::default()
        }
    }

    /// Tombstoned branches have their move zeroed but keep their links so
    /// later siblings stay reachable.
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.mv.is_null()
    }

    /// Serialize to the fixed on-disk layout (all integers little endian).
    pub fn encode(&self) -> [u8; RECORD_SIZE as usize] {
        let mut buf = [0u8; RECORD_SIZE as usize];
        buf[0] = self.mv.source;
        buf[1] = self.mv.dest;
        buf[2..4].copy_from_slice(&self.mv.score.to_le_bytes());
        buf[4..8].copy_from_slice(&self.time_analyzed.to_le_bytes());
        buf[8..12].copy_from_slice(&self.wins_and_losses.to_le_bytes());
        buf[12..16].copy_from_slice(&self.child.raw().to_le_bytes());
        buf[16..20].copy_from_slice(&self.sibling.raw().to_le_bytes());
        buf[20..24].copy_from_slice(&self.nodes_evaluated.to_le_bytes());
        buf[24..28].copy_from_slice(&self.num_accesses.to_le_bytes());
        buf[28..32].copy_from_slice(&self.reserved[0].to_le_bytes());
        buf[32..36].copy_from_slice(&self.reserved[1].to_le_bytes());
        buf
    }

    /// Deserialize from the fixed on-disk layout.
    pub fn decode(buf: &[u8; RECORD_SIZE as usize]) -> Self {
        let i32_at = |at: usize| i32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
        Self {
            mv: Move {
                source: buf[0],
                dest: buf[1],
                score: i16::from_le_bytes(buf[2..4].try_into().unwrap()),
            },
            time_analyzed: i32_at(4),
            wins_and_losses: i32_at(8),
            child: Slot::from_raw(i32_at(12)),
            sibling: Slot::from_raw(i32_at(16)),
            nodes_evaluated: i32_at(20),
            num_accesses: i32_at(24),
            reserved: [i32_at(28), i32_at(32)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_sentinel() {
        assert!(Slot::NONE.is_none());
        assert!(!Slot::NONE.is_some());
        assert_eq!(Slot::NONE.index(), None);
        assert!(Slot::ROOT.is_some());
        assert_eq!(Slot::ROOT.index(), Some(0));
    }

    #[test]
    fn slot_sane_links() {
        assert!(Slot::NONE.is_sane_link(0));
        assert!(Slot::ROOT.is_sane_link(1));
        assert!(!Slot::ROOT.is_sane_link(0));
        assert!(!Slot::from_raw(5).is_sane_link(5));
        assert!(!Slot::from_raw(-7).is_sane_link(100));
    }

    #[test]
    fn negative_garbage_ends_chains() {
        assert!(Slot::from_raw(-5).is_none());
        assert_eq!(Slot::from_raw(-5).index(), None);
    }

    #[test]
    fn encode_decode_roundtrip() {
        let branch = Branch {
            mv: Move::with_score(12, 21, -345),
            time_analyzed: 123_456,
            wins_and_losses: -7,
            child: Slot::from_raw(42),
            sibling: Slot::NONE,
            nodes_evaluated: 987_654,
            num_accesses: 3,
            reserved: [11, -22],
        };
        assert_eq!(Branch::decode(&branch.encode()), branch);
    }

    #[test]
    fn encoded_layout_is_stable() {
        let branch = Branch {
            mv: Move::with_score(1, 2, 0x0403),
            time_analyzed: 0x08070605,
            wins_and_losses: -1,
            child: Slot::NONE,
            sibling: Slot::from_raw(0x100),
            nodes_evaluated: 9,
            num_accesses: 1,
            reserved: [0, 0],
        };
        let buf = branch.encode();
        assert_eq!(buf.len() as u64, RECORD_SIZE);
        assert_eq!(&buf[0..2], &[1, 2]);
        // i16 score, low byte first.
        assert_eq!(&buf[2..4], &[0x03, 0x04]);
        assert_eq!(&buf[4..8], &[0x05, 0x06, 0x07, 0x08]);
        // -1 tally and the none sentinel are all 0xff.
        assert_eq!(&buf[8..12], &[0xff; 4]);
        assert_eq!(&buf[12..16], &[0xff; 4]);
        assert_eq!(&buf[16..20], &[0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn default_branch_is_unlinked_tombstone() {
        let branch = Branch::default();
        assert!(branch.is_tombstone());
        assert!(branch.child.is_none());
        assert!(branch.sibling.is_none());
    }
}
