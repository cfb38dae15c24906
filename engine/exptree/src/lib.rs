//! On-disk experience tree for the Expbook store
//!
//! This crate is a miniature storage engine: a persistent n-ary tree of
//! move judgments held in a single file of fixed 36-byte records, addressed
//! by integer slots instead of pointers. A *sibling* link strings together
//! the alternative moves at one ply; a *child* link descends into the
//! continuation after a move. The tree is the file; there is no separate
//! index, and no operation ever loads the whole structure into memory.
//!
//! # Layers
//!
//! - [`TreeFile`]: positional record I/O: create/open, read/write/append,
//!   and link-splicing insert. The only code that touches bytes.
//! - [`ExperienceTree`]: path-addressed operations such as recording judgments
//!   ([`ExperienceTree::remember_position`]), weighted retrieval
//!   ([`ExperienceTree::familiar_position`]), and outcome backpropagation
//!   ([`ExperienceTree::learn_from_game`]).
//! - [`train`]: depth-scheduled exhaustive filling driven by an injected
//!   search callback, with cooperative cancellation.
//! - [`pack`]: corruption-tolerant compaction into a fresh store.
//! - [`audit`]: two-pass reference-integrity check.
//!
//! # Durability and damage
//!
//! Every logical mutation is flushed as soon as it completes, so a crash
//! loses at most the record in flight. Reads, on the other hand, assume
//! nothing: links can point past the end of the file or form cycles if an
//! old bug or torn write damaged the store, and every traversal is written
//! to detect that and keep going rather than trust it. Maintenance
//! operations (pack, audit) exist precisely to run over damaged stores.
//!
//! Access is single-threaded and blocking throughout; one process owns a
//! store file at a time.

pub mod error;
pub mod integrity;
pub mod packer;
pub mod record;
pub mod store;
pub mod trainer;
pub mod tree;


pub use error::{StoreError, TreeResult};
pub use integrity::{audit, IntegrityReport};
pub use packer::{pack, PackStats};
pub use record::{Branch, Slot, RECORD_SIZE};
pub use store::TreeFile;
pub use trainer::{
    num_nodes_at_depth, train, CancelToken, SearchOutcome, TrainReport, TrainStatus,
};
pub use tree::{ExperienceTree, Remember, DEFAULT_MAX_LEARN_DEPTH};
