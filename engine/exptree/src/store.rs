//! Positional record I/O over one tree file.
//!
//! Every access seeks to `index * RECORD_SIZE` and transfers exactly one
//! record; nothing is cached in memory. Writes are pushed to the operating
//! system immediately, so a crash loses at most the record being written.
//! The file is assumed to be owned by exactly one process; there is no
//! locking.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{StoreError, TreeResult};
use crate::record::{Branch, Slot, RECORD_SIZE};

/// Fixed-record file storage for branch records.
#[derive(Debug)]
pub struct TreeFile {
    file: File,
    path: PathBuf,
}

impl TreeFile {
    /// Create a new, empty tree file, truncating anything already there.
    pub fn create(path: impl AsRef<Path>) -> TreeResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self { file, path })
    }

    /// Open an existing tree file for read/write access.
    pub fn open(path: impl AsRef<Path>) -> TreeResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Ok(Self { file, path })
    }

    /// Open the file if it exists, otherwise create it.
    pub fn open_or_create(path: impl AsRef<Path>) -> TreeResult<Self> {
        match Self::open(path.as_ref()) {
            Ok(store) => Ok(store),
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::create(path)
            }
            Err(e) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Push any buffered bytes to the operating system.
    pub fn flush(&mut self) -> TreeResult<()> {
        self.file.flush()?;
        Ok(())
    }

    /// Number of records in the file right now.
    pub fn num_nodes(&mut self) -> TreeResult<i64> {
        let len = self.file.seek(SeekFrom::End(0))?;
        Ok((len / RECORD_SIZE) as i64)
    }

    /// Read the record at `slot`.
    pub fn read(&mut self, slot: Slot) -> TreeResult<Branch> {
        let index = slot.index().ok_or(StoreError::BadSlot { slot })?;
        self.file.seek(SeekFrom::Start(index * RECORD_SIZE))?;
        let mut buf = [0u8; RECORD_SIZE as usize];
        self.file.read_exact(&mut buf)?;
        Ok(Branch::decode(&buf))
    }

    /// Write the record at `slot` in place.
    pub fn write(&mut self, slot: Slot, branch: &Branch) -> TreeResult<()> {
        let index = slot.index().ok_or(StoreError::BadSlot { slot })?;
        self.file.seek(SeekFrom::Start(index * RECORD_SIZE))?;
        self.file.write_all(&branch.encode())?;
        Ok(())
    }

    /// Append a record at the end of the file and return its slot.
    ///
    /// Refuses to append onto a file whose length is not a record multiple:
    /// that means an earlier write was torn and appending would misalign
    /// every record after it.
    pub fn append(&mut self, branch: &Branch) -> TreeResult<Slot> {
        self.file.flush()?;
        let len = self.file.seek(SeekFrom::End(0))?;
        if len % RECORD_SIZE != 0 {
            return Err(StoreError::TornFile {
                len,
                record: RECORD_SIZE,
            });
        }
        let slot = Slot::from_index((len / RECORD_SIZE) as i64);
        self.write(slot, branch)?;
        Ok(slot)
    }

    /// Append `branch` and link it into the tree.
    ///
    /// With a parent, the new record becomes the head of the parent's child
    /// chain (the old head becomes its sibling). Without a parent it joins
    /// the root-level sibling chain at offset 0, unless it *is* record 0,
    /// in which case there is nothing to link. The branch's links are
    /// rewritten accordingly.
    pub fn insert(&mut self, branch: &mut Branch, parent: Slot) -> TreeResult<Slot> {
        branch.sibling = Slot::NONE;
        branch.child = Slot::NONE;
        let slot = self.append(branch)?;

        if parent.is_none() {
            if slot != Slot::ROOT {
                let mut head = self.read(Slot::ROOT)?;
                branch.sibling = head.sibling;
                head.sibling = slot;
                self.write(Slot::ROOT, &head)?;
            }
        } else {
            let mut parent_branch = self.read(parent)?;
            branch.sibling = parent_branch.child;
            parent_branch.child = slot;
            self.write(parent, &parent_branch)?;
        }

        self.write(slot, branch)?;
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use book_core::Move;
    use tempfile::tempdir;

    fn scratch_store(name: &str) -> (tempfile::TempDir, TreeFile) {
        let dir = tempdir().unwrap();
        let store = TreeFile::create(dir.path().join(name)).unwrap();
        (dir, store)
    }

    #[test]
    fn create_then_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.tree");
        {
            let mut store = TreeFile::create(&path).unwrap();
            store.append(&Branch::new(Move::new(1, 2))).unwrap();
        }
        let mut store = TreeFile::open(&path).unwrap();
        assert_eq!(store.num_nodes().unwrap(), 1);
        assert_eq!(store.read(Slot::ROOT).unwrap().mv, Move::new(1, 2));
    }

    #[test]
    fn open_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(TreeFile::open(dir.path().join("absent.tree")).is_err());
    }

    #[test]
    fn write_read_roundtrip() {
        let (_dir, mut store) = scratch_store("t.tree");
        let branch = Branch {
            mv: Move::with_score(3, 6, 250),
            time_analyzed: 4200,
            wins_and_losses: 2,
            nodes_evaluated: 90_000,
            num_accesses: 5,
            ..Branch::default()
        };
        let slot = store.append(&branch).unwrap();
        assert_eq!(store.read(slot).unwrap(), branch);
    }

    #[test]
    fn append_offsets_are_sequential() {
        let (_dir, mut store) = scratch_store("t.tree");
        for i in 0..10i64 {
            let slot = store.append(&Branch::new(Move::new(1, 2))).unwrap();
            assert_eq!(slot, Slot::from_index(i));
        }
        assert_eq!(store.num_nodes().unwrap(), 10);
    }

    #[test]
    fn read_past_end_fails() {
        let (_dir, mut store) = scratch_store("t.tree");
        store.append(&Branch::new(Move::new(1, 2))).unwrap();
        assert!(store.read(Slot::from_raw(7)).is_err());
        assert!(store.read(Slot::NONE).is_err());
    }

    #[test]
    fn append_refuses_torn_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("torn.tree");
        std::fs::write(&path, [0u8; RECORD_SIZE as usize + 5]).unwrap();
        let mut store = TreeFile::open(&path).unwrap();
        assert!(matches!(
            store.append(&Branch::default()),
            Err(StoreError::TornFile { .. })
        ));
    }

    #[test]
    fn insert_first_record_is_root() {
        let (_dir, mut store) = scratch_store("t.tree");
        let mut branch = Branch::new(Move::new(0, 3));
        let slot = store.insert(&mut branch, Slot::NONE).unwrap();
        assert_eq!(slot, Slot::ROOT);
        let stored = store.read(slot).unwrap();
        assert!(stored.sibling.is_none());
        assert!(stored.child.is_none());
    }

    #[test]
    fn insert_without_parent_joins_root_chain() {
        let (_dir, mut store) = scratch_store("t.tree");
        let mut first = Branch::new(Move::new(0, 3));
        store.insert(&mut first, Slot::NONE).unwrap();
        let mut second = Branch::new(Move::new(1, 4));
        let second_slot = store.insert(&mut second, Slot::NONE).unwrap();
        let mut third = Branch::new(Move::new(2, 5));
        let third_slot = store.insert(&mut third, Slot::NONE).unwrap();

        // New root-level branches are spliced in right after record 0.
        let root = store.read(Slot::ROOT).unwrap();
        assert_eq!(root.sibling, third_slot);
        assert_eq!(store.read(third_slot).unwrap().sibling, second_slot);
        assert!(store.read(second_slot).unwrap().sibling.is_none());
    }

    #[test]
    fn insert_with_parent_heads_child_chain() {
        let (_dir, mut store) = scratch_store("t.tree");
        let mut root = Branch::new(Move::new(0, 3));
        let root_slot = store.insert(&mut root, Slot::NONE).unwrap();

        let mut reply_a = Branch::new(Move::new(6, 3));
        let a_slot = store.insert(&mut reply_a, root_slot).unwrap();
        let mut reply_b = Branch::new(Move::new(7, 4));
        let b_slot = store.insert(&mut reply_b, root_slot).unwrap();

        let root = store.read(root_slot).unwrap();
        assert_eq!(root.child, b_slot);
        assert_eq!(store.read(b_slot).unwrap().sibling, a_slot);
        assert!(store.read(a_slot).unwrap().sibling.is_none());
    }
}
