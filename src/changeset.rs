/// Changeset - what a store did with each staged batch
///
/// Every processed row produces one `TableChange`, and every column whose
/// type widened to absorb an update produces one more. Consumers drain the
/// buffer to learn which rows to refresh. An unbounded changeset grows until
/// drained; a bounded one collapses into a single `Truncated` record once
/// full, and drops later changes until the next drain.
///
/// # Change Types
///
/// - `RowInserted`: a new primary key was appended at `index`
/// - `RowUpdated`: an existing primary key at `index` was overwritten
/// - `ColumnWidened`: a stored column changed type
/// - `Truncated`: changes were dropped, refresh everything

use crate::column::StorageType;
use crate::store::PrimaryKey;

#[derive(Debug, Clone, PartialEq)]
pub enum TableChange {
    RowInserted {
        index: usize,
        key: PrimaryKey,
    },

    RowUpdated {
        index: usize,
        key: PrimaryKey,
    },

    ColumnWidened {
        column: String,
        from: StorageType,
        to: StorageType,
    },

    Truncated,
}

impl TableChange {
    /// Row affected by this change, if it concerns a single row.
    pub fn row_index(&self) -> Option<usize> {
        match self {
            TableChange::RowInserted { index, .. } | TableChange::RowUpdated { index, .. } => Some(*index),
            TableChange::ColumnWidened { .. } | TableChange::Truncated => None,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, TableChange::RowInserted { .. })
    }
}

/// Pending changes plus a generation counter bumped on every drain.
#[derive(Debug, Clone, Default)]
pub struct Changeset {
    changes: Vec<TableChange>,
    generation: u64,
    limit: Option<usize>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds at most `limit` pending changes between drains.
    pub fn bounded(limit: usize) -> Self {
        Changeset {
            limit: Some(limit.max(1)),
            ..Self::default()
        }
    }

    pub fn push(&mut self, change: TableChange) {
        if self.is_truncated() {
            return;
        }
        if self.limit.is_some_and(|limit| self.changes.len() >= limit) {
            log::debug!("changeset full at {} pending changes, truncating", self.changes.len());
            self.changes.clear();
            self.changes.push(TableChange::Truncated);
            return;
        }
        self.changes.push(change);
    }

    /// True when changes were dropped since the last drain.
    pub fn is_truncated(&self) -> bool {
        self.changes.first() == Some(&TableChange::Truncated)
    }

    pub fn changes(&self) -> &[TableChange] {
        &self.changes
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Takes the pending changes and starts a new generation.
    pub fn drain(&mut self) -> Vec<TableChange> {
        self.generation += 1;
        std::mem::take(&mut self.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changeset_drain() {
        let mut cs = Changeset::new();
        assert!(cs.is_empty());
        assert_eq!(cs.generation(), 0);

        cs.push(TableChange::RowInserted {
            index: 0,
            key: PrimaryKey::Int(7),
        });
        cs.push(TableChange::ColumnWidened {
            column: "px".to_string(),
            from: StorageType::Int32,
            to: StorageType::Float64,
        });
        assert_eq!(cs.len(), 2);
        assert_eq!(cs.changes()[0].row_index(), Some(0));
        assert!(cs.changes()[0].is_insert());
        assert_eq!(cs.changes()[1].row_index(), None);

        let drained = cs.drain();
        assert_eq!(drained.len(), 2);
        assert!(cs.is_empty());
        assert_eq!(cs.generation(), 1);
    }

    #[test]
    fn test_bounded_changeset_truncates() {
        let mut cs = Changeset::bounded(2);
        for index in 0..5 {
            cs.push(TableChange::RowInserted {
                index,
                key: PrimaryKey::Int(index as i64),
            });
        }

        assert!(cs.is_truncated());
        assert_eq!(cs.changes(), [TableChange::Truncated]);

        assert_eq!(cs.drain(), vec![TableChange::Truncated]);
        assert!(!cs.is_truncated());
        cs.push(TableChange::RowUpdated {
            index: 0,
            key: PrimaryKey::Int(0),
        });
        assert_eq!(cs.len(), 1);
        assert_eq!(cs.changes()[0].row_index(), Some(0));
    }
}
