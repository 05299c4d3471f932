//! Durable side of the local store: entry id -> payload and raw vector.
//!
//! Every record remembers the index position it was inserted at. Positions
//! are dense (`0..len`) and follow insertion order, which is what lets the
//! index be replayed from raw vectors after a restart.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::{Entry, Metadata};

/// One persisted entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub vector: Vec<f32>,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted: bool,
    /// Monotonic insertion sequence.
    pub seq: u64,
    pub position: usize,
}

impl EntryRecord {
    pub fn to_entry(&self, id: Uuid) -> Entry {
        Entry {
            id,
            vector: self.vector.clone(),
            metadata: self.metadata.clone(),
            created_at: self.created_at,
            deleted: self.deleted,
        }
    }
}

/// In-memory view of all records plus the live id -> position map.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    records: HashMap<Uuid, EntryRecord>,
    id_map: HashMap<Uuid, usize>,
    /// `positions[p]` is the id stored at index position `p`.
    positions: Vec<Uuid>,
    next_seq: u64,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the in-memory view from persisted records.
    ///
    /// # Errors
    /// A description of the first inconsistency: duplicate or missing
    /// positions, or a vector of the wrong dimension.
    pub fn from_records(
        records: HashMap<Uuid, EntryRecord>,
        dimension: usize,
    ) -> Result<Self, String> {
        let mut slots: Vec<Option<Uuid>> = vec![None; records.len()];
        for (id, record) in &records {
            if record.vector.len() != dimension {
                return Err(format!(
                    "entry {id} has {} dimensions, expected {dimension}",
                    record.vector.len()
                ));
            }
            let slot = slots.get_mut(record.position).ok_or_else(|| {
                format!(
                    "entry {id} has position {} outside 0..{}",
                    record.position,
                    records.len()
                )
            })?;
            if let Some(other) = slot.replace(*id) {
                return Err(format!(
                    "entries {other} and {id} share position {}",
                    record.position
                ));
            }
        }

        // Every slot is filled: positions are unique and bounded by len.
        let positions: Vec<Uuid> = slots.into_iter().flatten().collect();
        let id_map = records
            .iter()
            .filter(|(_, r)| !r.deleted)
            .map(|(id, r)| (*id, r.position))
            .collect();
        let next_seq = records.values().map(|r| r.seq + 1).max().unwrap_or(0);

        Ok(Self {
            records,
            id_map,
            positions,
            next_seq,
        })
    }

    /// Append a new entry at the next position.
    ///
    /// # Returns
    /// * The position assigned to `id`
    pub fn put(
        &mut self,
        id: Uuid,
        vector: Vec<f32>,
        metadata: Metadata,
        created_at: DateTime<Utc>,
    ) -> usize {
        let position = self.positions.len();
        self.records.insert(
            id,
            EntryRecord {
                vector,
                metadata,
                created_at,
                deleted: false,
                seq: self.next_seq,
                position,
            },
        );
        self.id_map.insert(id, position);
        self.positions.push(id);
        self.next_seq += 1;
        position
    }

    /// Live record for `id`.
    pub fn get(&self, id: Uuid) -> Option<&EntryRecord> {
        self.records.get(&id).filter(|r| !r.deleted)
    }

    /// Tombstone `id`. `false` when unknown or already deleted.
    pub fn delete(&mut self, id: Uuid) -> bool {
        match self.records.get_mut(&id) {
            Some(record) if !record.deleted => {
                record.deleted = true;
                self.id_map.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// Undo a `delete`.
    pub fn restore(&mut self, id: Uuid) -> bool {
        match self.records.get_mut(&id) {
            Some(record) if record.deleted => {
                record.deleted = false;
                self.id_map.insert(id, record.position);
                true
            }
            _ => false,
        }
    }

    /// Drop every record at position `>= len`. Undoes `put`.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.positions.len() {
            return;
        }
        for id in self.positions.drain(len..) {
            self.records.remove(&id);
            self.id_map.remove(&id);
        }
        self.next_seq = self
            .positions
            .last()
            .and_then(|id| self.records.get(id))
            .map_or(0, |r| r.seq + 1);
    }

    pub fn all_live_ids(&self) -> HashSet<Uuid> {
        self.id_map.keys().copied().collect()
    }

    /// Live entry stored at `position`.
    pub fn live_at(&self, position: usize) -> Option<(Uuid, &EntryRecord)> {
        let id = *self.positions.get(position)?;
        self.get(id).map(|record| (id, record))
    }

    pub fn records(&self) -> &HashMap<Uuid, EntryRecord> {
        &self.records
    }

    pub const fn id_map(&self) -> &HashMap<Uuid, usize> {
        &self.id_map
    }

    /// Raw vectors for positions `start..`, in position order.
    pub fn vectors_from(&self, start: usize) -> Vec<Vec<f32>> {
        self.positions
            .iter()
            .skip(start)
            .filter_map(|id| self.records.get(id))
            .map(|r| r.vector.clone())
            .collect()
    }

    /// Copy of the live records only, re-positioned densely in the
    /// original insertion order.
    pub fn compacted(&self) -> Self {
        let mut compacted = Self {
            next_seq: self.next_seq,
            ..Self::default()
        };
        for id in &self.positions {
            let Some(record) = self.get(*id) else {
                continue;
            };
            let position = compacted.positions.len();
            compacted.records.insert(
                *id,
                EntryRecord {
                    position,
                    ..record.clone()
                },
            );
            compacted.id_map.insert(*id, position);
            compacted.positions.push(*id);
        }
        compacted
    }

    /// Entries held, tombstoned ones included.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn live_len(&self) -> usize {
        self.id_map.len()
    }

    pub fn tombstoned(&self) -> usize {
        self.len() - self.live_len()
    }

    pub fn tombstone_ratio(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.tombstoned() as f64 / self.len() as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(n: usize) -> (MetadataStore, Vec<Uuid>) {
        let mut store = MetadataStore::new();
        let ids: Vec<Uuid> = (0..n)
            .map(|i| {
                let id = Uuid::new_v4();
                store.put(id, vec![i as f32, 0.0], Metadata::new(), Utc::now());
                id
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn test_put_assigns_dense_positions() {
        let (store, ids) = store_with(3);
        assert_eq!(store.live_at(2).map(|(id, _)| id), Some(ids[2]));
        assert_eq!(store.records()[&ids[1]].seq, 1);
        assert_eq!(store.all_live_ids().len(), 3);
    }

    #[test]
    fn test_delete_is_tombstone_only() {
        let (mut store, ids) = store_with(2);
        assert!(store.delete(ids[0]));
        assert!(!store.delete(ids[0]));
        assert!(!store.delete(Uuid::new_v4()));
        assert!(store.get(ids[0]).is_none());
        assert!(store.live_at(0).is_none());
        assert_eq!(store.len(), 2);
        assert_eq!(store.live_len(), 1);
        assert!((store.tombstone_ratio() - 0.5).abs() < f64::EPSILON);
        assert!(!store.all_live_ids().contains(&ids[0]));

        assert!(store.restore(ids[0]));
        assert!(store.get(ids[0]).is_some());
    }

    #[test]
    fn test_truncate_undoes_puts() {
        let (mut store, ids) = store_with(4);
        store.truncate(2);
        assert_eq!(store.len(), 2);
        assert!(store.get(ids[3]).is_none());
        let id = Uuid::new_v4();
        assert_eq!(store.put(id, vec![0.0, 0.0], Metadata::new(), Utc::now()), 2);
        assert_eq!(store.records()[&id].seq, 2);
    }

    #[test]
    fn test_compacted_keeps_order_and_reassigns_positions() {
        let (mut store, ids) = store_with(4);
        store.delete(ids[1]);
        let compacted = store.compacted();
        assert_eq!(compacted.len(), 3);
        assert_eq!(compacted.tombstoned(), 0);
        assert_eq!(compacted.id_map()[&ids[2]], 1);
        assert_eq!(compacted.vectors_from(0), vec![vec![0.0, 0.0], vec![2.0, 0.0], vec![3.0, 0.0]]);
    }

    #[test]
    fn test_from_records_rejects_inconsistent_positions() {
        let (store, ids) = store_with(2);
        let mut records = store.records().clone();
        assert!(MetadataStore::from_records(records.clone(), 2).is_ok());
        assert!(MetadataStore::from_records(records.clone(), 3).is_err());

        records.get_mut(&ids[1]).unwrap().position = 0;
        let err = MetadataStore::from_records(records.clone(), 2).unwrap_err();
        assert!(err.contains("share position"));

        records.get_mut(&ids[1]).unwrap().position = 5;
        assert!(MetadataStore::from_records(records, 2).is_err());
    }
}
