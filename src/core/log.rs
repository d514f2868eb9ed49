use hashbrown::HashMap;

use crate::{
    mutation::{MutationRecord, NewMutation},
    types::{MutationId, QueueKind},
};

/// Errors from [`MutationLog`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    /// No record with this id.
    #[error("mutation {0} not found")]
    MissingMutation(MutationId),
}

/// Append-only in-memory mutation log for one queue.
#[derive(Debug)]
pub struct MutationLog {
    queue: QueueKind,
    records: Vec<MutationRecord>,
    pos: HashMap<MutationId, usize>,
    next_id: MutationId,
}

impl MutationLog {
    /// Creates an empty log; ids start at 1.
    pub fn new(queue: QueueKind) -> Self {
        Self {
            queue,
            records: Vec::new(),
            pos: HashMap::new(),
            next_id: 1,
        }
    }

    /// Queue this log belongs to.
    pub fn queue(&self) -> QueueKind {
        self.queue
    }

    /// Appends a record and returns its id.
    pub fn append(&mut self, new: NewMutation, created_ms: u64) -> MutationId {
        let id = self.next_id;
        self.next_id += 1;

        self.pos.insert(id, self.records.len());
        self.records.push(MutationRecord {
            id,
            queue: self.queue,
            code: new.code,
            target_ref: new.target_ref,
            payload: new.payload,
            requested_by: new.requested_by,
            created_ms,
            is_processed: false,
            payload_error: None,
        });
        id
    }

    /// Looks up a record.
    pub fn get(&self, id: MutationId) -> Option<&MutationRecord> {
        self.pos.get(&id).and_then(|idx| self.records.get(*idx))
    }

    /// First unprocessed record carrying the same request.
    pub fn find_pending(&self, new: &NewMutation) -> Option<MutationId> {
        self.records
            .iter()
            .find(|r| !r.is_processed && new.same_request(r))
            .map(|r| r.id)
    }

    /// Unprocessed records with `id > last_id`, ascending.
    pub fn unprocessed_since(&self, last_id: MutationId) -> Vec<MutationRecord> {
        // ids are assigned in push order, so the tail after `last_id` is sorted
        let start = self.records.partition_point(|r| r.id <= last_id);
        self.records[start..]
            .iter()
            .filter(|r| !r.is_processed)
            .cloned()
            .collect()
    }

    /// Flags a record processed.
    pub fn mark_processed(&mut self, id: MutationId) -> Result<(), LogError> {
        let idx = *self.pos.get(&id).ok_or(LogError::MissingMutation(id))?;
        self.records[idx].is_processed = true;
        Ok(())
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing was appended.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
