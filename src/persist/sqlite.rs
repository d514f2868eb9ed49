//! SQLite-backed mutation logs, participant tables and bookings.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{
    params, types::Type, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use serde_json::Value;

use crate::{
    booking::{Booking, BookingStatus},
    engine::ranked_class::RankedClass,
    mutation::{MutationRecord, NewMutation, PayloadEnvelope, PAYLOAD_FORMAT_VERSION},
    participant::{Participant, ParticipantDraft},
    types::{
        Average, BookingNr, MutationId, Participation, ParticipantId, QueueKind, RoundId, Scope,
    },
};

use super::{
    check_queue, now_ms, MutationStore, PaymentRepository, PersistError, PersistResult,
    RankingRepository,
};

const BOOKING_COUNTER: &str = "booking_nr";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const MUTATION_COLUMNS: &str =
    "id, code, target_ref, payload, requested_by, created_ms, is_processed";
const PARTICIPANT_COLUMNS: &str =
    "id, round_id, class_id, member_ref, rank, ord, average, participation, champion_label";
const BOOKING_COLUMNS: &str =
    "nr, amount_cents, status, payment_id, checkout_url, payment_status, created_ms";

/// SQLite database shared by all repositories. Clones share the connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens or creates a database at `path`.
    ///
    /// Enables WAL mode, sets `synchronous=NORMAL` and a busy timeout so that
    /// producers in other processes can write concurrently.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Mutation log of one queue, sharing this connection.
    pub fn mutation_log(&self, queue: QueueKind) -> SqliteMutationLog {
        SqliteMutationLog {
            queue,
            conn: Arc::clone(&self.conn),
        }
    }
}

/// [`MutationStore`] view on one queue of a [`SqliteStore`].
#[derive(Clone)]
pub struct SqliteMutationLog {
    queue: QueueKind,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMutationLog {
    fn insert(&self, tx: &Transaction<'_>, new: NewMutation) -> PersistResult<MutationId> {
        let payload = serde_json::to_vec(&PayloadEnvelope::new(new.payload))?;
        tx.execute(
            "INSERT INTO mutations(queue, code, target_ref, payload, requested_by, created_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.queue.as_str(),
                new.code,
                new.target_ref,
                payload,
                new.requested_by,
                now_ms() as i64,
            ],
        )?;
        Ok(tx.last_insert_rowid() as MutationId)
    }

    fn pending_match(&self, conn: &Connection, new: &NewMutation) -> PersistResult<Option<MutationId>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {MUTATION_COLUMNS} FROM mutations \
             WHERE queue = ?1 AND code = ?2 AND target_ref = ?3 AND is_processed = 0 \
             ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(
            params![self.queue.as_str(), new.code, new.target_ref],
            |row| row_to_mutation(self.queue, row),
        )?;
        for row in rows {
            let record = row?;
            if new.same_request(&record) {
                return Ok(Some(record.id));
            }
        }
        Ok(None)
    }
}

impl MutationStore for SqliteMutationLog {
    fn queue(&self) -> QueueKind {
        self.queue
    }

    fn enqueue(&self, new: NewMutation) -> PersistResult<MutationId> {
        check_queue(self.queue, &new)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let id = self.insert(&tx, new)?;
        tx.commit()?;
        Ok(id)
    }

    fn find_pending(&self, new: &NewMutation) -> PersistResult<Option<MutationId>> {
        let conn = self.conn.lock();
        self.pending_match(&conn, new)
    }

    fn enqueue_unique(&self, new: NewMutation) -> PersistResult<(MutationId, bool)> {
        check_queue(self.queue, &new)?;
        let mut conn = self.conn.lock();
        // IMMEDIATE keeps producers in other processes out between lookup and insert
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Some(id) = self.pending_match(&tx, &new)? {
            return Ok((id, false));
        }
        let id = self.insert(&tx, new)?;
        tx.commit()?;
        Ok((id, true))
    }

    fn get(&self, id: MutationId) -> PersistResult<Option<MutationRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                &format!("SELECT {MUTATION_COLUMNS} FROM mutations WHERE id = ?1 AND queue = ?2"),
                params![id as i64, self.queue.as_str()],
                |row| row_to_mutation(self.queue, row),
            )
            .optional()?;
        Ok(record)
    }

    fn fetch_unprocessed_since(&self, last_id: MutationId) -> PersistResult<Vec<MutationRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MUTATION_COLUMNS} FROM mutations \
             WHERE queue = ?1 AND id > ?2 AND is_processed = 0 ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(params![self.queue.as_str(), last_id as i64], |row| {
            row_to_mutation(self.queue, row)
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn mark_processed(&self, id: MutationId) -> PersistResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE mutations SET is_processed = 1 WHERE id = ?1 AND queue = ?2",
            params![id as i64, self.queue.as_str()],
        )?;
        if changed == 0 {
            return Err(PersistError::MissingMutation(id));
        }
        Ok(())
    }

    fn count(&self) -> PersistResult<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM mutations WHERE queue = ?1",
            params![self.queue.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

impl RankingRepository for SqliteStore {
    fn register(&self, draft: ParticipantDraft) -> PersistResult<ParticipantId> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let order: i64 = tx.query_row(
            "SELECT COALESCE(MAX(ord), 0) + 1 FROM participants WHERE round_id = ?1 AND class_id = ?2",
            params![draft.scope.round as i64, draft.scope.class as i64],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO participants(round_id, class_id, member_ref, rank, ord, average, participation, champion_label) \
             VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?7)",
            params![
                draft.scope.round as i64,
                draft.scope.class as i64,
                draft.member_ref,
                order,
                draft.average.thousandths(),
                draft.participation.as_str(),
                draft.champion_label,
            ],
        )?;
        let id = tx.last_insert_rowid() as ParticipantId;
        tx.commit()?;
        Ok(id)
    }

    fn participant(&self, id: ParticipantId) -> PersistResult<Option<Participant>> {
        let conn = self.conn.lock();
        let participant = conn
            .query_row(
                &format!("SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE id = ?1"),
                params![id as i64],
                row_to_participant,
            )
            .optional()?;
        Ok(participant)
    }

    fn load_class(&self, scope: Scope) -> PersistResult<RankedClass> {
        let conn = self.conn.lock();
        let limit: Option<i64> = conn
            .query_row(
                "SELECT limit_value FROM cut_limits WHERE round_id = ?1 AND class_id = ?2",
                params![scope.round as i64, scope.class as i64],
                |row| row.get(0),
            )
            .optional()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {PARTICIPANT_COLUMNS} FROM participants \
             WHERE round_id = ?1 AND class_id = ?2 ORDER BY ord ASC, id ASC"
        ))?;
        let rows = stmt.query_map(
            params![scope.round as i64, scope.class as i64],
            row_to_participant,
        )?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }

        Ok(RankedClass::new(scope, limit.map(|l| l as u32), entries))
    }

    fn save_class(&self, class: &RankedClass) -> PersistResult<()> {
        let scope = class.scope();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE participants SET rank = ?1, ord = ?2, participation = ?3 WHERE id = ?4",
            )?;
            for p in class.participants() {
                stmt.execute(params![p.rank, p.order, p.participation.as_str(), p.id as i64])?;
            }
        }
        match class.limit() {
            Some(limit) => {
                tx.execute(
                    "INSERT INTO cut_limits(round_id, class_id, limit_value) VALUES (?1, ?2, ?3) \
                     ON CONFLICT(round_id, class_id) DO UPDATE SET limit_value = excluded.limit_value",
                    params![scope.round as i64, scope.class as i64, limit],
                )?;
            }
            None => {
                tx.execute(
                    "DELETE FROM cut_limits WHERE round_id = ?1 AND class_id = ?2",
                    params![scope.round as i64, scope.class as i64],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn scopes_in_round(&self, round: RoundId) -> PersistResult<Vec<Scope>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT class_id FROM participants WHERE round_id = ?1 ORDER BY class_id ASC",
        )?;
        let rows = stmt.query_map(params![round as i64], |row| row.get::<_, i64>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(Scope::new(round, row? as u64));
        }
        Ok(out)
    }
}

impl PaymentRepository for SqliteStore {
    fn next_booking_nr(&self) -> PersistResult<BookingNr> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let nr = increment_counter(&tx, BOOKING_COUNTER)?;
        tx.commit()?;
        Ok(nr)
    }

    fn create_booking(&self, amount_cents: u64) -> PersistResult<Booking> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let nr = increment_counter(&tx, BOOKING_COUNTER)?;
        let booking = Booking::new(nr, amount_cents, now_ms());
        write_booking(&tx, &booking)?;
        tx.commit()?;
        Ok(booking)
    }

    fn booking(&self, nr: BookingNr) -> PersistResult<Option<Booking>> {
        let conn = self.conn.lock();
        let booking = conn
            .query_row(
                &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE nr = ?1"),
                params![nr as i64],
                row_to_booking,
            )
            .optional()?;
        Ok(booking)
    }

    fn booking_by_payment(&self, payment_id: &str) -> PersistResult<Option<Booking>> {
        let conn = self.conn.lock();
        let booking = conn
            .query_row(
                &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE payment_id = ?1"),
                params![payment_id],
                row_to_booking,
            )
            .optional()?;
        Ok(booking)
    }

    fn save_booking(&self, booking: &Booking) -> PersistResult<()> {
        let conn = self.conn.lock();
        write_booking(&conn, booking)
    }
}

fn increment_counter(tx: &Transaction<'_>, name: &str) -> PersistResult<u64> {
    tx.execute(
        "INSERT INTO counters(name, value) VALUES (?1, 0) ON CONFLICT(name) DO NOTHING",
        params![name],
    )?;
    tx.execute("UPDATE counters SET value = value + 1 WHERE name = ?1", params![name])?;
    let value: i64 = tx.query_row(
        "SELECT value FROM counters WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(value as u64)
}

fn write_booking(conn: &Connection, booking: &Booking) -> PersistResult<()> {
    conn.execute(
        "INSERT INTO bookings(nr, amount_cents, status, payment_id, checkout_url, payment_status, created_ms) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
         ON CONFLICT(nr) DO UPDATE SET amount_cents = excluded.amount_cents, status = excluded.status, \
         payment_id = excluded.payment_id, checkout_url = excluded.checkout_url, \
         payment_status = excluded.payment_status",
        params![
            booking.nr as i64,
            booking.amount_cents as i64,
            booking.status.as_str(),
            booking.payment_id,
            booking.checkout_url,
            booking.payment_status,
            booking.created_ms as i64,
        ],
    )?;
    Ok(())
}

fn conversion_error(col: usize, ty: Type, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(col, ty, Box::new(std::io::Error::other(msg)))
}

fn row_to_mutation(queue: QueueKind, row: &Row<'_>) -> rusqlite::Result<MutationRecord> {
    // a garbled payload is reported on the record, not as a failed read
    let (payload, payload_error) = match row.get_ref(3)?.as_bytes() {
        Ok(raw) => match decode_payload(raw) {
            Ok(payload) => (payload, None),
            Err(err) => (Value::Null, Some(err)),
        },
        Err(err) => (Value::Null, Some(format!("payload column: {err}"))),
    };
    Ok(MutationRecord {
        id: row.get::<_, i64>(0)? as MutationId,
        queue,
        code: row.get(1)?,
        target_ref: row.get(2)?,
        payload,
        requested_by: row.get(4)?,
        created_ms: row.get::<_, i64>(5)? as u64,
        is_processed: row.get(6)?,
        payload_error,
    })
}

fn row_to_participant(row: &Row<'_>) -> rusqlite::Result<Participant> {
    let code: String = row.get(7)?;
    let participation = Participation::from_code(&code)
        .ok_or_else(|| conversion_error(7, Type::Text, format!("unknown participation {code:?}")))?;
    Ok(Participant {
        id: row.get::<_, i64>(0)? as ParticipantId,
        scope: Scope::new(row.get::<_, i64>(1)? as u64, row.get::<_, i64>(2)? as u64),
        member_ref: row.get(3)?,
        rank: row.get(4)?,
        order: row.get(5)?,
        average: Average::from_thousandths(row.get(6)?),
        participation,
        champion_label: row.get(8)?,
    })
}

fn row_to_booking(row: &Row<'_>) -> rusqlite::Result<Booking> {
    let status: String = row.get(2)?;
    let status = BookingStatus::from_name(&status)
        .ok_or_else(|| conversion_error(2, Type::Text, format!("unknown booking status {status:?}")))?;
    Ok(Booking {
        nr: row.get::<_, i64>(0)? as BookingNr,
        amount_cents: row.get::<_, i64>(1)? as u64,
        status,
        payment_id: row.get(3)?,
        checkout_url: row.get(4)?,
        payment_status: row.get(5)?,
        created_ms: row.get::<_, i64>(6)? as u64,
    })
}

fn decode_payload(payload: &[u8]) -> Result<Value, String> {
    if let Ok(envelope) = serde_json::from_slice::<PayloadEnvelope>(payload) {
        if envelope.format_version != PAYLOAD_FORMAT_VERSION {
            return Err(format!(
                "unsupported payload format version: {}",
                envelope.format_version
            ));
        }
        return Ok(envelope.payload);
    }

    // rows written by other producers may carry the bare payload
    serde_json::from_slice::<Value>(payload).map_err(|e| format!("payload decode failed: {e}"))
}
