//! CRUD operations for [`Entry`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use arkiv_shared::{timefmt, Address, EntryKind, Id};

use crate::database::{next_id, Storage};
use crate::error::{Result, StoreError};
use crate::models::Entry;

impl Storage {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Allocate the next entry id and insert a new entry under
    /// `collection_id`.
    ///
    /// The collection must already exist; a non-positive or unknown
    /// `collection_id` is rejected with [`StoreError::MissingCollection`].
    pub fn new_entry(
        &mut self,
        collection_id: Id,
        kind: EntryKind,
        peer: &Address,
        nickname: &str,
        body: &str,
        utc: DateTime<Utc>,
    ) -> Result<Entry> {
        if collection_id <= 0 {
            return Err(StoreError::MissingCollection(collection_id));
        }

        let tx = self.conn_mut().transaction()?;

        let parent_exists: bool = tx.query_row(
            "SELECT EXISTS ( SELECT 1 FROM collections WHERE collection_id = ?1 )",
            params![collection_id],
            |row| row.get(0),
        )?;
        if !parent_exists {
            return Err(StoreError::MissingCollection(collection_id));
        }

        let id = next_id(&tx, "entries")?;
        tx.execute(
            "INSERT INTO entries ( entry_id, collection_id, type, jid, nick, utc, body )
             VALUES ( ?1, ?2, ?3, ?4, ?5, ?6, ?7 )",
            params![
                id,
                collection_id,
                kind.code(),
                peer.bare(),
                nickname,
                timefmt::encode_utc(&utc, true),
                body,
            ],
        )?;

        tx.commit()?;

        Ok(Entry {
            id,
            collection_id,
            kind,
            peer: peer.to_bare(),
            nickname: nickname.to_string(),
            body: body.to_string(),
            utc,
        })
    }

    /// Persist an entry value built elsewhere (e.g. decoded from the wire)
    /// whose `id` and `collection_id` are still unset; storage fills both
    /// in.
    pub fn adopt_entry(&mut self, collection_id: Id, entry: &Entry) -> Result<Entry> {
        debug_assert_eq!(entry.id, 0, "adopted entries must not carry an id yet");
        debug_assert_eq!(entry.collection_id, 0);

        self.new_entry(
            collection_id,
            entry.kind,
            &entry.peer,
            &entry.nickname,
            &entry.body,
            entry.utc,
        )
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single entry by id.
    pub fn entry_by_id(&self, id: Id) -> Result<Entry> {
        self.conn()
            .query_row(
                "SELECT entry_id, collection_id, type, jid, nick, utc, body
                 FROM entries
                 WHERE entry_id = ?1",
                params![id],
                row_to_entry,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// All entries of a collection, in insertion order.
    ///
    /// Insertion order tracks chronological order when entries were
    /// inserted in time order; storage does not re-sort by `utc`.
    pub fn entries_by_collection(&self, collection_id: Id) -> Result<Vec<Entry>> {
        let mut stmt = self.conn().prepare(
            "SELECT entry_id, collection_id, type, jid, nick, utc, body
             FROM entries
             WHERE collection_id = ?1
             ORDER BY entry_id ASC",
        )?;

        let rows = stmt.query_map(params![collection_id], row_to_entry)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Replace an entry's body text.
    pub fn set_entry_body(&mut self, id: Id, body: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE entries SET body = ?1 WHERE entry_id = ?2",
            params![body, id],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a single entry.
    pub fn remove_entry(&mut self, id: Id) -> Result<()> {
        self.conn()
            .execute("DELETE FROM entries WHERE entry_id = ?1", params![id])?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to an [`Entry`].
pub(crate) fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entry> {
    let id: Id = row.get(0)?;
    let collection_id: Id = row.get(1)?;
    let kind_code: i64 = row.get(2)?;
    let peer_str: String = row.get(3)?;
    let nickname: String = row.get(4)?;
    let utc_str: String = row.get(5)?;
    let body: String = row.get(6)?;

    let kind = EntryKind::from_code(kind_code)
        .ok_or_else(|| rusqlite::Error::IntegralValueOutOfRange(2, kind_code))?;
    let peer = Address::parse(&peer_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let (utc, _) = timefmt::decode(&utc_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Entry {
        id,
        collection_id,
        kind,
        peer,
        nickname,
        utc,
        body,
    })
}
