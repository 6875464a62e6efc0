//! CRUD operations for [`Collection`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use arkiv_shared::{timefmt, Address, CollectionKind, Id};

use crate::database::{next_id, Storage};
use crate::error::{Result, StoreError};
use crate::models::Collection;

impl Storage {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Allocate the next collection id and insert a new collection with an
    /// empty subject.  Runs in its own transaction.
    pub fn new_collection(
        &mut self,
        kind: CollectionKind,
        owner: &Address,
        contact: &Address,
        start: DateTime<Utc>,
    ) -> Result<Collection> {
        let tx = self.conn_mut().transaction()?;

        let id = next_id(&tx, "collections")?;
        tx.execute(
            "INSERT INTO collections ( collection_id, ownerjid, contactjid, type, start, subject )
             VALUES ( ?1, ?2, ?3, ?4, ?5, '' )",
            params![
                id,
                owner.bare(),
                contact.bare(),
                kind.code(),
                timefmt::encode_utc(&start, true),
            ],
        )?;

        tx.commit()?;

        tracing::debug!(id, contact = %contact.bare(), "created collection");

        Ok(Collection {
            id,
            kind,
            owner: owner.to_bare(),
            contact: contact.to_bare(),
            subject: String::new(),
            start,
        })
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single collection by id.
    pub fn collection_by_id(&self, id: Id) -> Result<Collection> {
        self.conn()
            .query_row(
                "SELECT collection_id, ownerjid, contactjid, type, start, subject
                 FROM collections
                 WHERE collection_id = ?1",
                params![id],
                row_to_collection,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// List collections, optionally filtered by owner and/or contact.
    ///
    /// Both filters are conjunctive when present; with neither, all
    /// collections are returned.
    pub fn collections(
        &self,
        owner: Option<&Address>,
        contact: Option<&Address>,
    ) -> Result<Vec<Collection>> {
        let mut query = String::from(
            "SELECT collection_id, ownerjid, contactjid, type, start, subject FROM collections",
        );
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(owner) = owner {
            values.push(owner.bare().to_string());
            clauses.push(format!("ownerjid = ?{}", values.len()));
        }
        if let Some(contact) = contact {
            values.push(contact.bare().to_string());
            clauses.push(format!("contactjid = ?{}", values.len()));
        }
        if !clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }
        query.push_str(" ORDER BY collection_id ASC");

        let mut stmt = self.conn().prepare(&query)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(values.iter()), row_to_collection)?;

        let mut collections = Vec::new();
        for row in rows {
            collections.push(row?);
        }
        Ok(collections)
    }

    /// Look up a collection by its natural key: owner, contact, and start
    /// time.  This is what makes re-syncing the same remote archive
    /// idempotent.
    pub fn find_collection(
        &self,
        owner: &Address,
        contact: &Address,
        start: DateTime<Utc>,
    ) -> Result<Option<Collection>> {
        let found = self
            .conn()
            .query_row(
                "SELECT collection_id, ownerjid, contactjid, type, start, subject
                 FROM collections
                 WHERE ownerjid = ?1 AND contactjid = ?2 AND start = ?3
                 LIMIT 1",
                params![
                    owner.bare(),
                    contact.bare(),
                    timefmt::encode_utc(&start, true)
                ],
                row_to_collection,
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(StoreError::Sqlite(other)),
            })?;
        Ok(found)
    }

    /// All distinct owner addresses with at least one collection.
    pub fn distinct_owners(&self) -> Result<Vec<Address>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT DISTINCT ownerjid FROM collections")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut owners = Vec::new();
        for row in rows {
            owners.push(Address::parse(&row?)?);
        }
        Ok(owners)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Replace a collection's subject.
    pub fn set_collection_subject(&mut self, id: Id, subject: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE collections SET subject = ?1 WHERE collection_id = ?2",
            params![subject, id],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Remove a collection **with all its entries**.
    ///
    /// Entries go first so a crash between the two deletes can never leave
    /// orphaned entries behind; both run in one transaction regardless.
    pub fn remove_collection(&mut self, id: Id) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        tx.execute("DELETE FROM entries WHERE collection_id = ?1", params![id])?;
        tx.execute(
            "DELETE FROM collections WHERE collection_id = ?1",
            params![id],
        )?;

        tx.commit()?;

        tracing::debug!(id, "removed collection and its entries");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Collection`].
pub(crate) fn row_to_collection(row: &rusqlite::Row<'_>) -> rusqlite::Result<Collection> {
    let id: Id = row.get(0)?;
    let owner_str: String = row.get(1)?;
    let contact_str: String = row.get(2)?;
    let kind_code: i64 = row.get(3)?;
    let start_str: String = row.get(4)?;
    let subject: String = row.get(5)?;

    let owner = Address::parse(&owner_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let contact = Address::parse(&contact_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let kind = CollectionKind::from_code(kind_code).ok_or_else(|| {
        rusqlite::Error::IntegralValueOutOfRange(3, kind_code)
    })?;
    let (start, _) = timefmt::decode(&start_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Collection {
        id,
        kind,
        owner,
        contact,
        subject,
        start,
    })
}
