//! v001 -- Initial schema creation.
//!
//! Creates the `collections` and `entries` tables plus their indexes, and
//! seeds the sequence counters so id allocation works on empty tables.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
///
/// Cascading deletes are handled in code, not by a database-level foreign
/// key: `remove_collection` deletes owned entries before the collection
/// row, and that ordering is part of the storage contract.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Collections
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS collections (
    collection_id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
    ownerjid      TEXT NOT NULL,                -- bare address of the local account
    contactjid    TEXT NOT NULL,                -- bare address of the peer or room
    type          INTEGER NOT NULL,
    start         TEXT NOT NULL,                -- wire-format UTC timestamp
    subject       TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS owner_i      ON collections ( ownerjid );
CREATE INDEX IF NOT EXISTS contactjid_i ON collections ( contactjid );
CREATE INDEX IF NOT EXISTS start_i      ON collections ( start );

-- ----------------------------------------------------------------
-- Entries
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS entries (
    entry_id      INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
    collection_id INTEGER NOT NULL,             -- references collections(collection_id)
    type          INTEGER NOT NULL,
    jid           TEXT NOT NULL,                -- bare address of the peer
    nick          TEXT NOT NULL DEFAULT '',
    utc           TEXT NOT NULL,                -- wire-format UTC timestamp
    body          TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS collection_id_i ON entries ( collection_id );
CREATE INDEX IF NOT EXISTS utc_i           ON entries ( utc );

-- SQLite only creates sequence rows on first insert.  Seed them so the
-- next-id queries work against empty tables.
INSERT INTO sqlite_sequence ( name, seq )
    SELECT 'collections', 0
    WHERE NOT EXISTS ( SELECT 1 FROM sqlite_sequence WHERE name = 'collections' );
INSERT INTO sqlite_sequence ( name, seq )
    SELECT 'entries', 0
    WHERE NOT EXISTS ( SELECT 1 FROM sqlite_sequence WHERE name = 'entries' );
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
