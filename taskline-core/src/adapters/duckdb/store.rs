//! Document store over the sys_documents table
//!
//! Each document is one row holding its JSON field map. Server timestamps
//! resolve to RFC 3339 strings. Live queries only see writes made through
//! this instance.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use duckdb::{params, Connection};
use uuid::Uuid;

use super::DuckDbDatabase;
use crate::adapters::live::{FanoutStats, SnapshotFanout};
use crate::adapters::writes::{apply_write, timestamp_string, ServerClock};
use crate::domain::result::{Error, Result};
use crate::ports::{
    DocumentData, DocumentStore, DocumentWrite, Query, SnapshotStream, StoredDocument,
};

/// Document store persisted in DuckDB
pub struct DuckDbDocumentStore {
    db: Arc<DuckDbDatabase>,
    clock: Mutex<ServerClock>,
    fanout: SnapshotFanout,
}

impl DuckDbDocumentStore {
    pub fn new(db: Arc<DuckDbDatabase>) -> Self {
        Self {
            db,
            clock: Mutex::new(ServerClock::default()),
            fanout: SnapshotFanout::new(),
        }
    }

    pub fn subscription_stats(&self) -> FanoutStats {
        self.fanout.stats()
    }

    fn server_time(&self) -> Result<serde_json::Value> {
        let mut clock = self
            .clock
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))?;
        Ok(timestamp_string(clock.tick()))
    }

    fn publish(&self, conn: &Connection, collection: &str) -> Result<()> {
        let docs = load_collection(conn, collection)?;
        self.fanout.publish(collection, &docs);
        Ok(())
    }
}

fn parse_data(doc_id: &str, text: &str) -> DocumentData {
    match serde_json::from_str::<DocumentData>(text) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(doc_id, error = %e, "unreadable document, treating as empty");
            DocumentData::new()
        }
    }
}

fn load_collection(conn: &Connection, collection: &str) -> Result<Vec<StoredDocument>> {
    let mut stmt = conn.prepare(
        "SELECT doc_id, data FROM sys_documents WHERE collection = ? ORDER BY doc_id",
    )?;
    let rows = stmt.query_map([collection], |row| {
        let id: String = row.get(0)?;
        let text: String = row.get(1)?;
        Ok((id, text))
    })?;

    let mut docs = Vec::new();
    for row in rows {
        let (id, text) = row?;
        let data = parse_data(&id, &text);
        docs.push(StoredDocument { id, data });
    }
    Ok(docs)
}

fn load_document(conn: &Connection, collection: &str, id: &str) -> Result<Option<DocumentData>> {
    let mut stmt =
        conn.prepare("SELECT data FROM sys_documents WHERE collection = ? AND doc_id = ?")?;
    let mut rows = stmt.query(params![collection, id])?;
    match rows.next()? {
        Some(row) => {
            let text: String = row.get(0)?;
            Ok(Some(parse_data(id, &text)))
        }
        None => Ok(None),
    }
}

fn save_document(conn: &Connection, collection: &str, id: &str, data: &DocumentData) -> Result<()> {
    let text = serde_json::to_string(data)?;
    conn.execute(
        "INSERT INTO sys_documents (collection, doc_id, data)
         VALUES (?, ?, ?)
         ON CONFLICT (collection, doc_id) DO UPDATE SET data = EXCLUDED.data",
        params![collection, id, text],
    )?;
    Ok(())
}

#[async_trait]
impl DocumentStore for DuckDbDocumentStore {
    async fn insert(&self, collection: &str, write: DocumentWrite) -> Result<String> {
        let id = Uuid::new_v4().simple().to_string();
        let mut data = DocumentData::new();
        apply_write(&mut data, &write, &self.server_time()?);

        let conn = self.db.conn()?;
        save_document(&conn, collection, &id, &data)?;
        self.publish(&conn, collection)?;
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, write: DocumentWrite) -> Result<()> {
        let server_time = self.server_time()?;
        let conn = self.db.conn()?;
        let mut data = load_document(&conn, collection, id)?
            .ok_or_else(|| Error::not_found(format!("{}/{}", collection, id)))?;
        apply_write(&mut data, &write, &server_time);

        save_document(&conn, collection, id, &data)?;
        self.publish(&conn, collection)?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let conn = self.db.conn()?;
        let removed = conn.execute(
            "DELETE FROM sys_documents WHERE collection = ? AND doc_id = ?",
            params![collection, id],
        )?;
        if removed == 0 {
            return Err(Error::not_found(format!("{}/{}", collection, id)));
        }
        self.publish(&conn, collection)?;
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>> {
        let conn = self.db.conn()?;
        Ok(load_document(&conn, collection, id)?.map(|data| StoredDocument {
            id: id.to_string(),
            data,
        }))
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<StoredDocument>> {
        let conn = self.db.conn()?;
        Ok(load_collection(&conn, collection)?
            .into_iter()
            .filter(|doc| query.matches(&doc.data))
            .collect())
    }

    fn subscribe(&self, collection: &str, query: Query) -> Result<SnapshotStream> {
        let conn = self.db.conn()?;
        let initial = load_collection(&conn, collection)?
            .into_iter()
            .filter(|doc| query.matches(&doc.data))
            .collect();
        Ok(self.fanout.register(collection, query, initial))
    }
}
