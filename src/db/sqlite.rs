use crate::db::StateStore;
use crate::errors::StoreError;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

/// Local-file state store backed by a single SQLite table.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("open {}: {e}", path.display())))?;
        let store = Self::with_connection(conn)?;
        info!(path = %path.display(), "opened sqlite state store");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| StoreError::Unavailable(format!("failed to apply schema: {e}")))?;
        Ok(Self { conn })
    }
}

impl StateStore for SqliteStore {
    fn get_all(&mut self) -> Result<HashMap<String, String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT id, record FROM listings")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut out = HashMap::new();
        for row in rows {
            let (id, record) = row?;
            out.insert(id, record);
        }
        Ok(out)
    }

    fn get(&mut self, id: &str) -> Result<Option<String>, StoreError> {
        let record = self
            .conn
            .query_row(
                "SELECT record FROM listings WHERE id = ?1",
                params![id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(record)
    }

    fn put(&mut self, id: &str, record: &str) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO listings (id, record, updated_at)
            VALUES (?1, ?2, strftime('%s', 'now'))
            ON CONFLICT(id) DO UPDATE SET
                record = excluded.record,
                updated_at = excluded.updated_at
            "#,
            params![id, record],
        )?;
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM listings WHERE id = ?1", params![id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_overwrite_delete() {
        let mut store = SqliteStore::open_in_memory().unwrap();

        assert_eq!(store.get("a").unwrap(), None);

        store.put("a", r#"{"v":1}"#).unwrap();
        store.put("a", r#"{"v":2}"#).unwrap();
        store.put("b", r#"{"v":3}"#).unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some(r#"{"v":2}"#));

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["b"], r#"{"v":3}"#);

        store.delete("a").unwrap();
        store.delete("missing").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[test]
    fn test_reopening_file_keeps_entries() {
        let path = std::env::temp_dir().join(format!(
            "estate_watch_sqlite_{}.sqlite3",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.put("x", "{}").unwrap();
        }
        let mut store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("x").unwrap().as_deref(), Some("{}"));

        let _ = std::fs::remove_file(&path);
    }
}
