use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

/// Persistent string key/value store, the on-disk stand-in for browser
/// local storage.
pub struct LocalStorage {
    conn: Connection,
}

impl LocalStorage {
    pub fn open(path: &str) -> Result<Self> {
        let mut store = Self { conn: Connection::open(path)? };
        store.init()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let mut store = Self { conn: Connection::open_in_memory()? };
        store.init()?;
        Ok(store)
    }

    fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM local_storage WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO local_storage (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn remove_item(&mut self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM local_storage WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Apply several writes and removals atomically.
    pub fn apply(&mut self, sets: &[(&str, &str)], removes: &[&str]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for (key, value) in sets {
            tx.execute(
                "INSERT INTO local_storage (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
        }
        for key in removes {
            tx.execute("DELETE FROM local_storage WHERE key = ?1", params![key])?;
        }
        tx.commit()?;
        Ok(())
    }
}
