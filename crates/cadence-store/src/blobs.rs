//! Keyed blob persistence.
//!
//! Every piece of client state is saved under its own key as a complete
//! JSON document (see the blob key constants in `cadence_shared`).  Blobs
//! are loaded and saved independently: a corrupt or missing blob affects
//! only itself.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Load and deserialize the blob stored under `key`, or `None` if it
    /// has never been written.
    pub fn load_blob<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM blobs WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Serialize `value` and store it under `key`, replacing any previous
    /// blob with that key.
    pub fn save_blob<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.conn().execute(
            "INSERT INTO blobs (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Delete the blob stored under `key`.  Returns `true` if a row was
    /// removed.
    pub fn delete_blob(&self, key: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM blobs WHERE key = ?1", params![key])?;
        Ok(affected > 0)
    }

    /// Remove every stored blob.  This is the full local data reset; it is
    /// the only operation allowed to discard the change log.
    pub fn clear_blobs(&self) -> Result<()> {
        self.conn().execute("DELETE FROM blobs", [])?;
        Ok(())
    }
}
