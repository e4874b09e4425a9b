//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The pipeline and the network engine never execute SQL; callers hand
//! finished reports and results to the store.

mod analysis;
mod network;

pub use analysis::{AggregatedStats, StoredAnalysis};
pub use network::NetworkRunRecord;

use crate::error::TwinResult;
use rusqlite::Connection;

pub struct AnalysisStore {
    conn: Connection,
}

impl AnalysisStore {
    pub fn open(path: &str) -> TwinResult<Self> {
        let conn = Connection::open(path)?;
        // WAL only matters for real files; :memory: ignores it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> TwinResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order. Safe to call repeatedly.
    pub fn migrate(&self) -> TwinResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_analysis_log.sql"))?;
        Ok(())
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
