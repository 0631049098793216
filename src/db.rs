use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use tracing::warn;

use crate::error::StoreError;
use crate::profile::ProfileDraft;

/// Per-value size limit of the preferred configuration tier.
pub const PREFERRED_VALUE_LIMIT: usize = 8192;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS drafts (
            id           INTEGER PRIMARY KEY,
            source_url   TEXT NOT NULL,
            subject_id   TEXT,
            is_valid     BOOLEAN NOT NULL DEFAULT 0,
            attempts     INTEGER NOT NULL DEFAULT 0,
            body         TEXT NOT NULL,
            extracted_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_drafts_subject ON drafts(subject_id);

        -- Two-tier configuration store
        CREATE TABLE IF NOT EXISTS config_preferred (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS config_fallback (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

// ── Drafts ──

pub struct DraftRow {
    pub source_url: String,
    pub subject_id: Option<String>,
    pub is_valid: bool,
    pub attempts: u32,
    pub draft: ProfileDraft,
    pub extracted_at: String,
}

pub fn save_drafts(conn: &Connection, rows: &[DraftRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO drafts (source_url, subject_id, is_valid, attempts, body, extracted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for r in rows {
            let body = serde_json::to_string(&r.draft)?;
            count += stmt.execute(rusqlite::params![
                r.source_url, r.subject_id, r.is_valid, r.attempts, body, r.extracted_at,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_drafts(conn: &Connection, limit: usize) -> Result<Vec<DraftRow>> {
    let mut stmt = conn.prepare(
        "SELECT source_url, subject_id, is_valid, attempts, body, extracted_at
         FROM drafts ORDER BY id DESC LIMIT ?1",
    )?;
    let raw = stmt
        .query_map([limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    raw.into_iter()
        .map(|(source_url, subject_id, is_valid, attempts, body, extracted_at)| {
            Ok(DraftRow {
                source_url,
                subject_id,
                is_valid,
                attempts,
                draft: serde_json::from_str(&body)?,
                extracted_at,
            })
        })
        .collect()
}

// ── Configuration store ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Preferred,
    Fallback,
}

impl Tier {
    fn table(self) -> &'static str {
        match self {
            Tier::Preferred => "config_preferred",
            Tier::Fallback => "config_fallback",
        }
    }
}

/// Key-value settings kept in two tiers. Reads prefer the preferred tier;
/// writes go there unless it refuses them.
pub struct ConfigStore<'c> {
    conn: &'c Connection,
}

impl<'c> ConfigStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Values for `keys` from the preferred tier, or from the fallback tier
    /// when the preferred tier holds none of them.
    pub fn get(&self, keys: &[&str]) -> Result<BTreeMap<String, String>, StoreError> {
        let preferred = self.read(Tier::Preferred, keys)?;
        if !preferred.is_empty() {
            return Ok(preferred);
        }
        self.read(Tier::Fallback, keys)
    }

    pub fn set(&self, record: &BTreeMap<String, String>) -> Result<Tier, StoreError> {
        match self.write(Tier::Preferred, record) {
            Ok(()) => Ok(Tier::Preferred),
            Err(e) => {
                warn!(error = %e, "Preferred config tier refused write, using fallback");
                self.write(Tier::Fallback, record)?;
                Ok(Tier::Fallback)
            }
        }
    }

    fn read(&self, tier: Tier, keys: &[&str]) -> Result<BTreeMap<String, String>, StoreError> {
        let sql = format!("SELECT value FROM {} WHERE key = ?1", tier.table());
        let mut stmt = self.conn.prepare(&sql)?;
        let mut out = BTreeMap::new();
        for key in keys {
            let value: Option<String> = stmt.query_row([key], |r| r.get(0)).optional()?;
            if let Some(v) = value {
                out.insert(key.to_string(), v);
            }
        }
        Ok(out)
    }

    fn write(&self, tier: Tier, record: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if tier == Tier::Preferred {
            if let Some((key, value)) = record.iter().find(|(_, v)| v.len() > PREFERRED_VALUE_LIMIT) {
                return Err(StoreError::ValueTooLarge {
                    key: key.clone(),
                    size: value.len(),
                    limit: PREFERRED_VALUE_LIMIT,
                });
            }
        }

        let tx = self.conn.unchecked_transaction()?;
        {
            let sql = format!(
                "INSERT OR REPLACE INTO {} (key, value) VALUES (?1, ?2)",
                tier.table()
            );
            let mut stmt = tx.prepare(&sql)?;
            for (k, v) in record {
                stmt.execute(rusqlite::params![k, v])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

// ── Tests ──
