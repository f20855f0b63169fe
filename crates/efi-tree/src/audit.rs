//! Write-only, hash-chained audit trail of technician actions
//!
//! Entries are stored in a collection like every other record, so a store
//! snapshot carries the chain across restarts. Each entry commits to the
//! previous entry's hash, so editing or dropping any record breaks
//! [`AuditLog::verify_integrity`].

use crate::error::TreeError;
use crate::types::Outcome;
use chrono::{DateTime, Utc};
use efi_store::{Collection, Document, MemoryCollection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::Mutex;

/// What the technician did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditAction {
    /// A step outcome was recorded
    StepRecorded {
        /// Step answered
        step_id: String,
        /// PASS / FAIL
        outcome: Outcome,
    },
    /// The session was abandoned
    SessionAbandoned {
        /// Optional reason
        reason: Option<String>,
    },
}

impl AuditAction {
    fn digest_bytes(&self) -> Vec<u8> {
        match self {
            Self::StepRecorded { step_id, outcome } => {
                format!("step\0{step_id}\0{outcome}").into_bytes()
            }
            Self::SessionAbandoned { reason } => {
                format!("abandon\0{}", reason.as_deref().unwrap_or_default()).into_bytes()
            }
        }
    }
}

/// Audit record before it is chained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// Session the action belongs to
    pub session_id: String,
    /// Ticket being diagnosed
    pub ticket_id: String,
    /// Acting technician
    pub technician_id: String,
    /// Action taken
    pub action: AuditAction,
    /// When it happened
    pub recorded_at: DateTime<Utc>,
}

/// Chained audit entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Store id: `aud_` and the zero-padded sequence
    pub entry_id: String,
    /// Position in the log, from 0
    pub sequence: u64,
    /// Session the action belongs to
    pub session_id: String,
    /// Ticket being diagnosed
    pub ticket_id: String,
    /// Acting technician
    pub technician_id: String,
    /// Action taken
    pub action: AuditAction,
    /// When it happened
    pub recorded_at: DateTime<Utc>,
    /// Hash of the previous entry (zeros for the first)
    pub prev_hash: [u8; 32],
    /// Hash of this entry
    pub hash: [u8; 32],
}

impl AuditEntry {
    /// Hex form of this entry's hash
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

impl Document for AuditEntry {
    const COLLECTION: &'static str = "audit_entries";

    fn id(&self) -> &str {
        &self.entry_id
    }
}

fn entry_id(sequence: u64) -> String {
    format!("aud_{sequence:020}")
}

#[derive(Debug, Clone, Copy)]
struct ChainHead {
    next_sequence: u64,
    hash: [u8; 32],
}

impl ChainHead {
    const GENESIS: Self = Self {
        next_sequence: 0,
        hash: [0u8; 32],
    };
}

/// Append-only audit log over a store collection
#[derive(Debug)]
pub struct AuditLog {
    entries: Arc<dyn Collection<AuditEntry>>,
    // Loaded from the collection on first append, then kept in step with it
    head: Mutex<Option<ChainHead>>,
}

impl AuditLog {
    /// Log over an existing collection; appends continue its chain
    #[must_use]
    pub fn new(entries: Arc<dyn Collection<AuditEntry>>) -> Self {
        Self {
            entries,
            head: Mutex::new(None),
        }
    }

    /// Log over a fresh in-memory collection
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCollection::new()))
    }

    /// Chain and append a record
    ///
    /// # Errors
    /// Store failures; the chain head is left unchanged
    pub async fn append(&self, record: AuditRecord) -> Result<AuditEntry, TreeError> {
        let mut head = self.head.lock().await;
        let current = match *head {
            Some(current) => current,
            None => self.load_head().await?,
        };

        let mut entry = AuditEntry {
            entry_id: entry_id(current.next_sequence),
            sequence: current.next_sequence,
            session_id: record.session_id,
            ticket_id: record.ticket_id,
            technician_id: record.technician_id,
            action: record.action,
            recorded_at: record.recorded_at,
            prev_hash: current.hash,
            hash: [0u8; 32],
        };
        entry.hash = compute_hash(&entry);
        self.entries.insert(entry.clone()).await?;

        *head = Some(ChainHead {
            next_sequence: entry.sequence + 1,
            hash: entry.hash,
        });
        Ok(entry)
    }

    async fn load_head(&self) -> Result<ChainHead, TreeError> {
        Ok(self
            .entries()
            .await?
            .last()
            .map_or(ChainHead::GENESIS, |last| ChainHead {
                next_sequence: last.sequence + 1,
                hash: last.hash,
            }))
    }

    /// All entries in append order
    ///
    /// # Errors
    /// Store failures only
    pub async fn entries(&self) -> Result<Vec<AuditEntry>, TreeError> {
        let mut entries = self.entries.find(&|_: &AuditEntry| true).await?;
        entries.sort_by_key(|e| e.sequence);
        Ok(entries)
    }

    /// Entries for one session
    ///
    /// # Errors
    /// Store failures only
    pub async fn entries_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<AuditEntry>, TreeError> {
        let mut entries = self
            .entries
            .find(&|e: &AuditEntry| e.session_id == session_id)
            .await?;
        entries.sort_by_key(|e| e.sequence);
        Ok(entries)
    }

    /// Number of entries
    ///
    /// # Errors
    /// Store failures only
    pub async fn count(&self) -> Result<usize, TreeError> {
        Ok(self.entries.count(&|_: &AuditEntry| true).await?)
    }

    /// Hex hash of the latest entry
    ///
    /// # Errors
    /// Store failures only
    pub async fn head(&self) -> Result<Option<String>, TreeError> {
        Ok(self.entries().await?.last().map(AuditEntry::hash_hex))
    }

    /// Recompute the chain.
    ///
    /// # Errors
    /// `TreeError::AuditIntegrity` with the index of the first bad entry
    pub async fn verify_integrity(&self) -> Result<(), TreeError> {
        verify_chain(&self.entries().await?)
    }
}

/// Verify an exported chain of entries
///
/// # Errors
/// `TreeError::AuditIntegrity` with the index of the first bad entry
pub fn verify_chain(entries: &[AuditEntry]) -> Result<(), TreeError> {
    let mut prev = [0u8; 32];
    for (index, entry) in entries.iter().enumerate() {
        if entry.prev_hash != prev || entry.hash != compute_hash(entry) {
            return Err(TreeError::AuditIntegrity { index });
        }
        prev = entry.hash;
    }
    Ok(())
}

fn compute_hash(entry: &AuditEntry) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(entry.sequence.to_le_bytes());
    hasher.update(entry.session_id.as_bytes());
    hasher.update([0]);
    hasher.update(entry.ticket_id.as_bytes());
    hasher.update([0]);
    hasher.update(entry.technician_id.as_bytes());
    hasher.update([0]);
    hasher.update(entry.action.digest_bytes());
    hasher.update([0]);
    hasher.update(entry.recorded_at.timestamp_micros().to_le_bytes());
    hasher.update(entry.prev_hash);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(step: &str) -> AuditRecord {
        AuditRecord {
            session_id: "sess_1".to_string(),
            ticket_id: "T-1".to_string(),
            technician_id: "tech-7".to_string(),
            action: AuditAction::StepRecorded {
                step_id: step.to_string(),
                outcome: Outcome::Pass,
            },
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn chain_links_entries() {
        let log = AuditLog::in_memory();
        let first = log.append(record("s1")).await.unwrap();
        let second = log.append(record("s2")).await.unwrap();

        assert_eq!(first.prev_hash, [0u8; 32]);
        assert_eq!(second.prev_hash, first.hash);
        assert_eq!(log.head().await.unwrap(), Some(second.hash_hex()));
        assert_eq!(log.count().await.unwrap(), 2);
        assert!(log.verify_integrity().await.is_ok());
    }

    #[tokio::test]
    async fn reopened_log_continues_the_chain() {
        let store: Arc<dyn Collection<AuditEntry>> = Arc::new(MemoryCollection::new());
        let before = AuditLog::new(Arc::clone(&store));
        let first = before.append(record("s1")).await.unwrap();

        let persisted = MemoryCollection::with_documents(before.entries().await.unwrap());
        let after = AuditLog::new(Arc::new(persisted));
        let second = after.append(record("s2")).await.unwrap();

        assert_eq!(second.sequence, 1);
        assert_eq!(second.prev_hash, first.hash);
        assert!(after.verify_integrity().await.is_ok());
        // The original log never saw the second append
        assert_eq!(before.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_appends_form_one_chain() {
        let log = Arc::new(AuditLog::in_memory());
        let mut handles = Vec::new();
        for i in 0..8 {
            let log = Arc::clone(&log);
            handles.push(tokio::spawn(async move {
                log.append(record(&format!("s{i}"))).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let entries = log.entries().await.unwrap();
        let sequences: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, (0..8).collect::<Vec<u64>>());
        assert!(verify_chain(&entries).is_ok());
    }

    #[tokio::test]
    async fn tampering_is_detected() {
        let log = AuditLog::in_memory();
        for step in ["s1", "s2", "s3"] {
            log.append(record(step)).await.unwrap();
        }

        let mut entries = log.entries().await.unwrap();
        entries[1].action = AuditAction::StepRecorded {
            step_id: "s2".to_string(),
            outcome: Outcome::Fail,
        };
        assert!(matches!(
            verify_chain(&entries),
            Err(TreeError::AuditIntegrity { index: 1 })
        ));

        let mut entries = log.entries().await.unwrap();
        entries.remove(0);
        assert!(matches!(
            verify_chain(&entries),
            Err(TreeError::AuditIntegrity { index: 0 })
        ));
    }
}
