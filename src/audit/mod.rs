//! Tamper-evident trail of refresh attempts.
//!
//! Each line of the log is one JSON [`AuditEntry`]. Entries are chained: every
//! `chain_hmac` covers the previous entry's HMAC plus the entry's own fields, so
//! editing or dropping a line breaks verification from that point on.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use sha2::Sha256;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{Result, StsKeepError};
use crate::types::*;

type HmacSha256 = Hmac<Sha256>;

const AUDIT_KEY_INFO: &[u8] = b"refresh-audit-hmac";
const AUDIT_KEY_LEN: usize = 32;

/// A single audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub credential: Option<String>,
    pub actor: String,
    pub outcome: String,
    pub detail: Option<String>,
    pub chain_hmac: String,
}

/// Append-only, HMAC-chained audit log file.
///
/// Appends through one handle are serialized, so each entry chains to the one
/// written before it even when many threads log at once.
pub struct AuditLog {
    path: PathBuf,
    hmac_key: Zeroizing<Vec<u8>>,
    append_lock: Mutex<()>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl AuditLog {
    /// Open (or prepare to create) the log at `path`, keyed from `key_material`.
    pub fn new(path: impl Into<PathBuf>, key_material: &[u8]) -> Result<Self> {
        Ok(Self {
            path: path.into(),
            hmac_key: derive_key(key_material, AUDIT_KEY_INFO, AUDIT_KEY_LEN)?,
            append_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an audit entry to the log file.
    pub fn log_event(
        &self,
        operation: &str,
        credential: Option<&str>,
        actor: &str,
        outcome: &str,
        detail: Option<&str>,
    ) -> Result<()> {
        // Held until the line is written; the next entry must see this one's HMAC.
        let _guard = self.append_lock.lock();
        let prev_hmac = read_last_hmac(&self.path);

        let entry = AuditEntry {
            timestamp: Utc::now(),
            operation: operation.to_string(),
            credential: credential.map(|s| s.to_string()),
            actor: actor.to_string(),
            outcome: outcome.to_string(),
            detail: detail.map(|s| s.to_string()),
            chain_hmac: String::new(),
        };

        let chain_hmac = compute_chain_hmac(&chain_data(&prev_hmac, &entry), &self.hmac_key)?;
        let final_entry = AuditEntry {
            chain_hmac,
            ..entry
        };

        let json_line = serde_json::to_string(&final_entry)
            .map_err(|e| StsKeepError::Serialization(e.to_string()))?;

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", json_line)?;

        Ok(())
    }

    pub fn read_entries(&self) -> Result<Vec<AuditEntry>> {
        read_entries(&self.path)
    }

    /// Verify the HMAC chain. Returns the number of entries checked.
    pub fn verify_chain(&self) -> Result<usize> {
        let entries = read_entries(&self.path)?;
        let mut prev_hmac = String::new();

        for (i, entry) in entries.iter().enumerate() {
            let expected = compute_chain_hmac(&chain_data(&prev_hmac, entry), &self.hmac_key)?;
            let matches: bool = expected
                .as_bytes()
                .ct_eq(entry.chain_hmac.as_bytes())
                .into();
            if !matches {
                return Err(StsKeepError::AuditChainBroken(i));
            }
            prev_hmac = entry.chain_hmac.clone();
        }

        Ok(entries.len())
    }
}

/// Read all audit entries from a log file. A missing file has no entries.
pub fn read_entries(audit_path: &Path) -> Result<Vec<AuditEntry>> {
    if !audit_path.exists() {
        return Ok(Vec::new());
    }

    let file = fs::File::open(audit_path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: AuditEntry =
            serde_json::from_str(&line).map_err(|e| StsKeepError::Serialization(e.to_string()))?;
        entries.push(entry);
    }

    Ok(entries)
}

/// Default location of the refresh audit log (`~/.stskeep/refresh-audit.log`).
pub fn default_audit_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".stskeep").join("refresh-audit.log"))
}

/// Derive a sub-key using HKDF-SHA256.
pub fn derive_key(master: &[u8], info: &[u8], output_len: usize) -> Result<Zeroizing<Vec<u8>>> {
    let hk = Hkdf::<Sha256>::new(None, master);
    let mut okm = Zeroizing::new(vec![0u8; output_len]);
    hk.expand(info, &mut okm)
        .map_err(|e| StsKeepError::Other(format!("Key derivation failed: {}", e)))?;
    Ok(okm)
}

fn chain_data(prev_hmac: &str, entry: &AuditEntry) -> String {
    format!(
        "{}|{}|{}|{:?}|{}|{}|{:?}",
        prev_hmac,
        entry.timestamp.to_rfc3339(),
        entry.operation,
        entry.credential,
        entry.actor,
        entry.outcome,
        entry.detail,
    )
}

fn read_last_hmac(audit_path: &Path) -> String {
    if let Ok(content) = fs::read_to_string(audit_path) {
        for line in content.lines().rev() {
            if !line.trim().is_empty() {
                if let Ok(entry) = serde_json::from_str::<AuditEntry>(line) {
                    return entry.chain_hmac;
                }
            }
        }
    }

    String::new()
}

fn compute_chain_hmac(data: &str, hmac_key: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(hmac_key)
        .map_err(|e| StsKeepError::Other(format!("Invalid audit key: {}", e)))?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}
