//! Credential persistence seam and an in-process implementation.

use parking_lot::RwLock;
use tracing::debug;

use crate::credential::Credential;
use crate::error::{Result, StsKeepError};
use crate::types::*;

const GLOBAL_DOMAIN: &str = "global";

/// Partition of a store inside which credential ids are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Domain(String);

impl Domain {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn global() -> Self {
        Self(GLOBAL_DOMAIN.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for Domain {
    fn default() -> Self {
        Self::global()
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keyed lookup plus atomic replacement of credential objects.
pub trait CredentialStore: Send + Sync {
    /// Find a credential by id. `Ok(None)` when no such credential exists.
    fn lookup(&self, id: &str) -> Result<Option<Credential>>;

    /// Swap `current` for `replacement` inside `domain` as one operation.
    /// On error the stored object must be left as it was.
    fn replace(&self, domain: &Domain, current: &Credential, replacement: Credential) -> Result<()>;
}

struct StoredEntry {
    domain: Domain,
    credential: Credential,
}

/// A [`CredentialStore`] kept in memory.
///
/// Lookups hand out clones that share session cells with the stored object.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, StoredEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a credential. Fails if the id is already taken in any domain.
    pub fn insert(&self, domain: Domain, credential: Credential) -> Result<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(credential.id()) {
            return Err(StsKeepError::AlreadyExists(credential.id().to_string()));
        }
        entries.insert(
            credential.id().to_string(),
            StoredEntry { domain, credential },
        );
        Ok(())
    }

    /// Remove a credential. Returns `true` if it existed.
    pub fn remove(&self, id: &str) -> bool {
        self.entries.write().remove(id).is_some()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn domain_of(&self, id: &str) -> Option<Domain> {
        self.entries.read().get(id).map(|e| e.domain.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl CredentialStore for MemoryStore {
    fn lookup(&self, id: &str) -> Result<Option<Credential>> {
        Ok(self.entries.read().get(id).map(|e| e.credential.clone()))
    }

    fn replace(&self, domain: &Domain, current: &Credential, replacement: Credential) -> Result<()> {
        if current.id() != replacement.id() {
            return Err(StsKeepError::Store(format!(
                "replacement id '{}' does not match '{}'",
                replacement.id(),
                current.id()
            )));
        }

        let mut entries = self.entries.write();
        let entry = entries.get_mut(current.id()).ok_or_else(|| {
            StsKeepError::Store(format!("credential '{}' is not in the store", current.id()))
        })?;
        if &entry.domain != domain {
            return Err(StsKeepError::Store(format!(
                "credential '{}' lives in domain '{}', not '{}'",
                current.id(),
                entry.domain,
                domain
            )));
        }

        entry.credential = replacement;
        debug!(credential_id = current.id(), %domain, "Replaced credential");
        Ok(())
    }
}
