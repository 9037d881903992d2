pub mod session;

use rand::RngCore;

use crate::types::*;

pub use session::{
    Issued, RestoredSession, SessionCell, SessionSecrets, SessionTokenCredential,
    SessionTokenParams, DEFAULT_TOKEN_DURATION_SECS,
};

/// Visibility class of a credential. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialScope {
    #[default]
    Global,
    System,
    User,
}

/// An access key pair. Both halves are always issued and replaced together.
#[derive(Debug, Clone)]
pub struct AccessKey {
    access_key_id: String,
    access_key_secret: SecretString,
}

impl AccessKey {
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: SecretString::new(access_key_secret.into()),
        }
    }

    pub fn from_secret(access_key_id: impl Into<String>, access_key_secret: SecretString) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret,
        }
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn access_key_secret(&self) -> &SecretString {
        &self.access_key_secret
    }
}

/// What a credential carries besides its identity.
#[derive(Debug, Clone)]
pub enum CredentialKind {
    /// A long-lived key pair.
    Static(AccessKey),
    /// A key pair plus session token minted by an assume-role exchange.
    SessionToken(SessionTokenCredential),
}

/// A credential held by a [`CredentialStore`](crate::store::CredentialStore).
///
/// Cloning a session token credential yields another handle onto the same session
/// cell: a refresh published through one handle is visible through every clone.
#[derive(Debug, Clone)]
pub struct Credential {
    id: String,
    scope: CredentialScope,
    description: Option<String>,
    kind: CredentialKind,
}

impl Credential {
    /// Create a static credential. A random id is assigned when `id` is `None`.
    pub fn new_static(
        scope: CredentialScope,
        id: Option<String>,
        description: Option<String>,
        key: AccessKey,
    ) -> Self {
        Self::from_parts(scope, id, description, CredentialKind::Static(key))
    }

    pub(crate) fn from_parts(
        scope: CredentialScope,
        id: Option<String>,
        description: Option<String>,
        kind: CredentialKind,
    ) -> Self {
        let id = match id {
            Some(id) if !id.trim().is_empty() => id,
            _ => generate_credential_id(),
        };
        Self {
            id,
            scope,
            description,
            kind,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scope(&self) -> CredentialScope {
        self.scope
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    pub fn kind(&self) -> &CredentialKind {
        &self.kind
    }

    pub fn as_session_token(&self) -> Option<&SessionTokenCredential> {
        match &self.kind {
            CredentialKind::SessionToken(session) => Some(session),
            CredentialKind::Static(_) => None,
        }
    }

    pub fn is_session_token(&self) -> bool {
        self.as_session_token().is_some()
    }

    /// The key pair currently in effect. For a session token credential this is the
    /// pair from the latest exchange, or `None` before the first one succeeded.
    pub fn access_key(&self) -> Option<AccessKey> {
        match &self.kind {
            CredentialKind::Static(key) => Some(key.clone()),
            CredentialKind::SessionToken(session) => {
                session.secrets().map(|s| s.access_key().clone())
            }
        }
    }

    pub fn access_key_id(&self) -> Option<String> {
        self.access_key().map(|k| k.access_key_id)
    }

    /// A view of this credential that is safe to log or serialize.
    pub fn summary(&self) -> CredentialSummary {
        let mut summary = CredentialSummary {
            id: self.id.clone(),
            scope: self.scope,
            description: self.description.clone(),
            kind: "static",
            access_key_id: self.access_key_id(),
            role_arn: None,
            role_session_name: None,
            token_duration_seconds: None,
            last_refresh: None,
            has_parent: false,
        };
        if let Some(session) = self.as_session_token() {
            summary.kind = "session_token";
            summary.role_arn = Some(session.role_arn().to_string());
            summary.role_session_name = Some(session.role_session_name().to_string());
            summary.token_duration_seconds = Some(session.effective_token_duration());
            summary.last_refresh = session
                .last_refresh_epoch_seconds()
                .map(crate::clock::format_epoch);
            summary.has_parent = session.parent().is_some();
        }
        summary
    }
}

/// Secret-free description of a credential.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialSummary {
    pub id: String,
    pub scope: CredentialScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_session_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_duration_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refresh: Option<String>,
    pub has_parent: bool,
}

/// Generate a short unique credential ID.
pub fn generate_credential_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
