use parking_lot::RwLock;
use tracing::{debug, error};

use super::{AccessKey, Credential, CredentialKind, CredentialScope};
use crate::clock::Clock;
use crate::error::{ExchangeError, Result, StsKeepError};
use crate::exchange::{AssumeRoleRequest, StsExchange};
use crate::types::*;

/// Validity window requested when a credential does not specify one.
pub const DEFAULT_TOKEN_DURATION_SECS: u32 = 3600;

/// The unit minted by one assume-role exchange: key pair, session token and the
/// time the exchange completed. Never updated field by field.
#[derive(Debug, Clone)]
pub struct SessionSecrets {
    access_key: AccessKey,
    session_token: SecretString,
    last_refresh_epoch_seconds: Option<i64>,
}

impl SessionSecrets {
    pub fn new(access_key: AccessKey, session_token: SecretString, last_refresh_epoch_seconds: i64) -> Self {
        Self {
            access_key,
            session_token,
            last_refresh_epoch_seconds: Some(last_refresh_epoch_seconds),
        }
    }

    /// Secrets whose issue time is unknown, e.g. supplied by a caller directly.
    pub fn unstamped(access_key: AccessKey, session_token: SecretString) -> Self {
        Self {
            access_key,
            session_token,
            last_refresh_epoch_seconds: None,
        }
    }

    pub fn access_key(&self) -> &AccessKey {
        &self.access_key
    }

    pub fn session_token(&self) -> &SecretString {
        &self.session_token
    }

    pub fn last_refresh_epoch_seconds(&self) -> Option<i64> {
        self.last_refresh_epoch_seconds
    }
}

/// Shared slot holding the current [`SessionSecrets`].
///
/// Readers take a snapshot `Arc`; a refresh swaps the whole value, so a reader sees
/// either the old unit or the new one.
#[derive(Debug, Clone, Default)]
pub struct SessionCell {
    inner: Arc<RwLock<Option<Arc<SessionSecrets>>>>,
}

impl SessionCell {
    fn new(initial: Option<SessionSecrets>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial.map(Arc::new))),
        }
    }

    pub fn load(&self) -> Option<Arc<SessionSecrets>> {
        self.inner.read().clone()
    }

    pub(crate) fn publish(&self, secrets: Arc<SessionSecrets>) {
        *self.inner.write() = Some(secrets);
    }

    /// Whether both handles point at the same slot.
    pub fn shares_with(&self, other: &SessionCell) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A credential whose key pair and token come from an assume-role exchange.
#[derive(Debug, Clone)]
pub struct SessionTokenCredential {
    parent: Option<AccessKey>,
    role_arn: String,
    role_session_name: String,
    token_duration_seconds: Option<u32>,
    cell: SessionCell,
}

impl SessionTokenCredential {
    pub fn parent(&self) -> Option<&AccessKey> {
        self.parent.as_ref()
    }

    pub fn role_arn(&self) -> &str {
        &self.role_arn
    }

    pub fn role_session_name(&self) -> &str {
        &self.role_session_name
    }

    pub fn token_duration_seconds(&self) -> Option<u32> {
        self.token_duration_seconds
    }

    pub fn effective_token_duration(&self) -> u32 {
        self.token_duration_seconds
            .unwrap_or(DEFAULT_TOKEN_DURATION_SECS)
    }

    /// Snapshot of the current secrets, `None` before the first successful exchange.
    pub fn secrets(&self) -> Option<Arc<SessionSecrets>> {
        self.cell.load()
    }

    pub fn last_refresh_epoch_seconds(&self) -> Option<i64> {
        self.secrets().and_then(|s| s.last_refresh_epoch_seconds)
    }

    pub fn cell(&self) -> &SessionCell {
        &self.cell
    }

    pub(crate) fn publish(&self, secrets: Arc<SessionSecrets>) {
        self.cell.publish(secrets);
    }

    /// Run one assume-role exchange with the parent key and package the result.
    fn mint(&self, credential_id: &str, exchange: &dyn StsExchange, clock: &dyn Clock) -> Result<SessionSecrets> {
        let parent = self
            .parent
            .as_ref()
            .ok_or_else(|| StsKeepError::MissingParent(credential_id.to_string()))?;

        let request = AssumeRoleRequest {
            parent,
            role_arn: &self.role_arn,
            role_session_name: &self.role_session_name,
            duration_seconds: self.effective_token_duration(),
        };
        debug!(
            credential_id,
            role_arn = %self.role_arn,
            duration_seconds = request.duration_seconds,
            "Calling assume-role"
        );
        let issued = exchange.assume_role(&request)?;

        Ok(SessionSecrets::new(
            AccessKey::from_secret(issued.access_key_id, issued.access_key_secret),
            issued.security_token,
            clock.now_epoch_seconds(),
        ))
    }
}

/// Inputs for [`Credential::issue_session_token`].
#[derive(Debug, Clone)]
pub struct SessionTokenParams {
    pub scope: CredentialScope,
    pub id: Option<String>,
    pub description: Option<String>,
    pub parent: Option<AccessKey>,
    pub role_arn: String,
    pub role_session_name: String,
    pub token_duration_seconds: Option<u32>,
}

impl SessionTokenParams {
    pub fn new(parent: AccessKey, role_arn: impl Into<String>, role_session_name: impl Into<String>) -> Self {
        Self {
            scope: CredentialScope::Global,
            id: None,
            description: None,
            parent: Some(parent),
            role_arn: role_arn.into(),
            role_session_name: role_session_name.into(),
            token_duration_seconds: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_scope(mut self, scope: CredentialScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_token_duration(mut self, secs: u32) -> Self {
        self.token_duration_seconds = Some(secs);
        self
    }
}

/// Fields of a session token credential loaded back from a host's persistence.
#[derive(Debug, Clone)]
pub struct RestoredSession {
    pub scope: CredentialScope,
    pub id: String,
    pub description: Option<String>,
    pub parent: Option<AccessKey>,
    pub role_arn: String,
    pub role_session_name: String,
    pub token_duration_seconds: Option<u32>,
    pub secrets: Option<SessionSecrets>,
}

/// Result of issuing a session token credential.
///
/// The credential exists even when the exchange failed; it then carries no
/// secrets and `exchange_error` holds the cause.
#[derive(Debug)]
pub struct Issued {
    pub credential: Credential,
    pub exchange_error: Option<ExchangeError>,
}

impl Issued {
    pub fn into_result(self) -> Result<Credential> {
        match self.exchange_error {
            Some(e) => Err(e.into()),
            None => Ok(self.credential),
        }
    }
}

impl Credential {
    /// Build a session token credential and perform exactly one exchange for it.
    ///
    /// A missing parent is rejected. An exchange failure is not: the credential is
    /// returned without secrets so that it can still be stored and refreshed later.
    pub fn issue_session_token(
        params: SessionTokenParams,
        exchange: &dyn StsExchange,
        clock: &dyn Clock,
    ) -> Result<Issued> {
        let SessionTokenParams {
            scope,
            id,
            description,
            parent,
            role_arn,
            role_session_name,
            token_duration_seconds,
        } = params;

        let Some(parent) = parent else {
            return Err(StsKeepError::MissingParent(
                id.unwrap_or_else(|| "<new>".to_string()),
            ));
        };

        let session = SessionTokenCredential {
            parent: Some(parent),
            role_arn,
            role_session_name,
            token_duration_seconds,
            cell: SessionCell::default(),
        };
        let credential = Credential::from_parts(scope, id, description, CredentialKind::SessionToken(session));

        let mut exchange_error = None;
        if let Some(session) = credential.as_session_token() {
            match session.mint(credential.id(), exchange, clock) {
                Ok(secrets) => session.publish(Arc::new(secrets)),
                Err(StsKeepError::Exchange(e)) => {
                    error!(
                        credential_id = credential.id(),
                        role_arn = session.role_arn(),
                        error = %e,
                        "Assume-role failed while creating session token credential"
                    );
                    exchange_error = Some(e);
                }
                Err(other) => return Err(other),
            }
        }

        Ok(Issued {
            credential,
            exchange_error,
        })
    }

    /// Wrap an already-known key pair and token. No exchange is made, the credential
    /// has no parent and no refresh time, so it is reported expired and cannot refresh.
    pub fn from_session_triple(access_key: AccessKey, session_token: SecretString) -> Self {
        let session = SessionTokenCredential {
            parent: None,
            role_arn: String::new(),
            role_session_name: String::new(),
            token_duration_seconds: None,
            cell: SessionCell::new(Some(SessionSecrets::unstamped(access_key, session_token))),
        };
        Credential::from_parts(CredentialScope::Global, None, None, CredentialKind::SessionToken(session))
    }

    /// Rebuild a session token credential from persisted fields without an exchange.
    pub fn restore_session_token(restored: RestoredSession) -> Self {
        let session = SessionTokenCredential {
            parent: restored.parent,
            role_arn: restored.role_arn,
            role_session_name: restored.role_session_name,
            token_duration_seconds: restored.token_duration_seconds,
            cell: SessionCell::new(restored.secrets),
        };
        Credential::from_parts(
            restored.scope,
            Some(restored.id),
            restored.description,
            CredentialKind::SessionToken(session),
        )
    }

    /// Perform one exchange for a restored credential, publishing the result in place.
    /// On failure the prior secrets are kept.
    pub fn rehydrate(&self, exchange: &dyn StsExchange, clock: &dyn Clock) -> Result<()> {
        let session = self
            .as_session_token()
            .ok_or_else(|| StsKeepError::NotSessionToken(self.id().to_string()))?;
        let secrets = session.mint(self.id(), exchange, clock)?;
        session.publish(Arc::new(secrets));
        Ok(())
    }

    /// Mint a replacement carrying this credential's identity and a fresh exchange.
    /// `self` is left untouched.
    pub fn reissue(&self, exchange: &dyn StsExchange, clock: &dyn Clock) -> Result<Credential> {
        let session = self
            .as_session_token()
            .ok_or_else(|| StsKeepError::NotSessionToken(self.id().to_string()))?;
        let secrets = session.mint(self.id(), exchange, clock)?;

        let replacement = SessionTokenCredential {
            parent: session.parent.clone(),
            role_arn: session.role_arn.clone(),
            role_session_name: session.role_session_name.clone(),
            token_duration_seconds: session.token_duration_seconds,
            cell: SessionCell::new(Some(secrets)),
        };
        Ok(Credential::from_parts(
            self.scope(),
            Some(self.id().to_string()),
            self.description().map(String::from),
            CredentialKind::SessionToken(replacement),
        ))
    }
}
