//! Read-triggered refresh of session token credentials.
//!
//! [`CredentialResolver::resolve`] is the lookup path every consumer goes through:
//! fetch from the store, check expiry, and when stale re-issue the credential,
//! replace it in the store and publish the new secrets to every holder of the old
//! object. Refresh failures are logged and audited but never returned as errors;
//! the caller then gets the stale credential.

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::audit::AuditLog;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::credential::{Credential, SessionTokenCredential};
use crate::error::{Result, StsKeepError};
use crate::exchange::StsExchange;
use crate::expiry::ExpiryPolicy;
use crate::store::{CredentialStore, Domain};
use crate::types::*;

/// What happened to the credential during a resolve.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// Not a session token credential; no expiry applies.
    NotApplicable,
    /// Session token still inside its window; returned as stored.
    Fresh,
    /// Secrets were renewed, either by this call or by a concurrent one.
    Refreshed,
    /// Renewal was needed but failed; the credential is stale.
    Failed(StsKeepError),
}

impl RefreshOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, RefreshOutcome::Failed(_))
    }

    fn label(&self) -> &'static str {
        match self {
            RefreshOutcome::NotApplicable => "not_applicable",
            RefreshOutcome::Fresh => "fresh",
            RefreshOutcome::Refreshed => "refreshed",
            RefreshOutcome::Failed(_) => "failed",
        }
    }
}

/// A resolved credential and how it was obtained.
#[derive(Debug)]
pub struct Resolution {
    pub credential: Credential,
    pub outcome: RefreshOutcome,
}

/// How a successful refresh came about.
enum Renewal {
    Exchanged,
    /// Another caller refreshed while this one waited for the lock.
    Adopted,
}

/// Looks credentials up and keeps session tokens fresh on the way out.
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
    exchange: Arc<dyn StsExchange>,
    clock: Arc<dyn Clock>,
    policy: ExpiryPolicy,
    domain: Domain,
    audit: Option<AuditLog>,
    /// Human-readable actor label for audit entries.
    actor: String,
    /// Per-credential locks so concurrent stale reads refresh once. An entry is
    /// dropped once its id is no longer in the store, so the map never holds more
    /// ids than the store does.
    refresh_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn CredentialStore>, exchange: Arc<dyn StsExchange>) -> Self {
        Self {
            store,
            exchange,
            clock: Arc::new(SystemClock),
            policy: ExpiryPolicy::default(),
            domain: Domain::global(),
            audit: None,
            actor: "resolver".to_string(),
            refresh_locks: DashMap::new(),
        }
    }

    /// Build a resolver from loaded configuration, opening the audit log if enabled.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        exchange: Arc<dyn StsExchange>,
    ) -> Result<Self> {
        let mut resolver = Self::new(store, exchange)
            .with_policy(config.expiry_policy()?)
            .with_domain(config.domain());
        if let Some(audit) = config.audit.open()? {
            resolver = resolver.with_audit(audit);
        }
        Ok(resolver)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_domain(mut self, domain: Domain) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Override the actor label used in audit entries.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn policy(&self) -> ExpiryPolicy {
        self.policy
    }

    /// Return the best available credential for `id`, refreshing it first if stale.
    ///
    /// `Ok(None)` for a blank or unknown id. Only a failing store lookup is an error.
    pub fn resolve(&self, id: &str) -> Result<Option<Credential>> {
        Ok(self.resolve_detailed(id)?.map(|r| r.credential))
    }

    /// Like [`resolve`](Self::resolve), also reporting whether a refresh happened.
    #[instrument(skip_all, fields(credential_id = %id))]
    pub fn resolve_detailed(&self, id: &str) -> Result<Option<Resolution>> {
        if id.trim().is_empty() {
            warn!("Credential lookup with a blank id");
            return Ok(None);
        }

        let Some(credential) = self.store.lookup(id)? else {
            warn!("Credential not found");
            self.refresh_locks.remove(id);
            return Ok(None);
        };

        let Some(session) = credential.as_session_token() else {
            return Ok(Some(Resolution {
                credential,
                outcome: RefreshOutcome::NotApplicable,
            }));
        };

        let now = self.clock.now_epoch_seconds();
        if !self.policy.check(session, now) {
            debug!(
                remaining_secs = ?self.policy.remaining_secs(
                    session.last_refresh_epoch_seconds(),
                    now,
                    i64::from(session.effective_token_duration()),
                ),
                "Session token is fresh"
            );
            return Ok(Some(Resolution {
                credential,
                outcome: RefreshOutcome::Fresh,
            }));
        }

        info!(role_arn = session.role_arn(), "Session token expired, refreshing");
        let outcome = match self.refresh(&credential, session) {
            Ok(Renewal::Exchanged) => {
                info!("Refresh succeeded");
                self.audit("refresh", id, "success", None);
                RefreshOutcome::Refreshed
            }
            Ok(Renewal::Adopted) => {
                debug!("Adopted secrets refreshed by a concurrent caller");
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                match &e {
                    StsKeepError::MissingParent(_) => error!(error = %e, "Refresh failed"),
                    _ => warn!(error = %e, code = e.error_code(), "Refresh failed, returning stale credential"),
                }
                self.audit("refresh", id, "failed", Some(&e.to_string()));
                RefreshOutcome::Failed(e)
            }
        };

        debug!(outcome = outcome.label(), "Resolve finished");
        Ok(Some(Resolution { credential, outcome }))
    }

    /// Re-issue `credential`, swap it into the store, then publish to the original.
    /// Any error leaves both the store and the original's secrets untouched.
    fn refresh(&self, credential: &Credential, session: &SessionTokenCredential) -> Result<Renewal> {
        let lock = self.refresh_lock(credential.id());
        let _guard = lock.lock();

        // Another caller may have finished a refresh while we waited.
        if let Some(current) = self.store.lookup(credential.id())? {
            if let Some(current_session) = current.as_session_token() {
                let now = self.clock.now_epoch_seconds();
                if !self.policy.check(current_session, now) {
                    if let Some(secrets) = current_session.secrets() {
                        if !current_session.cell().shares_with(session.cell()) {
                            session.publish(secrets);
                        }
                        return Ok(Renewal::Adopted);
                    }
                }
            }
        }

        if session.parent().is_none() {
            return Err(StsKeepError::MissingParent(credential.id().to_string()));
        }

        let replacement = credential.reissue(self.exchange.as_ref(), self.clock.as_ref())?;
        let secrets = replacement
            .as_session_token()
            .and_then(|s| s.secrets())
            .ok_or_else(|| StsKeepError::Other("replacement carries no session secrets".into()))?;

        self.store.replace(&self.domain, credential, replacement)?;
        session.publish(secrets);
        Ok(Renewal::Exchanged)
    }

    fn refresh_lock(&self, id: &str) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn audit(&self, operation: &str, credential: &str, outcome: &str, detail: Option<&str>) {
        let Some(audit) = &self.audit else {
            return;
        };
        if let Err(e) = audit.log_event(operation, Some(credential), &self.actor, outcome, detail) {
            warn!(error = %e, "Failed to append refresh audit entry");
        }
    }
}
