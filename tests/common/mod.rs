//! Fakes shared by the integration tests: a scripted STS exchange, a probe, and a
//! store wrapper that counts and can fail calls.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use stskeep::{
    AccessKey, AssumeRoleRequest, CloudProbe, Credential, CredentialStore, Domain, ExchangeError,
    ManualClock, MemoryStore, Result, SessionTokenParams, StsCredentials, StsExchange,
};

pub const T0: i64 = 1_700_000_000;
pub const ROLE_ARN: &str = "acs:ram::1234567890:role/deployer";

/// What the fake saw for each assume-role call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    pub parent_access_key_id: String,
    pub parent_secret: String,
    pub role_arn: String,
    pub role_session_name: String,
    pub duration_seconds: u32,
}

/// Hands out `AK{n}` / `SK{n}` / `TOK{n}` for the n-th successful call.
/// Queued failures are returned first, one per call.
#[derive(Default)]
pub struct FakeExchange {
    issued: AtomicUsize,
    failures: Mutex<VecDeque<ExchangeError>>,
    seen: Mutex<Vec<SeenRequest>>,
    delay: Mutex<Option<Duration>>,
}

impl FakeExchange {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, error: ExchangeError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl StsExchange for FakeExchange {
    fn assume_role(&self, request: &AssumeRoleRequest<'_>) -> std::result::Result<StsCredentials, ExchangeError> {
        self.seen.lock().unwrap().push(SeenRequest {
            parent_access_key_id: request.parent.access_key_id().to_string(),
            parent_secret: request.parent.access_key_secret().expose_secret().to_string(),
            role_arn: request.role_arn.to_string(),
            role_session_name: request.role_session_name.to_string(),
            duration_seconds: request.duration_seconds,
        });

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(StsCredentials {
            access_key_id: format!("AK{n}"),
            access_key_secret: SecretString::new(format!("SK{n}")),
            security_token: SecretString::new(format!("TOK{n}")),
            expiration: None,
        })
    }
}

/// Returns a fixed region list, and records the key it was called with.
pub struct FakeProbe {
    pub regions: Mutex<std::result::Result<Vec<String>, ExchangeError>>,
    pub seen_keys: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeProbe {
    pub fn with_regions(regions: &[&str]) -> Self {
        Self {
            regions: Mutex::new(Ok(regions.iter().map(|r| r.to_string()).collect())),
            seen_keys: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ExchangeError) -> Self {
        Self {
            regions: Mutex::new(Err(error)),
            seen_keys: Mutex::new(Vec::new()),
        }
    }
}

impl CloudProbe for FakeProbe {
    fn describe_regions(
        &self,
        key: &AccessKey,
        session_token: Option<&SecretString>,
    ) -> std::result::Result<Vec<String>, ExchangeError> {
        self.seen_keys.lock().unwrap().push((
            key.access_key_id().to_string(),
            session_token.map(|t| t.expose_secret().to_string()),
        ));
        self.regions.lock().unwrap().clone()
    }
}

/// A [`MemoryStore`] that counts calls and can be told to fail them.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    lookups: AtomicUsize,
    replaces: AtomicUsize,
    fail_replace: AtomicBool,
    fail_lookup: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_replace(&self, fail: bool) {
        self.fail_replace.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lookup(&self, fail: bool) {
        self.fail_lookup.store(fail, Ordering::SeqCst);
    }

    pub fn replaces(&self) -> usize {
        self.replaces.load(Ordering::SeqCst)
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl CredentialStore for FlakyStore {
    fn lookup(&self, id: &str) -> Result<Option<Credential>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk unavailable").into());
        }
        self.inner.lookup(id)
    }

    fn replace(&self, domain: &Domain, current: &Credential, replacement: Credential) -> Result<()> {
        self.replaces.fetch_add(1, Ordering::SeqCst);
        if self.fail_replace.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "write failed").into());
        }
        self.inner.replace(domain, current, replacement)
    }
}

pub fn parent_key() -> AccessKey {
    AccessKey::new("PARENT-AK", "PARENT-SK")
}

/// Issue a session token credential `id` at `T0` (consumes `AK1`/`SK1`/`TOK1`)
/// and put it in the store's global domain.
pub fn seed_session(store: &FlakyStore, exchange: &FakeExchange, clock: &ManualClock, id: &str) -> Credential {
    clock.set(T0);
    let params = SessionTokenParams::new(parent_key(), ROLE_ARN, "ci-session")
        .with_id(id)
        .with_description("deploy bot");
    let credential = Credential::issue_session_token(params, exchange, clock)
        .unwrap()
        .into_result()
        .unwrap();
    store.inner.insert(Domain::global(), credential.clone()).unwrap();
    credential
}

/// Current (access key id, secret, token, last refresh) of a session credential.
pub fn bound_fields(credential: &Credential) -> (String, String, String, Option<i64>) {
    let session = credential.as_session_token().expect("session token credential");
    let secrets = session.secrets().expect("secrets present");
    (
        secrets.access_key().access_key_id().to_string(),
        secrets.access_key().access_key_secret().expose_secret().to_string(),
        secrets.session_token().expose_secret().to_string(),
        secrets.last_refresh_epoch_seconds(),
    )
}

/// The object the store currently holds for `id`.
pub fn stored(store: &FlakyStore, id: &str) -> Credential {
    store
        .inner
        .lookup(id)
        .unwrap()
        .expect("credential in store")
}
