//! stskeep: assume-role session credentials that keep themselves fresh.
//!
//! A [`Credential`] is either a static key pair or a session token minted by an
//! assume-role exchange with a parent key pair. [`CredentialResolver`] is the
//! lookup path: it fetches a credential from a [`CredentialStore`], and when a
//! session token is inside its safety margin it re-issues the token, replaces the
//! stored object and publishes the new secrets to every holder of the old one.
//!
//! Refresh is lazy. Nothing runs in the background; the exchange happens on the
//! caller's thread during `resolve`.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use stskeep::{AccessKey, Credential, CredentialResolver, Domain, MemoryStore, SessionTokenParams, SystemClock};
//! # fn client() -> Arc<dyn stskeep::StsExchange> { unimplemented!() }
//!
//! let exchange = client();
//! let store = Arc::new(MemoryStore::new());
//!
//! let params = SessionTokenParams::new(
//!     AccessKey::new("parent-ak", "parent-sk"),
//!     "acs:ram::123456:role/deployer",
//!     "ci",
//! )
//! .with_id("deploy");
//! let issued = Credential::issue_session_token(params, exchange.as_ref(), &SystemClock)?;
//! store.insert(Domain::global(), issued.credential)?;
//!
//! let resolver = CredentialResolver::new(store, exchange);
//! let credential = resolver.resolve("deploy")?;
//! # Ok::<(), stskeep::StsKeepError>(())
//! ```

pub mod audit;
pub mod clock;
pub mod config;
pub mod credential;
pub mod error;
pub mod exchange;
pub mod expiry;
pub mod logging;
pub mod resolver;
pub mod store;
pub mod types;
pub mod validate;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credential::{
    AccessKey, Credential, CredentialKind, CredentialScope, CredentialSummary, Issued,
    RestoredSession, SessionSecrets, SessionTokenCredential, SessionTokenParams,
};
pub use error::{ExchangeError, Result, StsKeepError};
pub use exchange::{AssumeRoleRequest, CloudProbe, StsCredentials, StsExchange};
pub use expiry::ExpiryPolicy;
pub use resolver::{CredentialResolver, RefreshOutcome, Resolution};
pub use store::{CredentialStore, Domain, MemoryStore};

// Resolvers and stores are shared across threads.
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    let _ = assert_send_sync::<CredentialResolver>;
    let _ = assert_send_sync::<MemoryStore>;
    let _ = assert_send_sync::<Credential>;
};
