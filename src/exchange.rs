//! Seams to the cloud: the assume-role exchange and a read-only probe call.
//!
//! Neither trait retries or applies timeouts; both belong to the implementation.

use crate::credential::AccessKey;
use crate::error::ExchangeError;
use crate::types::*;

/// One assume-role request made with a parent key pair.
#[derive(Debug, Clone, Copy)]
pub struct AssumeRoleRequest<'a> {
    pub parent: &'a AccessKey,
    pub role_arn: &'a str,
    pub role_session_name: &'a str,
    pub duration_seconds: u32,
}

/// Temporary credentials returned by an assume-role exchange.
#[derive(Debug, Clone)]
pub struct StsCredentials {
    pub access_key_id: String,
    pub access_key_secret: SecretString,
    pub security_token: SecretString,
    /// Expiration reported by the service, when it reports one.
    pub expiration: Option<DateTime<Utc>>,
}

/// Trades a long-lived key pair plus a role for a short-lived triple.
pub trait StsExchange: Send + Sync {
    fn assume_role(&self, request: &AssumeRoleRequest<'_>) -> std::result::Result<StsCredentials, ExchangeError>;
}

/// A lightweight read-only call used to prove that a key pair works.
pub trait CloudProbe: Send + Sync {
    fn describe_regions(
        &self,
        key: &AccessKey,
        session_token: Option<&SecretString>,
    ) -> std::result::Result<Vec<String>, ExchangeError>;
}
