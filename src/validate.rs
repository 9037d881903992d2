//! Check candidate parent keys before a session token credential is created.
//!
//! One exchange when a role is given, then one read-only probe call with whatever
//! keys the exchange produced. The result is a user-facing message, not an error.

use tracing::{debug, warn};

use crate::credential::{AccessKey, DEFAULT_TOKEN_DURATION_SECS};
use crate::exchange::{AssumeRoleRequest, CloudProbe, StsExchange};

/// Session name used for the validation exchange when none is supplied.
pub const VALIDATION_SESSION_NAME: &str = "stskeep-validation";

/// Keys and optional role parameters entered by an operator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateKeys<'a> {
    pub access_key_id: &'a str,
    pub access_key_secret: &'a str,
    pub role_arn: Option<&'a str>,
    pub role_session_name: Option<&'a str>,
    pub token_duration_seconds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Ok,
    Error(String),
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        matches!(self, Validation::Ok)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Validation::Ok => None,
            Validation::Error(msg) => Some(msg),
        }
    }
}

/// Confirm that the candidate keys (and role, if any) are usable.
///
/// Empty input is accepted so that a form which has not been filled in yet does not
/// show an error.
pub fn check_parent_keys(
    exchange: &dyn StsExchange,
    probe: &dyn CloudProbe,
    candidate: &CandidateKeys<'_>,
) -> Validation {
    let ak_blank = candidate.access_key_id.trim().is_empty();
    let sk_blank = candidate.access_key_secret.trim().is_empty();
    if ak_blank && sk_blank {
        return Validation::Ok;
    }
    if ak_blank {
        return Validation::Error("Illegal Access Key".into());
    }
    if sk_blank {
        return Validation::Error("Illegal Secret Key".into());
    }

    let parent = AccessKey::new(candidate.access_key_id, candidate.access_key_secret);

    let role_arn = candidate.role_arn.filter(|arn| !arn.trim().is_empty());
    let regions = match role_arn {
        Some(role_arn) => {
            let request = AssumeRoleRequest {
                parent: &parent,
                role_arn,
                role_session_name: candidate
                    .role_session_name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or(VALIDATION_SESSION_NAME),
                duration_seconds: candidate
                    .token_duration_seconds
                    .unwrap_or(DEFAULT_TOKEN_DURATION_SECS),
            };
            let issued = match exchange.assume_role(&request) {
                Ok(issued) => issued,
                Err(e) => {
                    warn!(role_arn, error = %e, "Validation assume-role failed");
                    return Validation::Error(format!("Unable to assume role [{}]: {}", role_arn, e));
                }
            };
            let session_key = AccessKey::from_secret(issued.access_key_id, issued.access_key_secret);
            probe.describe_regions(&session_key, Some(&issued.security_token))
        }
        None => probe.describe_regions(&parent, None),
    };

    match regions {
        Ok(regions) if !regions.is_empty() => {
            debug!(region_count = regions.len(), "Validation probe succeeded");
            Validation::Ok
        }
        Ok(_) => Validation::Error("Illegal ak/sk".into()),
        Err(e) => {
            warn!(error = %e, "Validation probe failed");
            Validation::Error("Illegal ak/sk".into())
        }
    }
}
