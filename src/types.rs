pub use chrono::{DateTime, TimeZone, Utc};
pub use secrecy::{ExposeSecret, SecretString};
pub use serde::{Deserialize, Serialize};
pub use std::collections::BTreeMap;
pub use std::path::PathBuf;
pub use std::sync::Arc;
