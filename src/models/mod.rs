//! Data models shared across the session layer.

use serde::{Deserialize, Serialize};

/// Account record returned by the registration endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub email: String,
}
