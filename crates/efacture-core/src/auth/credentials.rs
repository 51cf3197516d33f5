use std::fmt;

use serde::Serialize;

/// Login and password for the platform's authenticate endpoint.
///
/// Only ever held in memory for the duration of one authenticate call.
#[derive(Clone, Serialize)]
pub struct Credential {
    pub login: String,
    pub password: String,
}

impl Credential {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }

    /// Both fields are required by the platform
    pub fn is_complete(&self) -> bool {
        !self.login.trim().is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}
