//! Generation of the shared web UI password.
use std::fmt::{Debug, Display};

use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Number of random bytes backing a generated password, rendered as twice as many hex characters.
pub const WEB_PASSWORD_BYTES: usize = 16;

/// The basic auth password shared by every unit of the application.
///
/// The value is wiped from memory on drop and never shows up in `Debug` output, so it can be
/// passed into `tracing` fields without leaking.
#[derive(Clone, Eq, PartialEq, Zeroize, ZeroizeOnDrop)]
pub struct WebPassword(String);

impl WebPassword {
    /// Generates a new password from the thread local CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; WEB_PASSWORD_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        let password = Self(hex::encode(bytes));
        bytes.zeroize();
        password
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for WebPassword {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for WebPassword {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Debug for WebPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WebPassword(<redacted>)")
    }
}

/// Shows the password itself. Only use this where the value is meant to leave the charm, e.g.
/// action results or the workload environment.
impl Display for WebPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
