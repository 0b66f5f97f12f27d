//! Session state and credential checking.
//!
//! A session only moves forward:
//!
//! ```text
//!   Initialized ──Hello──▶ Connected ──valid password──▶ Authenticated
//!                              │
//!                              └── invalid password: stays Connected
//! ```
//!
//! Passwords are never kept in the clear. The configured password is
//! reduced to an `HMAC-SHA256` digest at startup and candidates are
//! checked with the constant-time verifier from `hmac-sha256`.

use crate::error::ProtocolViolation;

use super::dispatch::Gate;

// ── Session state machine ────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    #[default]
    Initialized,
    Connected,
    Authenticated,
}

impl ConnectionState {
    /// Move to `next` if it is ahead of the current state. Never regresses.
    pub fn advance_to(&mut self, next: ConnectionState) {
        if next > *self {
            *self = next;
        }
    }

    /// Check whether a message behind `gate` may be handled now.
    pub fn admits(self, gate: Gate, msg_type: u32) -> Result<(), ProtocolViolation> {
        match gate {
            Gate::Open => Ok(()),
            Gate::Connected if self >= Self::Connected => Ok(()),
            Gate::Connected => Err(ProtocolViolation::NoSetup(msg_type)),
            Gate::Authenticated if self == Self::Authenticated => Ok(()),
            Gate::Authenticated if self == Self::Initialized => {
                Err(ProtocolViolation::NoSetup(msg_type))
            }
            Gate::Authenticated => Err(ProtocolViolation::Unauthenticated(msg_type)),
        }
    }

    pub fn is_authenticated(self) -> bool {
        self == Self::Authenticated
    }
}

// ── Credentials ──────────────────────────────────────────────

/// Key for the password digest. Fixed per firmware; it only stops the
/// clear-text password from sitting in RAM.
const DIGEST_KEY: &[u8] = b"apilink-password-v1";

/// Configured password, held as a digest.
#[derive(Clone)]
pub struct Credentials {
    digest: Option<[u8; 32]>,
}

impl Credentials {
    /// An empty password disables checking.
    pub fn new(password: &str) -> Self {
        let digest = (!password.is_empty()).then(|| hmac_sha256::HMAC::mac(password, DIGEST_KEY));
        Self { digest }
    }

    pub fn open() -> Self {
        Self { digest: None }
    }

    pub fn uses_password(&self) -> bool {
        self.digest.is_some()
    }

    /// Constant-time comparison of `candidate` against the configured
    /// password.
    pub fn check(&self, candidate: &str) -> bool {
        match &self.digest {
            None => true,
            Some(digest) => hmac_sha256::HMAC::verify(candidate, DIGEST_KEY, digest),
        }
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("uses_password", &self.uses_password())
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────
