//! Credential verification and bearer-token issuance.
//!
//! Provides:
//! - An in-memory credential store seeded at process start (iterated
//!   SHA-256, 100k rounds + per-user salt)
//! - Stateless JWT bearer tokens (HS256, 24h expiry, subject claim)
//!
//! ## Design Decisions
//! - The credential set is fixed for the process lifetime; there is no
//!   registration, password-reset, or revocation surface.
//! - Verification never distinguishes "unknown user" from "wrong password"
//!   outward, and runs a dummy hash on the unknown-user path so the two take
//!   comparable time.

pub mod credentials;
pub mod token;

pub use credentials::{CredentialStore, CredentialView};
pub use token::{TokenError, TokenService};
