//! REST API for recording and querying fingerprint-sharing consent.
//!
//! Two user-facing capabilities:
//! - `POST /auth/token` — verify a pre-provisioned user's password and issue
//!   a signed, time-bounded bearer token.
//! - `POST /biometria/fingerprint` / `GET /biometria/fingerprint/{user_id}` —
//!   record or query the user's boolean consent decision, guarded by an
//!   ownership check (token subject must match the target user).
//!
//! All state is in-memory and process-lifetime only.

pub mod auth;
pub mod config;
pub mod consent;
pub mod error;
pub mod gateway;
