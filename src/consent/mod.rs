//! Consent-record storage (in-memory, process lifetime).

pub mod store;

pub use store::{ConsentRecord, ConsentStats, ConsentStore};
