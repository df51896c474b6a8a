//! In-memory map of fingerprint-sharing decisions, one record per user.
//!
//! Upsert semantics: a second write for the same user replaces the `shared`
//! flag and stamps `data_atualizacao`; the original `data_cadastro` is kept.
//! Records are volatile — lost on process restart.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

/// A user's recorded decision about sharing fingerprint data.
///
/// Wire field names follow the public API contract; `data_atualizacao` is
/// absent until the record has been rewritten at least once.
#[derive(Debug, Clone, Serialize)]
pub struct ConsentRecord {
    pub user_id: String,
    #[serde(rename = "compartilhou_fingerprint")]
    pub shared: bool,
    #[serde(rename = "data_cadastro")]
    pub recorded_at: DateTime<Utc>,
    #[serde(rename = "data_atualizacao", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Aggregate acceptance numbers. Debug/ops helper, not part of the public
/// request surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsentStats {
    pub total: usize,
    pub aceitaram: usize,
    pub recusaram: usize,
    pub percentual_aceitacao: f64,
}

/// Consent records keyed by user id. The mutex makes single-key mutations
/// atomic under the multi-threaded runtime.
#[derive(Debug, Default)]
pub struct ConsentStore {
    records: Mutex<HashMap<String, ConsentRecord>>,
}

impl ConsentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, or overwrite the existing one's `shared` value.
    /// Always succeeds; returns the resulting record.
    pub fn upsert(&self, user_id: &str, shared: bool) -> ConsentRecord {
        let now = Utc::now();
        let mut records = self.records.lock();

        let record = match records.get_mut(user_id) {
            Some(existing) => {
                existing.shared = shared;
                existing.updated_at = Some(now);
                existing.clone()
            }
            None => {
                let record = ConsentRecord {
                    user_id: user_id.to_owned(),
                    shared,
                    recorded_at: now,
                    updated_at: None,
                };
                records.insert(user_id.to_owned(), record.clone());
                record
            }
        };
        drop(records);

        tracing::info!(user_id, shared, "consent decision recorded");
        record
    }

    /// Point lookup. `None` if the user never recorded a decision.
    pub fn get(&self, user_id: &str) -> Option<ConsentRecord> {
        self.records.lock().get(user_id).cloned()
    }

    /// Remove all records. Test-harness reset only; not reachable from any
    /// route.
    pub fn clear(&self) {
        self.records.lock().clear();
    }

    /// All records, in no particular order.
    pub fn list(&self) -> Vec<ConsentRecord> {
        self.records.lock().values().cloned().collect()
    }

    /// Acceptance/refusal counts over the current records.
    pub fn stats(&self) -> ConsentStats {
        let records = self.records.lock();
        let total = records.len();
        let aceitaram = records.values().filter(|r| r.shared).count();
        let recusaram = total - aceitaram;
        let percentual_aceitacao = if total > 0 {
            (aceitaram as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        ConsentStats {
            total,
            aceitaram,
            recusaram,
            percentual_aceitacao,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_then_get_round_trips() {
        let store = ConsentStore::new();
        store.upsert("abc123", true);

        let record = store.get("abc123").unwrap();
        assert_eq!(record.user_id, "abc123");
        assert!(record.shared);
        assert!(record.updated_at.is_none());
    }

    #[test]
    fn get_missing_returns_none() {
        let store = ConsentStore::new();
        assert!(store.get("ghost").is_none());
    }

    #[test]
    fn second_write_wins_and_stamps_update() {
        let store = ConsentStore::new();
        let first = store.upsert("abc123", true);
        let second = store.upsert("abc123", false);

        assert!(!second.shared);
        assert_eq!(second.recorded_at, first.recorded_at);
        assert!(second.updated_at.is_some());

        let stored = store.get("abc123").unwrap();
        assert!(!stored.shared);
    }

    #[test]
    fn at_most_one_record_per_user() {
        let store = ConsentStore::new();
        store.upsert("abc123", true);
        store.upsert("abc123", false);
        store.upsert("abc123", true);
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn clear_removes_everything() {
        let store = ConsentStore::new();
        store.upsert("a", true);
        store.upsert("b", false);
        store.clear();
        assert!(store.list().is_empty());
        assert!(store.get("a").is_none());
    }

    #[test]
    fn stats_counts_decisions() {
        let store = ConsentStore::new();
        assert_eq!(store.stats().total, 0);
        assert_eq!(store.stats().percentual_aceitacao, 0.0);

        store.upsert("a", true);
        store.upsert("b", true);
        store.upsert("c", false);
        store.upsert("d", false);

        let stats = store.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.aceitaram, 2);
        assert_eq!(stats.recusaram, 2);
        assert_eq!(stats.percentual_aceitacao, 50.0);
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let store = ConsentStore::new();
        let record = store.upsert("abc123", true);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["user_id"], "abc123");
        assert_eq!(json["compartilhou_fingerprint"], true);
        assert!(json.get("data_cadastro").is_some());
        assert!(json.get("data_atualizacao").is_none());

        let updated = store.upsert("abc123", false);
        let json = serde_json::to_value(&updated).unwrap();
        assert!(json.get("data_atualizacao").is_some());
    }
}
