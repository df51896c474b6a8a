//! In-memory credential store, seeded once at process start.

use rand::Rng;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Salt byte length for password hashing.
const SALT_BYTES: usize = 16;

/// Number of SHA-256 iterations for password stretching.
const HASH_ITERATIONS: u32 = 100_000;

/// Salt used for the dummy comparison on unknown-user lookups.
const DUMMY_SALT: &str = "0000000000000000";

/// Users provisioned at startup. Demo credentials from the original
/// deployment; replaced per environment in real use.
const SEED_USERS: &[(&str, &str, &str)] = &[
    ("abc123", "minhaSenhaSegura", "Usuário Teste 1"),
    ("def456", "outraSenha123", "Usuário Teste 2"),
    ("ghi789", "senhaTeste456", "Usuário Teste 3"),
];

/// A provisioned user. The hash and salt never leave this module.
#[derive(Debug)]
struct UserCredential {
    user_id: String,
    password_hash: String,
    salt: String,
    display_name: String,
}

/// Outward view of a verified credential. No hash material.
#[derive(Debug, Clone)]
pub struct CredentialView {
    pub user_id: String,
    pub display_name: String,
}

/// Fixed set of provisioned users. Read-only after construction, so the map
/// needs no lock.
#[derive(Debug)]
pub struct CredentialStore {
    users: HashMap<String, UserCredential>,
}

impl CredentialStore {
    /// Build a store from `(user_id, password, display_name)` triples. Each
    /// password is hashed with a fresh random salt.
    pub fn from_seed(seed: &[(&str, &str, &str)]) -> Self {
        let mut users = HashMap::with_capacity(seed.len());
        for (user_id, password, display_name) in seed {
            let salt = generate_salt();
            let password_hash = hash_password(password, &salt);
            users.insert(
                (*user_id).to_owned(),
                UserCredential {
                    user_id: (*user_id).to_owned(),
                    password_hash,
                    salt,
                    display_name: (*display_name).to_owned(),
                },
            );
        }
        tracing::info!(count = users.len(), "credential store seeded");
        Self { users }
    }

    /// Store with the demo users from the original deployment.
    pub fn with_demo_users() -> Self {
        Self::from_seed(SEED_USERS)
    }

    /// Verify a `(user_id, password)` pair.
    ///
    /// Returns `None` both for an unknown user and for a wrong password; the
    /// unknown-user path performs a dummy hash so the two cases take
    /// comparable time.
    pub fn verify(&self, user_id: &str, password: &str) -> Option<CredentialView> {
        let Some(credential) = self.users.get(user_id) else {
            let _ = hash_password(password, DUMMY_SALT);
            return None;
        };

        let attempt_hash = hash_password(password, &credential.salt);
        if !constant_time_eq(credential.password_hash.as_bytes(), attempt_hash.as_bytes()) {
            return None;
        }

        Some(CredentialView {
            user_id: credential.user_id.clone(),
            display_name: credential.display_name.clone(),
        })
    }

    /// Number of provisioned users.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

// ── Cryptographic Helpers ───────────────────────────────────────────

/// Generate a random salt (hex-encoded).
fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a password with salt using iterated SHA-256.
fn hash_password(password: &str, salt: &str) -> String {
    let mut hash = Sha256::new();
    hash.update(salt.as_bytes());
    hash.update(password.as_bytes());
    let mut result = hash.finalize();

    // Iterated hashing for key stretching
    for _ in 1..HASH_ITERATIONS {
        let mut h = Sha256::new();
        h.update(result);
        h.update(salt.as_bytes());
        result = h.finalize();
    }

    hex::encode(result)
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

// ── Tests ───────────────────────────────────────────────────────────
