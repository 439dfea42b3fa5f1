// Opaque session identities. There is no server-side authentication:
// whoever presents a room code and an id is that participant. Appropriate
// for the in-person classroom trust model only.

use rand::distr::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

const SUFFIX_LEN: usize = 12;

fn random_suffix() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

/// Mints a fresh opaque player id (`p_` prefix).
pub fn player_id() -> String {
    format!("p_{}", random_suffix())
}

/// Mints a fresh opaque host id (`h_` prefix).
pub fn host_id() -> String {
    format!("h_{}", random_suffix())
}

/// Mints a stable unique question id.
pub fn question_id() -> String {
    Uuid::new_v4().to_string()
}
