//! Short random identifiers for matches and players. UDP sessions have no
//! inherent socket id the way a WebSocket connection would, so the gateway
//! mints one per `joinQueue` and derives the player's stable match-scoped id
//! from it exactly the way the source system does.

use rand::distributions::Alphanumeric;
use rand::Rng;

const BASE36: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char).collect()
}

pub fn generate_match_id() -> String {
    format!("match-{}", random_base36(6))
}

pub fn generate_session_token() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(8).map(char::from).collect()
}

/// `playerMatchId = socketId[:-4] + matchId[-3:]`. Collisions are possible
/// and are treated by the caller as "player already present" rather than an
/// error (see spec open question on identity derivation).
pub fn derive_player_match_id(session_token: &str, match_id: &str) -> String {
    let token_prefix_len = session_token.len().saturating_sub(4);
    let token_prefix = &session_token[..token_prefix_len];
    let suffix_start = match_id.len().saturating_sub(3);
    let match_suffix = &match_id[suffix_start..];
    format!("{token_prefix}{match_suffix}")
}
