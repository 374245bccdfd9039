#![forbid(unsafe_code)]

use insigne_contracts::insigne::{AccessToken, ACCESS_TOKEN_BYTES};
use rand::RngCore;

/// Mints a fresh owner-facing bearer credential: `ACCESS_TOKEN_BYTES` of OS
/// randomness, lowercase hex. Minted exactly once per record at creation.
pub fn mint_access_token() -> AccessToken {
    let mut bytes = [0u8; ACCESS_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut hex = String::with_capacity(ACCESS_TOKEN_BYTES * 2);
    for b in bytes {
        hex.push_str(&format!("{b:02x}"));
    }
    AccessToken::new(hex).expect("minted token is valid hex by construction")
}
