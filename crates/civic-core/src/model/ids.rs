//! Random identifiers for issues and admin notes.

use rand::Rng;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Prefix shared by every issue id.
pub const ISSUE_ID_PREFIX: &str = "iss-";

const ISSUE_SUFFIX_LEN: usize = 8;
const NOTE_ID_LEN: usize = 9;

fn base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
        .collect()
}

/// Generate a fresh issue id such as `iss-k3x9q0ab`.
#[must_use]
pub fn new_issue_id() -> String {
    format!("{ISSUE_ID_PREFIX}{}", base36(ISSUE_SUFFIX_LEN))
}

/// Generate a fresh admin note id (nine base-36 characters).
#[must_use]
pub fn new_note_id() -> String {
    base36(NOTE_ID_LEN)
}
