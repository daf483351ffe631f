//! Random join and invite codes.
//!
//! Each symbol is drawn from one random byte reduced modulo the alphabet size.
//! The generators are pure functions of the random source so they can be driven
//! by a fixed source in tests.

use rand::RngCore;

pub const JOIN_CODE_LENGTH: usize = 6;
pub const INVITE_CODE_MIN_LENGTH: usize = 6;
pub const INVITE_CODE_MAX_LENGTH: usize = 10;

const JOIN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const INVITE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-";

/// No usable code was found within the attempt budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no unique code after {attempts} attempt(s)")]
pub struct Exhausted {
    pub attempts: u32,
}

/// Six symbols from `A-Z0-9`
pub fn join_code<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; JOIN_CODE_LENGTH];
    rng.fill_bytes(&mut bytes);
    encode(&bytes, JOIN_ALPHABET)
}

/// Six to ten symbols from `A-Z0-9-`, the length drawn per call
pub fn invite_code<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut length_byte = [0u8; 1];
    rng.fill_bytes(&mut length_byte);
    let span = INVITE_CODE_MAX_LENGTH - INVITE_CODE_MIN_LENGTH + 1;
    let length = INVITE_CODE_MIN_LENGTH + usize::from(length_byte[0]) % span;

    let mut bytes = vec![0u8; length];
    rng.fill_bytes(&mut bytes);
    encode(&bytes, INVITE_ALPHABET)
}

/// Normalise user input before looking up a join code
pub fn normalize_join_code(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

fn encode(bytes: &[u8], alphabet: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| alphabet[usize::from(*byte) % alphabet.len()] as char)
        .collect()
}
