//! Gateway message signatures
//!
//! `sign` concatenates the string form of each part and the shared CRC
//! secret with `|` and returns the lowercase hex SHA-384 digest. The same
//! function signs outgoing gateway requests and checks incoming
//! notifications.

use sha2::{Digest, Sha384};
use std::fmt::Display;
use subtle::ConstantTimeEq;

const DELIMITER: &str = "|";

pub fn sign(parts: &[&dyn Display], secret: &str) -> String {
    let mut message = parts
        .iter()
        .map(|part| part.to_string())
        .collect::<Vec<_>>()
        .join(DELIMITER);
    if !parts.is_empty() {
        message.push_str(DELIMITER);
    }
    message.push_str(secret);

    hex::encode(Sha384::digest(message.as_bytes()))
}

/// Recompute the signature and compare in constant time
pub fn verify(parts: &[&dyn Display], secret: &str, candidate: &str) -> bool {
    let expected = sign(parts, secret);
    expected.as_bytes().ct_eq(candidate.as_bytes()).into()
}
