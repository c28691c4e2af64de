// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-record integrity checksums.
//!
//! Every record is hashed together with a random nonce. The nonce prevents anyone holding a
//! checksum from confirming a guessed field value offline, while replicas holding the full record
//! can still recompute and compare it.
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::Timestamp;

/// Size of the random nonce mixed into every record checksum.
pub const NONCE_LEN: usize = 16;

const SEPARATOR: u8 = b'\0';

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nonce([u8; NONCE_LEN]);

impl Nonce {
    pub fn random() -> Self {
        let mut bytes = [0; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

/// Reads the first eight bytes of a SHA-256 digest as a big-endian integer.
pub fn digest_u64(messages: &[&[u8]]) -> u64 {
    let mut hasher = Sha256::new();
    for message in messages {
        hasher.update(message);
    }
    let digest = hasher.finalize();
    let mut prefix = [0; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Checksum of a versioned record.
///
/// The preimage is `nonce ‖ timestamp ‖ 0 ‖ field ‖ 0 ‖ … ‖ tombstone` where the timestamp is
/// written in decimal and the tombstone as `0` or `1`.
pub fn record_checksum(
    nonce: &Nonce,
    timestamp: Timestamp,
    fields: &[&[u8]],
    tombstone: bool,
) -> u64 {
    let timestamp = timestamp.to_string();
    let tombstone: &[u8] = if tombstone { b"1" } else { b"0" };

    let mut messages: Vec<&[u8]> = Vec::with_capacity(fields.len() * 2 + 3);
    messages.push(nonce.as_bytes());
    messages.push(timestamp.as_bytes());
    for field in fields {
        messages.push(std::slice::from_ref(&SEPARATOR));
        messages.push(field);
    }
    messages.push(std::slice::from_ref(&SEPARATOR));
    messages.push(tombstone);

    digest_u64(&messages)
}
