// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opaque participant identifiers handed to us by the cryptographic layer.
//!
//! The access-control engine never decrypts, translates or rerandomizes these values, it only
//! compares and stores them.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size of a packed local pseudonym.
pub const LOCAL_PSEUDONYM_LEN: usize = 32;

/// Participant identity as known to the Access Manager.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocalPseudonym([u8; LOCAL_PSEUDONYM_LEN]);

impl LocalPseudonym {
    /// Smallest possible value, used as a lower bound when scanning ordered indexes.
    pub const MIN: LocalPseudonym = LocalPseudonym([0; LOCAL_PSEUDONYM_LEN]);

    pub const fn from_bytes(bytes: [u8; LOCAL_PSEUDONYM_LEN]) -> Self {
        Self(bytes)
    }

    #[cfg(any(test, feature = "test_utils"))]
    pub fn random() -> Self {
        Self(rand::random())
    }

    pub fn as_bytes(&self) -> &[u8; LOCAL_PSEUDONYM_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl AsRef<[u8]> for LocalPseudonym {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for LocalPseudonym {
    type Error = PseudonymError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; LOCAL_PSEUDONYM_LEN] = value
            .try_into()
            .map_err(|_| PseudonymError::InvalidLength(value.len(), LOCAL_PSEUDONYM_LEN))?;
        Ok(Self(bytes))
    }
}

impl FromStr for LocalPseudonym {
    type Err = PseudonymError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::try_from(hex::decode(value)?.as_slice())
    }
}

impl fmt::Display for LocalPseudonym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for LocalPseudonym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LocalPseudonym").field(&self.to_hex()).finish()
    }
}

/// Encrypted participant identity which can be translated for every party in the system.
///
/// Treated as an opaque byte string here.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolymorphicPseudonym(#[serde(with = "serde_bytes")] Vec<u8>);

impl PolymorphicPseudonym {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    #[cfg(any(test, feature = "test_utils"))]
    pub fn random() -> Self {
        let bytes: [u8; 32] = rand::random();
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl AsRef<[u8]> for PolymorphicPseudonym {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for PolymorphicPseudonym {
    type Err = PseudonymError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self(hex::decode(value)?))
    }
}

impl fmt::Display for PolymorphicPseudonym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PolymorphicPseudonym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PolymorphicPseudonym")
            .field(&self.to_hex())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum PseudonymError {
    #[error("invalid pseudonym length {0} bytes, expected {1} bytes")]
    InvalidLength(usize, usize),

    #[error(transparent)]
    InvalidHexEncoding(#[from] hex::FromHexError),
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{LocalPseudonym, PolymorphicPseudonym, PseudonymError};

    #[test]
    fn hex_representation() {
        let local = LocalPseudonym::from_bytes([0xab; 32]);
        assert_eq!(local.to_string(), "ab".repeat(32));
        assert_eq!(LocalPseudonym::from_str(&local.to_string()).unwrap(), local);

        let polymorphic = PolymorphicPseudonym::from_bytes(vec![1, 2, 255]);
        assert_eq!(polymorphic.to_string(), "0102ff");
        assert_eq!(
            PolymorphicPseudonym::from_str("0102ff").unwrap(),
            polymorphic
        );
    }

    #[test]
    fn invalid_local_pseudonyms() {
        assert!(matches!(
            LocalPseudonym::from_str("abcd"),
            Err(PseudonymError::InvalidLength(2, 32))
        ));
        assert!(matches!(
            LocalPseudonym::from_str("not hex"),
            Err(PseudonymError::InvalidHexEncoding(_))
        ));
    }

    #[test]
    fn random_values_differ() {
        assert_ne!(LocalPseudonym::random(), LocalPseudonym::random());
        assert_ne!(PolymorphicPseudonym::random(), PolymorphicPseudonym::random());
        assert!(LocalPseudonym::MIN <= LocalPseudonym::random());
    }
}
