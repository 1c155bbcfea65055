//! Opaque byte payloads carried by chains and entries.
//!
//! Both external ids and content are arbitrary bytes on the ledger. On the
//! wire they travel as standard base64 strings.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

macro_rules! byte_payload {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Vec<u8>);

        impl $name {
            pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
                Self(bytes.into())
            }

            /// Decode from a standard base64 string.
            pub fn from_base64(s: &str) -> Result<Self, TypeError> {
                STANDARD
                    .decode(s)
                    .map(Self)
                    .map_err(|e| TypeError::InvalidBase64(e.to_string()))
            }

            pub fn to_base64(&self) -> String {
                STANDARD.encode(&self.0)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn len(&self) -> usize {
                self.0.len()
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            pub fn into_inner(self) -> Vec<u8> {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match std::str::from_utf8(&self.0) {
                    Ok(text) => write!(f, "{}({text:?})", stringify!($name)),
                    Err(_) => write!(f, "{}(0x{})", stringify!($name), hex::encode(&self.0)),
                }
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.as_bytes().to_vec())
            }
        }

        impl From<Vec<u8>> for $name {
            fn from(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_base64())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_base64(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

byte_payload!(
    /// An external identifier: a client-supplied tag used for indexing and
    /// search.
    ExtId
);

byte_payload!(
    /// Entry content.
    Content
);

/// Returns `true` if every id in `wanted` occurs in `have`.
pub fn contains_all(have: &[ExtId], wanted: &[ExtId]) -> bool {
    wanted.iter().all(|w| have.contains(w))
}
