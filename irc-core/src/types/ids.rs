//! Fixed-width identifiers used as cache keys.
//!
//! - [`NftId`]: identifies one NFT output chain (32 bytes)
//! - [`FoundryId`]: identifies the foundry that minted a native token (38 bytes)
//!
//! Both render and parse as `0x`-prefixed lowercase hex, which is also the
//! form the node APIs expect in their paths.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::constants::{FOUNDRY_ID_LENGTH, NFT_ID_LENGTH};
use crate::error::ParameterError;

/// Reasons an identifier string is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IdParseError {
    /// The value was empty.
    #[error("value is empty")]
    Empty,

    /// The value lacks the `0x` prefix.
    #[error("missing 0x prefix")]
    MissingPrefix,

    /// The value is not valid hex.
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    /// The decoded value has the wrong width.
    #[error("expected {expected} bytes, got {actual}")]
    Length {
        /// Required width in bytes.
        expected: usize,
        /// Decoded width in bytes.
        actual: usize,
    },
}

fn decode_prefixed<const N: usize>(s: &str) -> Result<[u8; N], IdParseError> {
    if s.is_empty() {
        return Err(IdParseError::Empty);
    }
    let digits = s.strip_prefix("0x").ok_or(IdParseError::MissingPrefix)?;

    let bytes = hex::decode(digits)?;
    if bytes.len() != N {
        return Err(IdParseError::Length {
            expected: N,
            actual: bytes.len(),
        });
    }

    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

macro_rules! fixed_id {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Width of the identifier in bytes.
            pub const LENGTH: usize = $len;

            /// Creates an identifier from a fixed-size array.
            pub const fn from_array(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Returns the raw bytes.
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            /// Returns the `0x`-prefixed hex form.
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            /// Parses the value of the path parameter `name`.
            pub fn parse_param(name: &str, raw: &str) -> Result<Self, ParameterError> {
                raw.parse()
                    .map_err(|e: IdParseError| ParameterError::new(name, e.to_string()))
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_prefixed::<$len>(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }
    };
}

fixed_id!(
    /// Identifier of an NFT.
    NftId,
    NFT_ID_LENGTH
);

fixed_id!(
    /// Identifier of a foundry, and thereby of the native token it controls.
    FoundryId,
    FOUNDRY_ID_LENGTH
);
