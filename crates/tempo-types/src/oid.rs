use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

/// Opaque, globally-unique identifier for a persistent object.
///
/// An `Oid` is a 128-bit random value, immutable once assigned. Equality is
/// by value. The all-zero value is a distinguished "unset" sentinel
/// ([`Oid::nil`]) that [`Oid::random`] never returns.
///
/// The canonical text form is the fixed-length lowercase hyphenated
/// hexadecimal form (36 characters, `8-4-4-4-12` groups), and
/// `parse`/`to_string` round-trip losslessly through it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Oid(Uuid);

impl Oid {
    /// Generate a fresh random `Oid`.
    ///
    /// Never returns the nil sentinel: the astronomically rare all-zero
    /// draw is retried.
    pub fn random() -> Self {
        loop {
            let candidate = Uuid::new_v4();
            if !candidate.is_nil() {
                return Self(candidate);
            }
        }
    }

    /// The nil sentinel (all zeros). Represents "no object".
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Returns `true` if this is the nil sentinel.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// The raw 16-byte value.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Create from a raw 16-byte value. Use `random()` for production code.
    pub fn from_raw(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Canonical 36-character hyphenated-hex form.
    pub fn to_canonical(&self) -> String {
        self.0.hyphenated().to_string()
    }

    /// Short identifier (first 8 hex characters) for logs and Debug output.
    pub fn short_id(&self) -> String {
        self.to_canonical()[..8].to_string()
    }

    /// Parse from the canonical hyphenated-hex form.
    ///
    /// Accepts upper- or lowercase hex digits. Fails with
    /// [`TypeError::Parse`] carrying the byte offset of the first offending
    /// character.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        const CANONICAL_LEN: usize = 36;
        const HYPHENS: [usize; 4] = [8, 13, 18, 23];

        let bytes = s.as_bytes();
        let mut value: u128 = 0;
        for (offset, &b) in bytes.iter().enumerate() {
            if offset >= CANONICAL_LEN {
                return Err(TypeError::parse(s, offset, "trailing characters"));
            }
            if HYPHENS.contains(&offset) {
                if b != b'-' {
                    return Err(TypeError::parse(s, offset, "expected '-'"));
                }
                continue;
            }
            let digit = match b {
                b'0'..=b'9' => b - b'0',
                b'a'..=b'f' => b - b'a' + 10,
                b'A'..=b'F' => b - b'A' + 10,
                _ => return Err(TypeError::parse(s, offset, "expected hex digit")),
            };
            value = (value << 4) | u128::from(digit);
        }
        if bytes.len() < CANONICAL_LEN {
            return Err(TypeError::parse(
                s,
                bytes.len(),
                "input truncated: expected 36 characters",
            ));
        }
        Ok(Self(Uuid::from_u128(value)))
    }
}

impl FromStr for Oid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.short_id())
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical())
    }
}
