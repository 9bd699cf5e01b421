//! # Field Elements (FieldCodec)
//!
//! [`FieldElement`] wraps an element of the BN254 scalar field, the native
//! data type of the proving circuit. Every constructor reduces modulo the
//! field order `r`, so no unreduced integer can reach a tree node or a
//! witness.
//!
//! ## Encodings
//!
//! - **Canonical text**: decimal digits (or `0x` hex) of a value below `r`.
//!   This is the only form accepted by [`FieldElement::parse`] and by the
//!   serde implementation.
//! - **Caller strings**: [`FieldElement::encode_str`] maps any string onto
//!   the field. Numeric strings keep their value (reduced mod `r`); every
//!   other string is hashed with SHA-256 and the digest is reduced.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use ark_bn254::Fr;
use ark_ff::{BigInteger, One, PrimeField, Zero};
use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::digest::sha256_raw;
use crate::error::FieldError;

/// An element of the BN254 scalar field.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FieldElement(Fr);

/// The scalar field order `r` as an arbitrary-precision integer.
pub fn modulus() -> &'static BigUint {
    static MODULUS: OnceLock<BigUint> = OnceLock::new();
    MODULUS.get_or_init(|| BigUint::from_bytes_be(&Fr::MODULUS.to_bytes_be()))
}

impl FieldElement {
    /// The additive identity.
    pub fn zero() -> Self {
        Self(Fr::zero())
    }

    /// The multiplicative identity.
    pub fn one() -> Self {
        Self(Fr::one())
    }

    /// Embed a native integer.
    pub fn from_u64(value: u64) -> Self {
        Self(Fr::from(value))
    }

    /// Embed a boolean as `0` or `1`.
    pub fn from_bool(value: bool) -> Self {
        Self::from_u64(u64::from(value))
    }

    /// Interpret big-endian bytes as an integer and reduce it modulo `r`.
    pub fn from_bytes_be_mod_order(bytes: &[u8]) -> Self {
        Self(Fr::from_be_bytes_mod_order(bytes))
    }

    /// Reduce an arbitrary-precision integer modulo `r`.
    pub fn from_biguint(value: &BigUint) -> Self {
        Self::from_bytes_be_mod_order(&value.to_bytes_be())
    }

    /// Strictly parse the canonical textual encoding.
    ///
    /// Accepts decimal digits or `0x`-prefixed hex. Rejects values that are
    /// not below the modulus, so a parsed element always re-serializes to
    /// the same integer.
    pub fn parse(s: &str) -> Result<Self, FieldError> {
        if s.is_empty() {
            return Err(FieldError::Empty);
        }
        let value = parse_integer(s).ok_or_else(|| FieldError::InvalidDigits(s.to_string()))?;
        if &value >= modulus() {
            return Err(FieldError::OutOfRange(s.to_string()));
        }
        Ok(Self::from_biguint(&value))
    }

    /// Map an arbitrary caller-supplied string onto the field.
    ///
    /// Numeric strings (decimal or `0x` hex) are reduced modulo `r`. Any
    /// other string becomes `SHA-256(utf8(s)) mod r`. Total: never fails.
    pub fn encode_str(s: &str) -> Self {
        match parse_integer(s) {
            Some(value) => Self::from_biguint(&value),
            None => Self::from_bytes_be_mod_order(&sha256_raw(s.as_bytes())),
        }
    }

    /// The canonical decimal representation.
    pub fn to_decimal(&self) -> String {
        self.to_biguint().to_string()
    }

    /// The value as an arbitrary-precision integer in `[0, r)`.
    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0.into_bigint().to_bytes_be())
    }

    /// Fixed-width 32-byte big-endian encoding.
    pub fn to_bytes_be(&self) -> [u8; 32] {
        let bytes = self.0.into_bigint().to_bytes_be();
        let mut out = [0u8; 32];
        out[32 - bytes.len()..].copy_from_slice(&bytes);
        out
    }

    /// The value as a native integer, if it fits.
    pub fn to_u64(&self) -> Option<u64> {
        u64::try_from(&self.to_biguint()).ok()
    }

    /// `Some(false)` for `0`, `Some(true)` for `1`, `None` otherwise.
    pub fn to_bool(&self) -> Option<bool> {
        if self.0.is_zero() {
            Some(false)
        } else if self.0.is_one() {
            Some(true)
        } else {
            None
        }
    }

    /// Whether this is the additive identity.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The underlying arkworks field element.
    pub fn inner(&self) -> Fr {
        self.0
    }
}

/// Decimal or `0x`-hex digits to an integer, without range checks.
fn parse_integer(s: &str) -> Option<BigUint> {
    let (digits, radix) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (s, 10),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    BigUint::parse_bytes(digits.as_bytes(), radix)
}

impl From<Fr> for FieldElement {
    fn from(value: Fr) -> Self {
        Self(value)
    }
}

impl From<FieldElement> for Fr {
    fn from(value: FieldElement) -> Self {
        value.0
    }
}

impl FromStr for FieldElement {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal())
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self.to_decimal())
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
