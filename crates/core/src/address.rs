//! Account addresses and their user-friendly IBAN-style representation.
//!
//! The user-friendly form is `NQ` followed by two mod-97 check digits and the
//! 32-character base32 encoding of the 20 address bytes, split into groups of
//! four characters.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::{CoreError, PublicKey, Result};

/// Size of an address in bytes
pub const ADDRESS_SIZE: usize = 20;
/// Country code prefix of user-friendly addresses
pub const COUNTRY_CODE: &str = "NQ";

const BASE32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKLMNPQRSTUVXY";
const FRIENDLY_BODY_LEN: usize = 32;

/// A 20-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    /// Creates an address from raw bytes.
    pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    /// Derives the address of a public key: the first 20 bytes of its SHA-256.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let digest = Sha256::digest(public_key.as_bytes());
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(&digest[..ADDRESS_SIZE]);
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// Parses the user-friendly form. Spaces and letter case are ignored.
    pub fn from_user_friendly(input: &str) -> Result<Self> {
        let normalized: String = input
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();

        if normalized.len() != COUNTRY_CODE.len() + 2 + FRIENDLY_BODY_LEN
            || !normalized.is_ascii()
        {
            return Err(CoreError::InvalidAddress(input.to_string()));
        }
        if &normalized[..2] != COUNTRY_CODE {
            return Err(CoreError::InvalidAddress(input.to_string()));
        }

        let rotated = format!("{}{}", &normalized[4..], &normalized[..4]);
        if iban_check(&rotated)? != 1 {
            return Err(CoreError::InvalidChecksum(input.to_string()));
        }

        let bytes = base32_decode(&normalized[4..])
            .ok_or_else(|| CoreError::InvalidAddress(input.to_string()))?;
        let bytes: [u8; ADDRESS_SIZE] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CoreError::InvalidAddress(input.to_string()))?;
        Ok(Self(bytes))
    }

    /// Renders the user-friendly form, grouped in blocks of four characters.
    pub fn to_user_friendly(&self) -> String {
        let body = base32_encode(&self.0);
        // The body only contains alphabet characters, so the check cannot fail.
        let remainder = iban_check(&format!("{}{}00", body, COUNTRY_CODE)).unwrap_or(0);
        let raw = format!("{}{:02}{}", COUNTRY_CODE, 98 - remainder, body);

        raw.as_bytes()
            .chunks(4)
            .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_user_friendly())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_user_friendly())
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_user_friendly(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_user_friendly())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Mod-97 remainder of the IBAN digit expansion of `input` (A=10 .. Z=35).
fn iban_check(input: &str) -> Result<u32> {
    let mut remainder = 0u32;
    for c in input.chars() {
        let value = match c {
            '0'..='9' => c as u32 - '0' as u32,
            'A'..='Z' => c as u32 - 'A' as u32 + 10,
            _ => return Err(CoreError::InvalidAddress(input.to_string())),
        };
        remainder = if value >= 10 {
            (remainder * 100 + value) % 97
        } else {
            (remainder * 10 + value) % 97
        };
    }
    Ok(remainder)
}

fn base32_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer = 0u32;
    let mut bits = 0u32;
    for &byte in bytes {
        buffer = (buffer << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
        buffer &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

fn base32_decode(input: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() * 5 / 8);
    let mut buffer = 0u32;
    let mut bits = 0u32;
    for c in input.bytes() {
        let value = BASE32_ALPHABET.iter().position(|&a| a == c)? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
        buffer &= (1 << bits) - 1;
    }
    Some(out)
}
