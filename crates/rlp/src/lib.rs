//! # Recursive-Length Prefix (RLP) codec
//!
//! Canonical binary serialization for recursively-defined data: either a
//! byte-string or an ordered list of further RLP data. Every on-chain
//! structure (accounts, transactions, receipts, headers, trie nodes) passes
//! through this encoding, so its byte layout is consensus-critical: decoding
//! must accept any well-formed input, encoding must always produce the
//! canonical (shortest) form.
//!
//! Consolidates what used to be four near-identical copies of this logic
//! scattered across the state-management crate (inline in the trie, a
//! standalone module, a second standalone module, and inline again in the
//! account encoder) into one implementation.

use primitive_types::U256;
use thiserror::Error;

/// An RLP-encodable datum: a byte-string or a list of further data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem {
    /// A raw byte string.
    String(Vec<u8>),
    /// An ordered list of items.
    List(Vec<RlpItem>),
}

impl RlpItem {
    /// Shorthand for an empty byte string (the canonical RLP of `""`, encodes to `0x80`).
    #[must_use]
    pub fn empty_string() -> Self {
        RlpItem::String(Vec::new())
    }

    /// Borrow the item as a byte string, if it is one.
    #[must_use]
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            RlpItem::String(bytes) => Some(bytes),
            RlpItem::List(_) => None,
        }
    }

    /// Borrow the item as a list, if it is one.
    #[must_use]
    pub fn as_list(&self) -> Option<&[RlpItem]> {
        match self {
            RlpItem::List(items) => Some(items),
            RlpItem::String(_) => None,
        }
    }
}

/// Errors that can occur while decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RlpError {
    /// The input ended before a declared length could be satisfied.
    #[error("truncated RLP input: expected at least {expected} bytes, found {found}")]
    Truncated {
        /// Bytes required to complete the item.
        expected: usize,
        /// Bytes actually available.
        found: usize,
    },
    /// The input was empty where at least one byte was required.
    #[error("empty RLP input")]
    EmptyInput,
    /// A length prefix declared a length-of-length that overflows `usize`.
    #[error("RLP length prefix overflows usize")]
    LengthOverflow,
}

/// Encode an [`RlpItem`] to its canonical byte representation.
#[must_use]
pub fn encode(item: &RlpItem) -> Vec<u8> {
    match item {
        RlpItem::String(bytes) => encode_bytes(bytes),
        RlpItem::List(items) => {
            let mut payload = Vec::new();
            for child in items {
                payload.extend_from_slice(&encode(child));
            }
            encode_length(payload.len(), 0xc0, &mut payload);
            payload
        }
    }
}

/// Encode a raw byte string per the single-byte / short-string / long-string rules.
#[must_use]
pub fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    if bytes.len() == 1 && bytes[0] < 0x80 {
        return vec![bytes[0]];
    }
    let mut out = bytes.to_vec();
    encode_length(bytes.len(), 0x80, &mut out);
    out
}

/// Prepend the length prefix for a payload of `len` bytes whose short-form
/// base offset is `base` (`0x80` for strings, `0xc0` for lists).
fn encode_length(len: usize, base: u8, out: &mut Vec<u8>) {
    if len <= 55 {
        out.insert(0, base + len as u8);
        return;
    }
    let len_bytes = minimal_be_bytes(len as u128);
    let mut prefix = Vec::with_capacity(1 + len_bytes.len());
    prefix.push(base + 55 + len_bytes.len() as u8);
    prefix.extend_from_slice(&len_bytes);
    out.splice(0..0, prefix);
}

/// Shortest big-endian representation of `value`, with no leading zero byte
/// (zero itself encodes to the empty string).
fn minimal_be_bytes(value: u128) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let full = value.to_be_bytes();
    let first_nonzero = full.iter().position(|&b| b != 0).unwrap();
    full[first_nonzero..].to_vec()
}

/// Encode an unsigned integer as its minimal big-endian RLP byte-string.
#[must_use]
pub fn encode_uint(value: u64) -> Vec<u8> {
    encode_bytes(&minimal_be_bytes(u128::from(value)))
}

/// Encode a `u128` as its minimal big-endian RLP byte-string.
#[must_use]
pub fn encode_u128(value: u128) -> Vec<u8> {
    encode_bytes(&minimal_be_bytes(value))
}

/// The raw minimal big-endian bytes of `value`, unframed.
///
/// Use this (not [`encode_uint`]) when `value` is one field of a larger
/// [`RlpItem::List`] — the enclosing `encode` call supplies the framing, so
/// wrapping an already-framed [`encode_uint`] in another `RlpItem::String`
/// would frame it twice.
#[must_use]
pub fn uint_bytes(value: u64) -> Vec<u8> {
    minimal_be_bytes(u128::from(value))
}

/// The raw minimal big-endian bytes of `value`, unframed. See [`uint_bytes`].
#[must_use]
pub fn u128_bytes(value: u128) -> Vec<u8> {
    minimal_be_bytes(value)
}

/// The raw minimal big-endian bytes of `value`, unframed. See [`uint_bytes`].
#[must_use]
pub fn u256_bytes(value: &U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    match buf.iter().position(|&b| b != 0) {
        None => Vec::new(),
        Some(i) => buf[i..].to_vec(),
    }
}

/// Decode a minimal big-endian integer byte-string back into a `u128`.
#[must_use]
pub fn decode_u128(bytes: &[u8]) -> u128 {
    bytes.iter().fold(0u128, |acc, &b| (acc << 8) | u128::from(b))
}

/// Encode a [`U256`] as its minimal big-endian RLP byte-string.
#[must_use]
pub fn encode_u256(value: &U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    let first_nonzero = buf.iter().position(|&b| b != 0);
    match first_nonzero {
        None => encode_bytes(&[]),
        Some(i) => encode_bytes(&buf[i..]),
    }
}

/// Decode a minimal big-endian integer byte-string back into a `u64`.
///
/// Returns 0 for the empty string, matching RLP's zero encoding.
#[must_use]
pub fn decode_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Decode a minimal big-endian integer byte-string back into a [`U256`].
#[must_use]
pub fn decode_u256(bytes: &[u8]) -> U256 {
    U256::from_big_endian(bytes)
}

/// Decode the RLP item at the start of `input`, returning it alongside the
/// number of bytes consumed so nested decoding can proceed without an
/// explicit outer length.
pub fn decode(input: &[u8]) -> Result<(RlpItem, usize), RlpError> {
    if input.is_empty() {
        return Err(RlpError::EmptyInput);
    }
    let prefix = input[0];
    match prefix {
        0x00..=0x7f => Ok((RlpItem::String(vec![prefix]), 1)),
        0x80..=0xb7 => {
            let len = (prefix - 0x80) as usize;
            let bytes = take(input, 1, len)?;
            Ok((RlpItem::String(bytes.to_vec()), 1 + len))
        }
        0xb8..=0xbf => {
            let len_of_len = (prefix - 0xb7) as usize;
            let len_bytes = take(input, 1, len_of_len)?;
            let len = be_bytes_to_usize(len_bytes)?;
            let bytes = take(input, 1 + len_of_len, len)?;
            Ok((RlpItem::String(bytes.to_vec()), 1 + len_of_len + len))
        }
        0xc0..=0xf7 => {
            let len = (prefix - 0xc0) as usize;
            let payload = take(input, 1, len)?;
            let items = decode_list_payload(payload)?;
            Ok((RlpItem::List(items), 1 + len))
        }
        0xf8..=0xff => {
            let len_of_len = (prefix - 0xf7) as usize;
            let len_bytes = take(input, 1, len_of_len)?;
            let len = be_bytes_to_usize(len_bytes)?;
            let payload = take(input, 1 + len_of_len, len)?;
            let items = decode_list_payload(payload)?;
            Ok((RlpItem::List(items), 1 + len_of_len + len))
        }
    }
}

fn decode_list_payload(mut payload: &[u8]) -> Result<Vec<RlpItem>, RlpError> {
    let mut items = Vec::new();
    while !payload.is_empty() {
        let (item, consumed) = decode(payload)?;
        items.push(item);
        payload = &payload[consumed..];
    }
    Ok(items)
}

fn take(input: &[u8], offset: usize, len: usize) -> Result<&[u8], RlpError> {
    let end = offset
        .checked_add(len)
        .ok_or(RlpError::LengthOverflow)?;
    if end > input.len() {
        return Err(RlpError::Truncated {
            expected: end,
            found: input.len(),
        });
    }
    Ok(&input[offset..end])
}

fn be_bytes_to_usize(bytes: &[u8]) -> Result<usize, RlpError> {
    if bytes.len() > std::mem::size_of::<usize>() {
        return Err(RlpError::LengthOverflow);
    }
    Ok(bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize))
}
