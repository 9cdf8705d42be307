//! Minimal Solidity ABI codec for the shipment registry's method surface.
//!
//! Only the types the registry uses are supported: `address`, `uint256`,
//! `string` on the way in, and `uint256[]` plus the flat
//! `(address, address, string, uint8)` tuple on the way out. Decoders never
//! trust the input: lengths, offsets, padding and UTF-8 are all checked.

use primitive_types::U256;
use sha3::{Digest, Keccak256};

use crate::error::{LedgerError, Result};
use crate::models::AccountAddress;

const WORD: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(AccountAddress),
    Uint(U256),
    String(String),
}

/// First four bytes of the Keccak-256 hash of a canonical method signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

/// Calldata for `signature` applied to `args`.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend(encode(args));
    data
}

/// Head/tail encoding of a top-level argument list.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        match token {
            Token::Address(address) => head.extend(address_word(address)),
            Token::Uint(value) => head.extend(uint_word(*value)),
            Token::String(value) => {
                head.extend(uint_word(U256::from(head_len + tail.len())));
                tail.extend(uint_word(U256::from(value.len())));
                tail.extend(padded(value.as_bytes()));
            }
        }
    }

    head.extend(tail);
    head
}

/// Decode a lone `uint256[]` return value.
pub fn decode_uint_array(data: &[u8]) -> Result<Vec<U256>> {
    let offset = read_offset(data, 0)?;
    let len = read_len(data, offset)?;
    let start = offset + WORD;

    let needed = len
        .checked_mul(WORD)
        .and_then(|n| n.checked_add(start))
        .ok_or_else(|| LedgerError::malformed("array length overflows"))?;
    if needed > data.len() {
        return Err(LedgerError::malformed(format!(
            "array of {} elements needs {} bytes, got {}",
            len,
            needed,
            data.len()
        )));
    }

    (0..len)
        .map(|i| read_word(data, start + i * WORD).map(U256::from_big_endian))
        .collect()
}

/// Decode `(address, address, string, uint8)`.
pub fn decode_shipment_fields(data: &[u8]) -> Result<(AccountAddress, AccountAddress, String, U256)> {
    let sender = read_address(data, 0)?;
    let receiver = read_address(data, WORD)?;
    let details_offset = read_offset(data, 2 * WORD)?;
    let status = U256::from_big_endian(read_word(data, 3 * WORD)?);
    let details = read_string(data, details_offset)?;

    Ok((sender, receiver, details, status))
}

/// Reason string carried by a standard `Error(string)` revert payload.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let body = data.strip_prefix(&selector("Error(string)"))?;
    let offset = read_offset(body, 0).ok()?;
    read_string(body, offset).ok()
}

fn uint_word(value: U256) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    value.to_big_endian(&mut word);
    word
}

fn address_word(address: &AccountAddress) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

fn padded(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    let rem = out.len() % WORD;
    if rem != 0 {
        out.resize(out.len() + WORD - rem, 0);
    }
    out
}

fn read_word(data: &[u8], at: usize) -> Result<&[u8]> {
    data.get(at..at + WORD).ok_or_else(|| {
        LedgerError::malformed(format!(
            "expected a word at byte {}, response is {} bytes",
            at,
            data.len()
        ))
    })
}

fn read_usize(data: &[u8], at: usize) -> Result<usize> {
    let value = U256::from_big_endian(read_word(data, at)?);
    if value.bits() > 64 {
        return Err(LedgerError::malformed(format!("value at byte {} is too large", at)));
    }
    usize::try_from(value.low_u64())
        .map_err(|_| LedgerError::malformed(format!("value at byte {} is too large", at)))
}

fn read_offset(data: &[u8], at: usize) -> Result<usize> {
    let offset = read_usize(data, at)?;
    if offset % WORD != 0 || offset >= data.len() {
        return Err(LedgerError::malformed(format!("invalid offset {} at byte {}", offset, at)));
    }
    Ok(offset)
}

fn read_len(data: &[u8], at: usize) -> Result<usize> {
    read_usize(data, at)
}

fn read_address(data: &[u8], at: usize) -> Result<AccountAddress> {
    let word = read_word(data, at)?;
    if word[..12].iter().any(|b| *b != 0) {
        return Err(LedgerError::malformed(format!("dirty address padding at byte {}", at)));
    }
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&word[12..]);
    Ok(AccountAddress::from_bytes(bytes))
}

fn read_string(data: &[u8], offset: usize) -> Result<String> {
    let len = read_len(data, offset)?;
    let start = offset + WORD;
    let bytes = start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| LedgerError::malformed(format!("string of {} bytes runs past the response", len)))?;

    String::from_utf8(bytes.to_vec()).map_err(|_| LedgerError::malformed("string is not valid UTF-8"))
}
