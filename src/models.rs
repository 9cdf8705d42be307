use std::fmt;
use std::str::FromStr;

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// 20-byte ledger account identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountAddress([u8; 20]);

impl AccountAddress {
    pub const ZERO: AccountAddress = AccountAddress([0u8; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl FromStr for AccountAddress {
    type Err = LedgerError;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != 40 {
            return Err(LedgerError::invalid_argument(format!(
                "address {:?} must be 40 hex digits",
                value
            )));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| {
            LedgerError::invalid_argument(format!("address {:?} is not valid hex", value))
        })?;

        Ok(Self(bytes))
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl TryFrom<String> for AccountAddress {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<AccountAddress> for String {
    fn from(address: AccountAddress) -> Self {
        address.to_string()
    }
}

/// Ledger-assigned shipment identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShipmentId(U256);

impl ShipmentId {
    pub fn new(value: U256) -> Self {
        Self(value)
    }

    pub fn value(&self) -> U256 {
        self.0
    }
}

impl From<u64> for ShipmentId {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl FromStr for ShipmentId {
    type Err = LedgerError;

    fn from_str(value: &str) -> Result<Self> {
        U256::from_dec_str(value.trim())
            .map(Self)
            .map_err(|_| LedgerError::invalid_argument(format!("{:?} is not a shipment id", value)))
    }
}

impl fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ledger-defined status tag. The member set belongs to the ledger, so the
/// client only carries the raw code around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShipmentStatus(u8);

impl ShipmentStatus {
    pub fn from_code(code: u8) -> Self {
        Self(code)
    }

    pub fn code(&self) -> u8 {
        self.0
    }
}

impl TryFrom<U256> for ShipmentStatus {
    type Error = LedgerError;

    fn try_from(word: U256) -> Result<Self> {
        if word > U256::from(u8::MAX) {
            return Err(LedgerError::malformed(format!(
                "status code {} does not fit an enum tag",
                word
            )));
        }
        Ok(Self(word.low_u32() as u8))
    }
}

impl fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shipment {
    pub id: ShipmentId,
    pub sender: AccountAddress,
    pub receiver: AccountAddress,
    pub product_details: String,
    pub status: ShipmentStatus,
}

impl Shipment {
    /// Build a shipment from decoded ledger fields.
    ///
    /// A zero sender is how the registry reports an id it has never issued.
    pub fn from_ledger(
        id: ShipmentId,
        sender: AccountAddress,
        receiver: AccountAddress,
        product_details: String,
        status: ShipmentStatus,
    ) -> Result<Self> {
        if sender.is_zero() {
            return Err(LedgerError::NotFound(id.to_string()));
        }
        if receiver.is_zero() {
            return Err(LedgerError::malformed(format!(
                "shipment {} has a zero receiver",
                id
            )));
        }

        Ok(Self {
            id,
            sender,
            receiver,
            product_details,
            status,
        })
    }
}

/// Result of a successful `connect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub network_id: String,
    pub active_account: AccountAddress,
}

/// Mined transaction as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    pub block_number: Option<u64>,
    pub from: AccountAddress,
    pub gas_used: Option<u64>,
}
