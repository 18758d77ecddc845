//! Identifiers for accounts, assets and tiers.

use std::fmt;
use std::str::FromStr;

use crate::errors::VaultError;

/// Ledger account identifier (holders, keepers, exchanges, the vault itself)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// Deterministic id with every byte set to `byte`
    pub const fn from_byte(byte: u8) -> Self {
        Self([byte; 32])
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full 64-character lowercase hex form
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|byte| format!("{:02x}", byte)).collect()
    }
}

impl FromStr for AccountId {
    type Err = VaultError;

    /// Parse the 64-character hex form, with or without a `0x` prefix
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix("0x").unwrap_or(s);
        if hex.len() != 64 || !hex.is_ascii() {
            return Err(VaultError::InvalidParameter("account id"));
        }
        let mut bytes = [0u8; 32];
        for (i, slot) in bytes.iter_mut().enumerate() {
            *slot = u8::from_str_radix(&hex[2 * i..2 * i + 2], 16)
                .map_err(|_| VaultError::InvalidParameter("account id"))?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..4] {
            write!(f, "{:02x}", byte)?;
        }
        f.write_str("..")?;
        for byte in &self.0[28..] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self)
    }
}

/// One of the two pooled assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub enum Asset {
    /// Asset A, the asset the ratio is expressed in
    Primary,
    /// Asset B, the denominator of the ratio
    Reference,
}

impl Asset {
    pub const BOTH: [Asset; 2] = [Asset::Primary, Asset::Reference];

    /// The counterpart asset
    pub fn other(self) -> Self {
        match self {
            Asset::Primary => Asset::Reference,
            Asset::Reference => Asset::Primary,
        }
    }
}

/// Yield tier identifier in the dual-staking program
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub struct TierId(pub u8);

impl fmt::Display for TierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier-{}", self.0)
    }
}
