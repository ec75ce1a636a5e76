// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Property records and client-side input validation.

use std::str::FromStr;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Decimals of the native currency (ETH).
pub const ETHER_DECIMALS: u8 = 18;

/// Minimum length of the free-text property details.
pub const MIN_DETAILS_LEN: usize = 20;

/// Read projection of one property contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub id: U256,
    /// Postal address of the property (free text)
    pub address: String,
    pub details: String,
    /// Listing price in wei
    pub price: U256,
    pub owner: Address,
    pub is_verified: bool,
    pub is_for_sale: bool,
    /// Contract the record was read from
    pub contract_address: Address,
}

impl PropertyRecord {
    /// Price formatted in ETH.
    pub fn price_eth(&self) -> String {
        format_ether(self.price)
    }
}

/// Marketplace filter applied to a snapshot of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFilter {
    pub search: String,
    pub only_verified: bool,
    pub only_for_sale: bool,
}

impl Default for ListingFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            only_verified: true,
            only_for_sale: true,
        }
    }
}

impl ListingFilter {
    pub fn matches(&self, record: &PropertyRecord) -> bool {
        if self.only_verified && !record.is_verified {
            return false;
        }
        if self.only_for_sale && !record.is_for_sale {
            return false;
        }
        let needle = self.search.trim().to_lowercase();
        needle.is_empty()
            || record.address.to_lowercase().contains(&needle)
            || record.details.to_lowercase().contains(&needle)
    }

    pub fn apply(&self, records: Vec<PropertyRecord>) -> Vec<PropertyRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

/// Validated input for registering or editing a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDraft {
    pub address: String,
    pub details: String,
}

impl PropertyDraft {
    pub fn new(address: &str, details: &str) -> Result<Self, SessionError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(SessionError::invalid_input("Property address is required"));
        }
        Ok(Self {
            address: address.to_string(),
            details: validate_details(details)?,
        })
    }
}

/// Validate free-text details (non-empty, at least `MIN_DETAILS_LEN` chars).
pub fn validate_details(details: &str) -> Result<String, SessionError> {
    let details = details.trim();
    if details.is_empty() {
        return Err(SessionError::invalid_input("Property details are required"));
    }
    if details.chars().count() < MIN_DETAILS_LEN {
        return Err(SessionError::invalid_input(format!(
            "Property details must be at least {MIN_DETAILS_LEN} characters"
        )));
    }
    Ok(details.to_string())
}

/// Parse an address string, rejecting empty or malformed input.
pub fn parse_address(raw: &str) -> Result<Address, SessionError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SessionError::invalid_input("Address is required"));
    }
    Address::from_str(raw).map_err(|e| SessionError::InvalidAddress(format!("{raw}: {e}")))
}

/// Parse a listing price in ETH into wei. The price must be strictly positive.
pub fn parse_price(price_eth: &str) -> Result<U256, SessionError> {
    let wei = parse_ether(price_eth)?;
    if wei.is_zero() {
        return Err(SessionError::invalid_input("Price must be greater than zero"));
    }
    Ok(wei)
}

/// Parse a human-readable ETH amount (e.g. "1.5") to wei.
pub fn parse_ether(amount: &str) -> Result<U256, SessionError> {
    let amount = amount.trim();
    let parts: Vec<&str> = amount.split('.').collect();

    if amount.is_empty() || parts.len() > 2 {
        return Err(SessionError::invalid_input("Invalid amount format"));
    }

    let whole_str = if parts[0].is_empty() { "0" } else { parts[0] };
    if !whole_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(SessionError::invalid_input("Price must be a number"));
    }
    let whole = U256::from_str(whole_str)
        .map_err(|_| SessionError::invalid_input("Invalid whole number"))?;

    let decimal_part = if parts.len() == 2 {
        let dec_str = parts[1];
        if !dec_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(SessionError::invalid_input("Price must be a number"));
        }
        if dec_str.len() > ETHER_DECIMALS as usize {
            return Err(SessionError::invalid_input(format!(
                "Too many decimal places (max {ETHER_DECIMALS})"
            )));
        }
        let padded = format!("{:0<width$}", dec_str, width = ETHER_DECIMALS as usize);
        U256::from_str(&padded).map_err(|_| SessionError::invalid_input("Invalid decimal"))?
    } else {
        U256::ZERO
    };

    let multiplier = U256::from(10u64).pow(U256::from(ETHER_DECIMALS));
    whole
        .checked_mul(multiplier)
        .and_then(|w| w.checked_add(decimal_part))
        .ok_or_else(|| SessionError::invalid_input("Amount overflow"))
}

/// Format wei as a human-readable ETH amount.
pub fn format_ether(amount: U256) -> String {
    if amount.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(ETHER_DECIMALS));
    let whole = amount / divisor;
    let remainder = amount % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let decimal_str = format!("{:0>width$}", remainder, width = ETHER_DECIMALS as usize);
        format!("{}.{}", whole, decimal_str.trim_end_matches('0'))
    }
}

/// Shorten an address for display: `0x1234...abcd`.
pub fn short_address(address: &Address) -> String {
    let full = address.to_string();
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
