// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults and the `SessionConfig` loaded from
//! them at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `PROPERTY_FACTORY_ADDRESS` | Deployed property factory contract | Required |
//! | `FALLBACK_RPC_URL` | Public RPC used when no wallet is present | Sepolia public RPC |
//! | `GOVERNMENT_ADDRESS` | Expected admin address (informational only) | Optional |
//! | `WALLET_RPC_URL` | JSON-RPC wallet endpoint (binary only) | Optional |
//! | `WALLET_PRIVATE_KEY` | Hex signer key for a local wallet (binary only) | Optional |
//! | `WALLET_KEY_PEM` | Path to a PEM signer key (binary only) | Optional |
//! | `WALLET_POLL_INTERVAL_MS` | Account/chain poll interval for `WALLET_RPC_URL` (binary only) | `4000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::str::FromStr;

use alloy::primitives::Address;

use crate::error::SessionError;

/// Environment variable name for the property factory contract address.
pub const FACTORY_ADDRESS_ENV: &str = "PROPERTY_FACTORY_ADDRESS";

/// Environment variable name for the read-only fallback RPC endpoint.
pub const FALLBACK_RPC_URL_ENV: &str = "FALLBACK_RPC_URL";

/// Environment variable name for the expected government address.
///
/// Never trusted for authorization. The live value read from the factory
/// is authoritative; a mismatch is only logged.
pub const GOVERNMENT_ADDRESS_ENV: &str = "GOVERNMENT_ADDRESS";

pub const WALLET_RPC_URL_ENV: &str = "WALLET_RPC_URL";
pub const WALLET_PRIVATE_KEY_ENV: &str = "WALLET_PRIVATE_KEY";
pub const WALLET_KEY_PEM_ENV: &str = "WALLET_KEY_PEM";
pub const WALLET_POLL_INTERVAL_MS_ENV: &str = "WALLET_POLL_INTERVAL_MS";

/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Public Sepolia endpoint used when `FALLBACK_RPC_URL` is unset.
pub const DEFAULT_FALLBACK_RPC_URL: &str = "https://ethereum-sepolia-rpc.publicnode.com";

/// Configuration consumed by `WalletSession` at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub factory_address: Address,
    pub fallback_rpc_url: String,
    pub expected_admin: Option<Address>,
}

impl SessionConfig {
    pub fn new(factory_address: Address, fallback_rpc_url: impl Into<String>) -> Self {
        Self {
            factory_address,
            fallback_rpc_url: fallback_rpc_url.into(),
            expected_admin: None,
        }
    }

    pub fn with_expected_admin(mut self, admin: Address) -> Self {
        self.expected_admin = Some(admin);
        self
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, SessionError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SessionError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_factory = lookup(FACTORY_ADDRESS_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                SessionError::invalid_input(format!("{FACTORY_ADDRESS_ENV} is required"))
            })?;
        let factory_address = Address::from_str(raw_factory.trim())
            .map_err(|e| SessionError::InvalidAddress(format!("{FACTORY_ADDRESS_ENV}: {e}")))?;

        let fallback_rpc_url = lookup(FALLBACK_RPC_URL_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_FALLBACK_RPC_URL.to_string());

        let expected_admin = match lookup(GOVERNMENT_ADDRESS_ENV).filter(|v| !v.trim().is_empty()) {
            Some(raw) => Some(Address::from_str(raw.trim()).map_err(|e| {
                SessionError::InvalidAddress(format!("{GOVERNMENT_ADDRESS_ENV}: {e}"))
            })?),
            None => None,
        };

        let config = Self::new(factory_address, fallback_rpc_url);
        Ok(match expected_admin {
            Some(admin) => config.with_expected_admin(admin),
            None => config,
        })
    }
}
