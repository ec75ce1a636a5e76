// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Estate Session - wallet/session core for real-estate tokenization
//!
//! Connects to an EVM wallet, resolves whether the connected account is the
//! government (admin) account of the property factory contract, and hands
//! out typed handles to the factory and per-property contracts. Ownership,
//! verification, pricing and payment rules live in the contracts; this
//! crate only calls them.
//!
//! ## Modules
//!
//! - `session` - Connection lifecycle, admin resolution, handle registry
//! - `wallet` - Wallet provider seam (JSON-RPC and local signer wallets)
//! - `contracts` - Factory / property contract bindings
//! - `catalog` - Marketplace, admin queue and property transactions
//! - `property` - Property records and input validation

pub mod catalog;
pub mod config;
pub mod contracts;
pub mod error;
pub mod property;
pub mod session;
pub mod telemetry;
pub mod wallet;

pub use catalog::Catalog;
pub use config::SessionConfig;
pub use error::SessionError;
pub use property::{ListingFilter, PropertyRecord};
pub use session::{ConnectionState, SessionState, WalletSession};
pub use wallet::{RpcWallet, SignerWallet, WalletEvent, WalletProvider};
