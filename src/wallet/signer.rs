// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local signer wallet.
//!
//! Holds one or more secp256k1 keys and signs transactions in-process.
//! Accounts become authorized on the first `request_accounts` call unless
//! the wallet is built pre-authorized. Account selection and revocation
//! are published to subscribers like an injected browser wallet would.

use std::sync::{Mutex, RwLock};

use alloy::{
    network::EthereumWallet,
    primitives::Address,
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
};
use k256::SecretKey;
use tokio::sync::broadcast;

use super::{WalletError, WalletEvent, WalletProvider, EVENT_CHANNEL_CAPACITY};

/// Create a signer from a hex private key (with or without `0x`).
pub fn signer_from_hex(private_key_hex: &str) -> Result<PrivateKeySigner, WalletError> {
    let trimmed = private_key_hex.trim();
    let key_bytes = alloy::hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))?;

    PrivateKeySigner::from_slice(&key_bytes)
        .map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))
}

/// Create a signer from a PEM-encoded key (SEC1 or PKCS#8).
pub fn signer_from_pem(pem_bytes: &[u8]) -> Result<PrivateKeySigner, WalletError> {
    let pem_str = std::str::from_utf8(pem_bytes)
        .map_err(|e| WalletError::InvalidPrivateKey(format!("Invalid UTF-8: {}", e)))?;

    let pem = pem::parse(pem_str)
        .map_err(|e| WalletError::InvalidPrivateKey(format!("Invalid PEM: {}", e)))?;

    let secret_key = SecretKey::from_sec1_der(pem.contents())
        .or_else(|_| {
            use k256::pkcs8::DecodePrivateKey;
            SecretKey::from_pkcs8_der(pem.contents())
        })
        .map_err(|e| WalletError::InvalidPrivateKey(format!("Invalid key format: {}", e)))?;

    PrivateKeySigner::from_slice(&secret_key.to_bytes())
        .map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))
}

struct Accounts {
    /// Active account first.
    order: Vec<Address>,
    authorized: bool,
}

pub struct SignerWallet {
    wallet: EthereumWallet,
    rpc_url: RwLock<url::Url>,
    provider: RwLock<DynProvider>,
    accounts: Mutex<Accounts>,
    events: broadcast::Sender<WalletEvent>,
}

impl SignerWallet {
    /// Build a wallet over `signers`; the first signer is the active account.
    pub fn new(rpc_url: &str, signers: Vec<PrivateKeySigner>) -> Result<Self, WalletError> {
        let mut signers = signers.into_iter();
        let first = signers
            .next()
            .ok_or_else(|| WalletError::InvalidPrivateKey("No signer keys supplied".to_string()))?;

        let mut order = vec![first.address()];
        let mut wallet = EthereumWallet::from(first);
        for signer in signers {
            order.push(signer.address());
            wallet.register_signer(signer);
        }

        let url = parse_url(rpc_url)?;
        let provider = build_provider(&wallet, url.clone());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            wallet,
            rpc_url: RwLock::new(url),
            provider: RwLock::new(provider),
            accounts: Mutex::new(Accounts {
                order,
                authorized: false,
            }),
            events,
        })
    }

    pub fn from_hex_keys(rpc_url: &str, keys: &[&str]) -> Result<Self, WalletError> {
        let signers = keys
            .iter()
            .map(|key| signer_from_hex(key))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(rpc_url, signers)
    }

    pub fn from_pem(rpc_url: &str, pem_bytes: &[u8]) -> Result<Self, WalletError> {
        Self::new(rpc_url, vec![signer_from_pem(pem_bytes)?])
    }

    /// Treat the accounts as already authorized (silent reconnect at startup).
    pub fn pre_authorized(self) -> Self {
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.authorized = true;
        }
        self
    }

    /// Make `account` the active account and notify subscribers.
    pub fn select_account(&self, account: Address) -> Result<(), WalletError> {
        let order = {
            let mut accounts = self
                .accounts
                .lock()
                .map_err(|_| WalletError::Rpc("account state poisoned".to_string()))?;
            let position = accounts
                .order
                .iter()
                .position(|a| *a == account)
                .ok_or_else(|| WalletError::Rpc(format!("Unknown account {account}")))?;
            let selected = accounts.order.remove(position);
            accounts.order.insert(0, selected);
            if !accounts.authorized {
                return Ok(());
            }
            accounts.order.clone()
        };

        let _ = self.events.send(WalletEvent::AccountsChanged(order));
        Ok(())
    }

    /// Revoke this application's access; subscribers see an empty account set.
    pub fn revoke(&self) {
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.authorized = false;
        }
        let _ = self.events.send(WalletEvent::AccountsChanged(Vec::new()));
    }

    /// Point the wallet at another chain's RPC endpoint and notify subscribers.
    pub fn switch_chain(&self, chain_id: u64, rpc_url: &str) -> Result<(), WalletError> {
        let url = parse_url(rpc_url)?;
        let provider = build_provider(&self.wallet, url.clone());

        if let Ok(mut current) = self.rpc_url.write() {
            *current = url;
        }
        if let Ok(mut current) = self.provider.write() {
            *current = provider;
        }

        let _ = self.events.send(WalletEvent::ChainChanged(chain_id));
        Ok(())
    }

    pub fn rpc_url(&self) -> Option<String> {
        self.rpc_url.read().ok().map(|url| url.to_string())
    }

    fn current_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let accounts = self
            .accounts
            .lock()
            .map_err(|_| WalletError::Rpc("account state poisoned".to_string()))?;
        Ok(if accounts.authorized {
            accounts.order.clone()
        } else {
            Vec::new()
        })
    }
}

impl WalletProvider for SignerWallet {
    async fn authorized_accounts(&self) -> Result<Vec<Address>, WalletError> {
        self.current_accounts()
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        if let Ok(mut accounts) = self.accounts.lock() {
            accounts.authorized = true;
        }
        self.current_accounts()
    }

    fn provider(&self) -> DynProvider {
        match self.provider.read() {
            Ok(provider) => provider.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

fn parse_url(rpc_url: &str) -> Result<url::Url, WalletError> {
    rpc_url
        .parse()
        .map_err(|e: url::ParseError| WalletError::InvalidRpcUrl(e.to_string()))
}

fn build_provider(wallet: &EthereumWallet, url: url::Url) -> DynProvider {
    ProviderBuilder::new()
        .wallet(wallet.clone())
        .connect_http(url)
        .erased()
}
