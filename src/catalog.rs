// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Property Catalog
//!
//! Read and write flows the views run through the session's contract
//! handles: marketplace listing, the admin verification queue, owner and
//! id lookups, and the registration / verification / sale transactions.
//!
//! Inputs are validated before any network call. Reads that fail for a
//! single property are logged and skipped so one bad contract does not
//! blank a whole list. Nothing is retried.

use alloy::primitives::{Address, U256};
use tracing::{info, warn};

use crate::contracts::{FactoryHandle, PropertyHandle, TxOutcome};
use crate::error::SessionError;
use crate::property::{
    parse_address, parse_price, validate_details, ListingFilter, PropertyDraft, PropertyRecord,
};
use crate::session::WalletSession;
use crate::wallet::WalletProvider;

pub struct Catalog<W: WalletProvider> {
    session: WalletSession<W>,
}

impl<W: WalletProvider> Catalog<W> {
    pub fn new(session: WalletSession<W>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &WalletSession<W> {
        &self.session
    }

    fn factory(&self) -> Result<FactoryHandle, SessionError> {
        self.session.factory().ok_or_else(|| {
            SessionError::ContractRead("Property factory contract is not initialized".to_string())
        })
    }

    fn property(&self, contract: Address) -> Result<PropertyHandle, SessionError> {
        self.session
            .registry()
            .property(contract)
            .ok_or_else(|| SessionError::ContractRead("Failed to get property contract".to_string()))
    }

    /// Read details for each contract, skipping the zero address and
    /// contracts whose read fails.
    async fn load_records(&self, contracts: Vec<Address>) -> Vec<PropertyRecord> {
        let mut records = Vec::with_capacity(contracts.len());
        for contract in contracts {
            if contract.is_zero() {
                continue;
            }
            let handle = match self.property(contract) {
                Ok(handle) => handle,
                Err(e) => {
                    warn!(%contract, error = %e, "Skipping property");
                    continue;
                }
            };
            match handle.details().await {
                Ok(record) => records.push(record),
                Err(e) => warn!(%contract, error = %e, "Failed to read property details"),
            }
        }
        records
    }

    /// Every registered property.
    pub async fn all_properties(&self) -> Result<Vec<PropertyRecord>, SessionError> {
        let contracts = self.factory()?.all_properties().await?;
        Ok(self.load_records(contracts).await)
    }

    /// Properties shown on the marketplace.
    pub async fn marketplace(
        &self,
        filter: &ListingFilter,
    ) -> Result<Vec<PropertyRecord>, SessionError> {
        Ok(filter.apply(self.all_properties().await?))
    }

    /// Properties awaiting government verification.
    pub async fn unverified_properties(&self) -> Result<Vec<PropertyRecord>, SessionError> {
        let mut records = self.all_properties().await?;
        records.retain(|r| !r.is_verified);
        Ok(records)
    }

    /// Properties owned by `owner` (hex address).
    pub async fn properties_by_owner(
        &self,
        owner: &str,
    ) -> Result<Vec<PropertyRecord>, SessionError> {
        let owner = parse_address(owner)?;
        let factory = self.factory()?;
        let ids = factory.properties_by_owner(owner).await?;

        let mut contracts = Vec::with_capacity(ids.len());
        for id in ids {
            match factory.property_by_id(id).await {
                Ok(contract) => contracts.push(contract),
                Err(e) => warn!(%id, error = %e, "Failed to resolve property id"),
            }
        }
        Ok(self.load_records(contracts).await)
    }

    /// Properties owned by the connected account.
    pub async fn my_properties(&self) -> Result<Vec<PropertyRecord>, SessionError> {
        let account = self.session.signer()?;
        self.properties_by_owner(&account.to_string()).await
    }

    pub async fn property_by_id(&self, id: U256) -> Result<PropertyRecord, SessionError> {
        let contract = self.factory()?.property_by_id(id).await?;
        if contract.is_zero() {
            return Err(SessionError::ContractRead("Property not found".to_string()));
        }
        self.property(contract)?.details().await
    }

    /// Re-read a record after a state-changing call.
    pub async fn refresh(&self, record: &PropertyRecord) -> Result<PropertyRecord, SessionError> {
        self.property(record.contract_address)?.details().await
    }

    /// Register a new property owned by the connected account.
    pub async fn register_property(
        &self,
        address: &str,
        details: &str,
    ) -> Result<TxOutcome, SessionError> {
        let draft = PropertyDraft::new(address, details)?;
        let from = self.session.signer()?;
        let outcome = self
            .factory()?
            .create_property(from, draft.address, draft.details)
            .await?;
        info!(%from, tx_hash = %outcome.tx_hash, "Property registered");
        Ok(outcome)
    }

    /// Submit a verification. The contract alone decides whether the
    /// sender is the government account; `is_admin` is only a UI hint.
    pub async fn verify_property(&self, record: &PropertyRecord) -> Result<TxOutcome, SessionError> {
        let from = self.session.signer()?;
        if !self.session.is_admin() {
            warn!(%from, "Submitting verification from an account not resolved as admin");
        }
        let outcome = self.property(record.contract_address)?.verify(from).await?;
        info!(contract = %record.contract_address, tx_hash = %outcome.tx_hash, "Property verified");
        Ok(outcome)
    }

    /// List a property for sale at `price_eth` (decimal ETH string).
    pub async fn list_for_sale(
        &self,
        record: &PropertyRecord,
        price_eth: &str,
    ) -> Result<TxOutcome, SessionError> {
        let price = parse_price(price_eth)?;
        let from = self.session.signer()?;
        let outcome = self
            .property(record.contract_address)?
            .set_for_sale(from, price)
            .await?;
        info!(contract = %record.contract_address, %price, "Property listed for sale");
        Ok(outcome)
    }

    pub async fn remove_from_sale(&self, record: &PropertyRecord) -> Result<TxOutcome, SessionError> {
        let from = self.session.signer()?;
        self.property(record.contract_address)?
            .remove_from_sale(from)
            .await
    }

    /// Replace the free-text details. The contract only allows this before
    /// verification.
    pub async fn update_details(
        &self,
        record: &PropertyRecord,
        details: &str,
    ) -> Result<TxOutcome, SessionError> {
        let details = validate_details(details)?;
        let from = self.session.signer()?;
        self.property(record.contract_address)?
            .update_details(from, details)
            .await
    }

    /// Buy a listed property, paying its listed price.
    pub async fn buy_property(&self, record: &PropertyRecord) -> Result<TxOutcome, SessionError> {
        let from = self.session.signer()?;
        if !record.is_for_sale {
            return Err(SessionError::invalid_input("This property is not for sale"));
        }
        let outcome = self
            .property(record.contract_address)?
            .buy(from, record.price)
            .await?;
        info!(
            contract = %record.contract_address,
            buyer = %from,
            price_eth = %record.price_eth(),
            "Property purchased"
        );
        Ok(outcome)
    }
}
