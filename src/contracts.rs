// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Property factory and property instance contract bindings.
//!
//! Handles are stateless dispatch adapters: cloning one is cheap and two
//! handles for the same address behave identically. Tuple-shaped responses
//! are decoded into `PropertyRecord` right here so nothing downstream
//! indexes by position.

use std::time::Duration;

use alloy::{
    contract::SolCallBuilder,
    primitives::{Address, TxHash, U256},
    providers::{DynProvider, Provider},
    sol,
    sol_types::SolCall,
};

use crate::error::SessionError;
use crate::property::PropertyRecord;
use crate::wallet::is_user_rejection;

sol! {
    #[sol(rpc)]
    interface IPropertyFactory {
        function governmentAddress() external view returns (address);
        function getAllProperties() external view returns (address[]);
        function getPropertiesByOwner(address owner) external view returns (uint256[]);
        function getPropertyById(uint256 id) external view returns (address);
        function createProperty(string propertyAddress, string details) external;
    }
}

sol! {
    #[sol(rpc)]
    interface IProperty {
        function getPropertyDetails() external view returns (
            uint256 id,
            string propertyAddress,
            string details,
            uint256 price,
            address owner,
            bool isVerified,
            bool isForSale
        );
        function verifyProperty() external;
        function setForSale(uint256 price) external;
        function removeFromSale() external;
        function updateDetails(string details) external;
        function buyProperty() external payable;
    }
}

/// Delay between receipt lookups while a transaction is pending.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Receipt lookups before a pending transaction is reported as unconfirmed.
const RECEIPT_POLL_ATTEMPTS: u32 = 90;

/// Confirmed transaction summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

/// Handle to the property factory contract.
#[derive(Clone)]
pub struct FactoryHandle {
    contract: IPropertyFactory::IPropertyFactoryInstance<DynProvider>,
}

impl FactoryHandle {
    pub fn new(address: Address, provider: DynProvider) -> Self {
        Self {
            contract: IPropertyFactory::new(address, provider),
        }
    }

    pub fn address(&self) -> Address {
        *self.contract.address()
    }

    /// Read the government (admin) address.
    pub async fn government_address(&self) -> Result<Address, SessionError> {
        self.contract
            .governmentAddress()
            .call()
            .await
            .map_err(|e| SessionError::ContractRead(e.to_string()))
    }

    /// Every property contract the factory has deployed.
    pub async fn all_properties(&self) -> Result<Vec<Address>, SessionError> {
        self.contract
            .getAllProperties()
            .call()
            .await
            .map_err(|e| SessionError::ContractRead(e.to_string()))
    }

    pub async fn properties_by_owner(&self, owner: Address) -> Result<Vec<U256>, SessionError> {
        self.contract
            .getPropertiesByOwner(owner)
            .call()
            .await
            .map_err(|e| SessionError::ContractRead(e.to_string()))
    }

    /// Resolve a property id to its contract. Unknown ids yield the zero address.
    pub async fn property_by_id(&self, id: U256) -> Result<Address, SessionError> {
        self.contract
            .getPropertyById(id)
            .call()
            .await
            .map_err(|e| SessionError::ContractRead(e.to_string()))
    }

    pub async fn create_property(
        &self,
        from: Address,
        property_address: String,
        details: String,
    ) -> Result<TxOutcome, SessionError> {
        confirm(
            self.contract.provider(),
            self.contract
                .createProperty(property_address, details)
                .from(from),
        )
        .await
    }
}

/// Handle to a single property contract.
#[derive(Clone)]
pub struct PropertyHandle {
    contract: IProperty::IPropertyInstance<DynProvider>,
}

impl PropertyHandle {
    pub fn new(address: Address, provider: DynProvider) -> Self {
        Self {
            contract: IProperty::new(address, provider),
        }
    }

    pub fn address(&self) -> Address {
        *self.contract.address()
    }

    /// Read the property's current state.
    pub async fn details(&self) -> Result<PropertyRecord, SessionError> {
        let raw = self
            .contract
            .getPropertyDetails()
            .call()
            .await
            .map_err(|e| SessionError::ContractRead(e.to_string()))?;

        Ok(PropertyRecord {
            id: raw.id,
            address: raw.propertyAddress,
            details: raw.details,
            price: raw.price,
            owner: raw.owner,
            is_verified: raw.isVerified,
            is_for_sale: raw.isForSale,
            contract_address: self.address(),
        })
    }

    /// Admin only; the contract rejects anyone else.
    pub async fn verify(&self, from: Address) -> Result<TxOutcome, SessionError> {
        confirm(self.contract.provider(), self.contract.verifyProperty().from(from)).await
    }

    pub async fn set_for_sale(&self, from: Address, price: U256) -> Result<TxOutcome, SessionError> {
        confirm(self.contract.provider(), self.contract.setForSale(price).from(from)).await
    }

    pub async fn remove_from_sale(&self, from: Address) -> Result<TxOutcome, SessionError> {
        confirm(self.contract.provider(), self.contract.removeFromSale().from(from)).await
    }

    /// Only accepted by the contract while the property is unverified.
    pub async fn update_details(
        &self,
        from: Address,
        details: String,
    ) -> Result<TxOutcome, SessionError> {
        confirm(self.contract.provider(), self.contract.updateDetails(details).from(from)).await
    }

    /// Buy the property, attaching `price` wei as payment.
    pub async fn buy(&self, from: Address, price: U256) -> Result<TxOutcome, SessionError> {
        confirm(
            self.contract.provider(),
            self.contract.buyProperty().from(from).value(price),
        )
        .await
    }
}

/// Submit a state-changing call and wait for its receipt.
async fn confirm<P, C>(
    provider: &DynProvider,
    call: SolCallBuilder<P, C>,
) -> Result<TxOutcome, SessionError>
where
    P: Provider,
    C: SolCall,
{
    let pending = call.send().await.map_err(|e| match e {
        alloy::contract::Error::TransportError(ref rpc) if is_user_rejection(rpc) => {
            SessionError::AuthorizationRejected(rpc.to_string())
        }
        other => SessionError::ContractWrite(other.to_string()),
    })?;

    let tx_hash = *pending.tx_hash();
    tracing::info!(%tx_hash, method = C::SIGNATURE, "Transaction submitted");

    wait_for_receipt(provider, tx_hash, RECEIPT_POLL_INTERVAL).await
}

/// Poll for the receipt of `tx_hash`; a reverted receipt is an error.
async fn wait_for_receipt(
    provider: &DynProvider,
    tx_hash: TxHash,
    interval: Duration,
) -> Result<TxOutcome, SessionError> {
    for attempt in 0..RECEIPT_POLL_ATTEMPTS {
        if attempt > 0 {
            tokio::time::sleep(interval).await;
        }

        let receipt = provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| SessionError::ContractWrite(format!("Failed to get receipt: {e}")))?;

        let Some(receipt) = receipt else {
            continue;
        };

        if !receipt.status() {
            tracing::warn!(%tx_hash, "Transaction reverted");
            return Err(SessionError::ContractWrite(format!(
                "Transaction {tx_hash} reverted"
            )));
        }

        return Ok(TxOutcome {
            tx_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        });
    }

    Err(SessionError::ContractWrite(format!(
        "Transaction {tx_hash} not confirmed after {RECEIPT_POLL_ATTEMPTS} receipt lookups"
    )))
}
