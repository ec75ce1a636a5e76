// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Contract handle registry.
//!
//! Holds the provider the session currently talks through, the factory
//! handle bound to it and a memo of per-property handles keyed by contract
//! address. Installing a new provider drops every handle built on the old
//! one.

use std::sync::Mutex;

use alloy::{primitives::Address, providers::DynProvider};
use lru::LruCache;

use crate::contracts::{FactoryHandle, PropertyHandle};

/// Provider plus every handle built on it. Guarded by one lock so a handle
/// can never outlive the provider it was built on.
struct Bindings {
    provider: Option<DynProvider>,
    factory: Option<FactoryHandle>,
    instances: LruCache<Address, PropertyHandle>,
}

impl Bindings {
    fn rebind(&mut self, provider: Option<DynProvider>) {
        self.provider = provider;
        self.factory = None;
        self.instances.clear();
    }
}

pub struct ContractRegistry {
    factory_address: Address,
    bindings: Mutex<Bindings>,
}

impl ContractRegistry {
    pub fn new(factory_address: Address) -> Self {
        Self {
            factory_address,
            bindings: Mutex::new(Bindings {
                provider: None,
                factory: None,
                instances: LruCache::unbounded(),
            }),
        }
    }

    /// Replace the active provider and drop all handles bound to the old one.
    pub fn install_provider(&self, provider: DynProvider) {
        if let Ok(mut bindings) = self.bindings.lock() {
            bindings.rebind(Some(provider));
        }
    }

    /// Forget the provider and every handle (network switch).
    pub fn invalidate(&self) {
        if let Ok(mut bindings) = self.bindings.lock() {
            bindings.rebind(None);
        }
    }

    pub fn has_provider(&self) -> bool {
        self.bindings
            .lock()
            .map(|b| b.provider.is_some())
            .unwrap_or(false)
    }

    /// Build a fresh factory handle on the current provider.
    pub fn refresh_factory(&self) -> Option<FactoryHandle> {
        let mut bindings = self.bindings.lock().ok()?;
        let handle = FactoryHandle::new(self.factory_address, bindings.provider.clone()?);
        bindings.factory = Some(handle.clone());
        Some(handle)
    }

    /// Current factory handle, created on first use.
    pub fn factory(&self) -> Option<FactoryHandle> {
        let mut bindings = self.bindings.lock().ok()?;
        if let Some(factory) = &bindings.factory {
            return Some(factory.clone());
        }
        let handle = FactoryHandle::new(self.factory_address, bindings.provider.clone()?);
        bindings.factory = Some(handle.clone());
        Some(handle)
    }

    /// Handle for the property contract at `address`, memoized per address.
    pub fn property(&self, address: Address) -> Option<PropertyHandle> {
        let mut bindings = self.bindings.lock().ok()?;
        if let Some(handle) = bindings.instances.get(&address) {
            return Some(handle.clone());
        }
        let handle = PropertyHandle::new(address, bindings.provider.clone()?);
        bindings.instances.put(address, handle.clone());
        Some(handle)
    }

    pub fn cached_instances(&self) -> usize {
        self.bindings
            .lock()
            .map(|b| b.instances.len())
            .unwrap_or(0)
    }
}
