//! # Instance Factory
//!
//! Compiles one [`RegistryTemplate`] and stamps out lightweight credential
//! registries that share it. Each instance gets its own state, a unique
//! derived address, and an entry in the caller index.
//!
//! ## Addresses
//!
//! ```text
//! factory  = BLAKE3-derive("humanpass/factory",  deployer || code_hash)
//! instance = BLAKE3-derive("humanpass/instance", factory  || sequence_be)
//! ```
//!
//! The sequence is a monotonic counter, so two creations never yield the
//! same address, even from the same caller.
//!
//! ## Concurrency
//!
//! The factory is shared as `Arc<InstanceFactory>`. Indices live in
//! `DashMap`s and the sequence in an `AtomicU64`, so creations from
//! different callers never block each other. Each registry sits behind its
//! own mutex.
//!
//! Creations by one caller are serialized on that caller's index entry,
//! which is held while the sequence is drawn, the caller-supplied commit
//! hook runs, and the instance is published. A node persists in that hook:
//! if it fails, the instance is never published and the caller's previous
//! entry stays in place.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use humanpass_protocol::crypto::domain_hash;
use humanpass_protocol::identity::Address;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::cost::{self, Cost};
use crate::credential_registry::{CredentialRegistry, RegistryError, RegistryState};
use crate::template::{RegistryTemplate, TemplateDefinition, TemplateError};

const FACTORY_CONTEXT: &str = "humanpass/factory";

/// A registry instance as handed out by the factory.
pub type SharedRegistry = Arc<Mutex<CredentialRegistry>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FactoryError {
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("instance sequence exhausted")]
    SequenceExhausted,

    #[error("snapshot references unknown instance {0}")]
    UnknownInstance(Address),
}

/// Result of a successful creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceReceipt {
    pub instance: Address,
    pub creator: Address,
    pub sequence: u64,
    pub cost: Cost,
}

/// Everything needed to rebuild a factory, e.g. after a node restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorySnapshot {
    pub deployer: Address,
    pub definition: TemplateDefinition,
    pub sequence: u64,
    pub callers: Vec<(Address, Address)>,
    pub instances: Vec<(Address, RegistryState)>,
}

/// Produces credential registries that share one compiled template.
#[derive(Debug)]
pub struct InstanceFactory {
    address: Address,
    deployer: Address,
    template: Arc<RegistryTemplate>,
    sequence: AtomicU64,
    instances: DashMap<Address, SharedRegistry>,
    callers: DashMap<Address, Address>,
}

impl InstanceFactory {
    /// Compile `definition` and set up an empty factory owned by `deployer`.
    pub fn new(deployer: Address, definition: TemplateDefinition) -> Result<Self, FactoryError> {
        let template = RegistryTemplate::compile(definition)?;
        let address = Address::from_bytes(domain_hash(
            FACTORY_CONTEXT,
            &[deployer.as_bytes(), &template.code_hash()],
        ));

        info!(
            factory = %address.short(),
            deployer = %deployer.short(),
            template = %template.name(),
            code_hash = %template.code_hash_hex(),
            "instance factory deployed"
        );

        Ok(Self {
            address,
            deployer,
            template: Arc::new(template),
            sequence: AtomicU64::new(0),
            instances: DashMap::new(),
            callers: DashMap::new(),
        })
    }

    /// Create an uninitialized registry for `caller`.
    ///
    /// The new instance replaces any earlier one in the caller index.
    pub fn create_instance(&self, caller: Address) -> Result<InstanceReceipt, FactoryError> {
        self.create_committed(caller, None, |_, _| Ok::<(), FactoryError>(()))
    }

    /// Create a registry for `caller` and initialize it with `admin` and
    /// `issuer` before anyone else can reach it.
    pub fn create_and_initialize(
        &self,
        caller: Address,
        admin: Address,
        issuer: Address,
    ) -> Result<InstanceReceipt, FactoryError> {
        self.create_committed(caller, Some((admin, issuer)), |_, _| {
            Ok::<(), FactoryError>(())
        })
    }

    /// Create a registry for `caller`, optionally initialized with
    /// `(admin, issuer)`, and run `commit` on it before it is published.
    ///
    /// An error from `commit` discards the instance: it never appears in
    /// either index. Its sequence number is not reused.
    pub fn create_committed<E, F>(
        &self,
        caller: Address,
        init: Option<(Address, Address)>,
        commit: F,
    ) -> Result<InstanceReceipt, E>
    where
        E: From<FactoryError>,
        F: FnOnce(&InstanceReceipt, &RegistryState) -> Result<(), E>,
    {
        let slot = self.callers.entry(caller);
        let sequence = self.next_sequence()?;
        let instance = Address::derive_instance(&self.address, sequence);

        let mut registry = CredentialRegistry::bind(Arc::clone(&self.template), RegistryState::new());
        if let Some((admin, issuer)) = init {
            registry.initialize(admin, issuer).map_err(FactoryError::from)?;
        }
        registry.take_events();

        let receipt = InstanceReceipt {
            instance,
            creator: caller,
            sequence,
            cost: cost::instance_creation(),
        };
        if let Err(err) = commit(&receipt, registry.state()) {
            debug!(instance = %instance.short(), sequence, "instance creation rolled back");
            return Err(err);
        }

        self.instances
            .insert(instance, Arc::new(Mutex::new(registry)));
        match slot {
            Entry::Occupied(mut entry) => {
                let previous = entry.insert(instance);
                debug!(caller = %caller.short(), previous = %previous.short(), "caller index overwritten");
            }
            Entry::Vacant(entry) => {
                entry.insert(instance);
            }
        }

        info!(
            instance = %instance.short(),
            creator = %caller.short(),
            sequence,
            initialized = init.is_some(),
            cost = receipt.cost.units(),
            "registry instance created"
        );
        Ok(receipt)
    }

    fn next_sequence(&self) -> Result<u64, FactoryError> {
        self.sequence
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1))
            .map(|previous| previous + 1)
            .map_err(|_| FactoryError::SequenceExhausted)
    }

    // -- Queries ---------------------------------------------------------------

    pub fn address(&self) -> Address {
        self.address
    }

    /// The account that deployed this factory.
    pub fn deployer_address(&self) -> Address {
        self.deployer
    }

    /// Latest instance created by `caller`.
    pub fn instance_of(&self, caller: &Address) -> Option<Address> {
        self.callers.get(caller).map(|entry| *entry.value())
    }

    pub fn registry(&self, instance: &Address) -> Option<SharedRegistry> {
        self.instances
            .get(instance)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// All instance addresses, sorted.
    pub fn instances(&self) -> Vec<Address> {
        let mut out: Vec<Address> = self.instances.iter().map(|e| *e.key()).collect();
        out.sort();
        out
    }

    /// Number of creations so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    pub fn template(&self) -> &Arc<RegistryTemplate> {
        &self.template
    }

    // -- Snapshots -------------------------------------------------------------

    pub fn snapshot(&self) -> FactorySnapshot {
        let mut callers: Vec<(Address, Address)> = self
            .callers
            .iter()
            .map(|e| (*e.key(), *e.value()))
            .collect();
        callers.sort();

        let mut instances: Vec<(Address, RegistryState)> = self
            .instances
            .iter()
            .map(|e| (*e.key(), e.value().lock().state().clone()))
            .collect();
        instances.sort_by_key(|(address, _)| *address);

        FactorySnapshot {
            deployer: self.deployer,
            definition: self.template.definition().clone(),
            sequence: self.sequence(),
            callers,
            instances,
        }
    }

    /// Rebuild a factory from a snapshot. Every caller entry must point at an
    /// instance present in the snapshot.
    pub fn from_snapshot(snapshot: FactorySnapshot) -> Result<Self, FactoryError> {
        let factory = Self::new(snapshot.deployer, snapshot.definition)?;
        factory.sequence.store(snapshot.sequence, Ordering::SeqCst);

        for (address, state) in snapshot.instances {
            let registry = CredentialRegistry::bind(Arc::clone(&factory.template), state);
            factory
                .instances
                .insert(address, Arc::new(Mutex::new(registry)));
        }
        for (caller, instance) in snapshot.callers {
            if !factory.instances.contains_key(&instance) {
                return Err(FactoryError::UnknownInstance(instance));
            }
            factory.callers.insert(caller, instance);
        }

        info!(
            factory = %factory.address.short(),
            instances = factory.instance_count(),
            sequence = factory.sequence(),
            "instance factory restored"
        );
        Ok(factory)
    }
}
