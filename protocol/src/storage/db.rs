//! # PassDB: Persistent Storage
//!
//! The node's persistence layer, built on sled's embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree        | Key                    | Value                      |
//! |-------------|------------------------|----------------------------|
//! | `instances` | instance address (32B) | `bincode(T)` registry state |
//! | `callers`   | caller address (32B)   | instance address (32B)     |
//! | `nonces`    | caller address (32B)   | highest accepted nonce (u64 BE) |
//! | `metadata`  | key (UTF-8)            | value (bytes)              |
//!
//! The registry state type is opaque here (`T: Serialize`), which keeps this
//! crate free of any dependency on the contracts that define it.
//!
//! ## Atomicity
//!
//! [`PassDB::put_instance`] writes the instance state, the caller index
//! entry, and the sequence counter in one sled transaction, so a crash can
//! never leave an instance recorded without its owner or vice versa.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use tracing::{debug, info};

use crate::config::STORAGE_SCHEMA_VERSION;
use crate::identity::Address;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage schema mismatch: database has v{found}, node expects v{expected}")]
    SchemaMismatch { found: u32, expected: u32 },
}

impl From<TransactionError<DbError>> for DbError {
    fn from(e: TransactionError<DbError>) -> Self {
        match e {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(err) => DbError::Sled(err),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Metadata Keys
// ---------------------------------------------------------------------------

const META_SEQUENCE: &[u8] = b"instance_sequence";
const META_SCHEMA: &[u8] = b"schema_version";
const META_TEMPLATE: &[u8] = b"template_definition";

// ---------------------------------------------------------------------------
// PassDB
// ---------------------------------------------------------------------------

/// Persistent storage for factory instances and their registry states.
///
/// sled trees are thread-safe, so `PassDB` is shared via `Arc<PassDB>`
/// without external locking.
#[derive(Debug, Clone)]
pub struct PassDB {
    db: Db,
    instances: Tree,
    callers: Tree,
    nonces: Tree,
    metadata: Tree,
}

impl PassDB {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let instances = db.open_tree("instances")?;
        let callers = db.open_tree("callers")?;
        let nonces = db.open_tree("nonces")?;
        let metadata = db.open_tree("metadata")?;

        let store = Self {
            db,
            instances,
            callers,
            nonces,
            metadata,
        };
        store.check_schema()?;
        Ok(store)
    }

    /// Stamp a fresh database with the current schema version, or refuse to
    /// open one written by an incompatible release.
    fn check_schema(&self) -> DbResult<()> {
        match self.metadata.get(META_SCHEMA)? {
            Some(bytes) => {
                let found = u32::from_be_bytes(bytes.as_ref().try_into().map_err(|_| {
                    DbError::Serialization("invalid schema version bytes".to_string())
                })?);
                if found != STORAGE_SCHEMA_VERSION {
                    return Err(DbError::SchemaMismatch {
                        found,
                        expected: STORAGE_SCHEMA_VERSION,
                    });
                }
            }
            None => {
                self.metadata
                    .insert(META_SCHEMA, &STORAGE_SCHEMA_VERSION.to_be_bytes())?;
                info!(version = STORAGE_SCHEMA_VERSION, "stamped new database schema");
            }
        }
        Ok(())
    }

    // -- Instance operations ------------------------------------------------

    /// Record a newly created instance: its state, its creator, and the
    /// factory sequence after creation. All three land atomically.
    pub fn put_instance<T: Serialize>(
        &self,
        instance: &Address,
        creator: &Address,
        sequence: u64,
        state: &T,
    ) -> DbResult<()> {
        let bytes =
            bincode::serialize(state).map_err(|e| DbError::Serialization(e.to_string()))?;

        (&self.instances, &self.callers, &self.metadata).transaction(
            |(instances, callers, metadata)| {
                instances.insert(instance.as_bytes().as_slice(), bytes.as_slice())?;
                callers.insert(creator.as_bytes().as_slice(), instance.as_bytes().as_slice())?;
                // Concurrent creations may commit out of order; never move
                // the counter backwards.
                let stored = match metadata.get(META_SEQUENCE)? {
                    Some(bytes) => {
                        decode_u64(&bytes).map_err(ConflictableTransactionError::Abort)?
                    }
                    None => 0,
                };
                metadata.insert(META_SEQUENCE, &stored.max(sequence).to_be_bytes())?;
                Ok::<(), ConflictableTransactionError<DbError>>(())
            },
        )?;
        self.db.flush()?;
        debug!(instance = %instance.short(), creator = %creator.short(), sequence, "instance persisted");
        Ok(())
    }

    /// Overwrite the stored state of an existing instance.
    pub fn update_instance<T: Serialize>(&self, instance: &Address, state: &T) -> DbResult<()> {
        let bytes =
            bincode::serialize(state).map_err(|e| DbError::Serialization(e.to_string()))?;
        self.instances.insert(instance.as_bytes(), bytes)?;
        self.db.flush()?;
        Ok(())
    }

    /// Load the state of one instance.
    pub fn get_instance<T: DeserializeOwned>(&self, instance: &Address) -> DbResult<Option<T>> {
        match self.instances.get(instance.as_bytes())? {
            Some(bytes) => {
                let state = bincode::deserialize(&bytes)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Load every stored instance, in address order.
    pub fn load_instances<T: DeserializeOwned>(&self) -> DbResult<Vec<(Address, T)>> {
        let mut out = Vec::with_capacity(self.instances.len());
        for entry in self.instances.iter() {
            let (key, value) = entry?;
            let address = address_from_key(&key)?;
            let state =
                bincode::deserialize(&value).map_err(|e| DbError::Serialization(e.to_string()))?;
            out.push((address, state));
        }
        Ok(out)
    }

    // -- Caller index -------------------------------------------------------

    /// The latest instance created by `caller`, if any.
    pub fn get_caller_instance(&self, caller: &Address) -> DbResult<Option<Address>> {
        match self.callers.get(caller.as_bytes())? {
            Some(bytes) => Ok(Some(address_from_key(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every `(caller, instance)` pair.
    pub fn load_callers(&self) -> DbResult<Vec<(Address, Address)>> {
        let mut out = Vec::with_capacity(self.callers.len());
        for entry in self.callers.iter() {
            let (key, value) = entry?;
            out.push((address_from_key(&key)?, address_from_key(&value)?));
        }
        Ok(out)
    }

    // -- Replay protection --------------------------------------------------

    /// Remember `nonce` as accepted for `caller`. The stored value only ever
    /// grows, so a late write of an older nonce is harmless.
    pub fn record_nonce(&self, caller: &Address, nonce: u64) -> DbResult<()> {
        self.nonces.transaction(|nonces| {
            let stored = match nonces.get(caller.as_bytes())? {
                Some(bytes) => decode_u64(&bytes).map_err(ConflictableTransactionError::Abort)?,
                None => 0,
            };
            if nonce > stored {
                nonces.insert(caller.as_bytes().as_slice(), &nonce.to_be_bytes())?;
            }
            Ok::<(), ConflictableTransactionError<DbError>>(())
        })?;
        self.db.flush()?;
        Ok(())
    }

    /// Highest accepted nonce for every caller seen so far.
    pub fn load_nonces(&self) -> DbResult<Vec<(Address, u64)>> {
        let mut out = Vec::with_capacity(self.nonces.len());
        for entry in self.nonces.iter() {
            let (key, value) = entry?;
            out.push((address_from_key(&key)?, decode_u64(&value)?));
        }
        Ok(out)
    }

    // -- Metadata -----------------------------------------------------------

    /// The factory sequence counter as last persisted (0 on a fresh database).
    pub fn get_sequence(&self) -> DbResult<u64> {
        match self.metadata.get(META_SEQUENCE)? {
            Some(bytes) => decode_u64(&bytes),
            None => Ok(0),
        }
    }

    /// The template definition this database was created with, if recorded.
    pub fn get_template<T: DeserializeOwned>(&self) -> DbResult<Option<T>> {
        match self.metadata.get(META_TEMPLATE)? {
            Some(bytes) => {
                let template = bincode::deserialize(&bytes)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                Ok(Some(template))
            }
            None => Ok(None),
        }
    }

    pub fn put_template<T: Serialize>(&self, template: &T) -> DbResult<()> {
        let bytes =
            bincode::serialize(template).map_err(|e| DbError::Serialization(e.to_string()))?;
        self.metadata.insert(META_TEMPLATE, bytes)?;
        self.db.flush()?;
        Ok(())
    }

    /// Number of stored instances.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Block until all pending writes are durable.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn decode_u64(bytes: &[u8]) -> DbResult<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| DbError::Serialization("invalid counter bytes".to_string()))?;
    Ok(u64::from_be_bytes(arr))
}

fn address_from_key(bytes: &[u8]) -> DbResult<Address> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| DbError::Serialization("invalid address bytes".to_string()))?;
    Ok(Address::from_bytes(arr))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
