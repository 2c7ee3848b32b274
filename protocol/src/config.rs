//! # Protocol Configuration & Constants
//!
//! Every fixed parameter of Human Pass lives here. Runtime options (ports,
//! data directory, template naming) are node concerns and come from the CLI;
//! the values below are baked into signatures, addresses, and storage
//! layouts, so changing one is a breaking change.

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The full protocol version string.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Storage schema version written into the node database. Bump when the
/// persisted registry layout changes.
pub const STORAGE_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Identity & Signing
// ---------------------------------------------------------------------------

/// Bech32 human-readable prefix for every address.
pub const ADDRESS_HRP: &str = "hp";

/// Domain tag mixed into every signed envelope.
pub const ENVELOPE_DOMAIN: &str = "humanpass/envelope/v1";

/// Ed25519 signature length.
pub const SIGNATURE_LENGTH: usize = 64;

// ---------------------------------------------------------------------------
// Registry Template Defaults
// ---------------------------------------------------------------------------

/// Default credential collection name.
pub const DEFAULT_TEMPLATE_NAME: &str = "Human Pass";

/// Default credential collection symbol.
pub const DEFAULT_TEMPLATE_SYMBOL: &str = "HPASS";

/// Longest accepted template name, in bytes.
pub const MAX_TEMPLATE_NAME_LENGTH: usize = 64;

/// Longest accepted template symbol, in bytes.
pub const MAX_TEMPLATE_SYMBOL_LENGTH: usize = 16;

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default HTTP API port.
pub const DEFAULT_RPC_PORT: u16 = 9841;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

/// File name of the deployer key inside the data directory.
pub const DEPLOYER_KEY_FILE: &str = "deployer.key";

/// Directory name of the sled database inside the data directory.
pub const DATABASE_DIR: &str = "db";
