// Copyright (c) 2026 Human Pass Contributors. MIT License.
// See LICENSE for details.

//! # Human Pass Node
//!
//! Entry point for the `humanpass-node` binary. Parses CLI arguments,
//! initializes logging and metrics, restores the instance factory from disk,
//! and serves the HTTP API.
//!
//! The binary supports three subcommands:
//!
//! - `run`     start the node
//! - `keygen`  generate a caller keypair
//! - `version` print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use humanpass_contracts::credential_registry::RegistryState;
use humanpass_contracts::instance_factory::{FactorySnapshot, InstanceFactory};
use humanpass_contracts::template::TemplateDefinition;
use humanpass_protocol::config::{DATABASE_DIR, DEPLOYER_KEY_FILE, PROTOCOL_VERSION};
use humanpass_protocol::crypto::PassKeypair;
use humanpass_protocol::identity::Address;
use humanpass_protocol::storage::db::PassDB;

use cli::{Commands, HumanPassCli};
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = HumanPassCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Keygen => {
            keygen();
            Ok(())
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the node: storage, factory, API server, and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_FILTER, args.log_format);

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting humanpass-node"
    );

    std::fs::create_dir_all(&args.data_dir).with_context(|| {
        format!("failed to create data directory: {}", args.data_dir.display())
    })?;

    // --- Persistent storage ---
    let db_path = args.data_dir.join(DATABASE_DIR);
    let db = Arc::new(
        PassDB::open(&db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?,
    );
    tracing::info!(path = %db_path.display(), "database opened");

    // --- Deployer identity ---
    let deployer_key = load_deployer_key(&args.data_dir, args.deployer_key.as_deref())?;
    let deployer = Address::from_public_key(&deployer_key.public_key());
    tracing::info!(deployer = %deployer, "deployer key loaded");

    // --- Factory ---
    let definition = TemplateDefinition::new(args.template_name, args.template_symbol);
    let factory = Arc::new(restore_factory(&db, deployer, definition)?);

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    node_metrics
        .live_instances
        .set(factory.instance_count() as i64);

    // --- Application state ---
    let app_state = app_state(Arc::clone(&db), factory, Arc::clone(&node_metrics))?;

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    db.flush().context("failed to flush database")?;
    tracing::info!("humanpass-node stopped");
    Ok(())
}

/// Resolve the deployer keypair: explicit flag first, then the key file in
/// the data directory, generating and saving one on first run.
fn load_deployer_key(data_dir: &Path, explicit: Option<&str>) -> Result<PassKeypair> {
    if let Some(hex_key) = explicit {
        return PassKeypair::from_hex(hex_key).context("invalid --deployer-key");
    }

    let key_path = data_dir.join(DEPLOYER_KEY_FILE);
    if key_path.exists() {
        let contents = std::fs::read_to_string(&key_path)
            .with_context(|| format!("failed to read {}", key_path.display()))?;
        return PassKeypair::from_hex(&contents)
            .with_context(|| format!("invalid deployer key in {}", key_path.display()));
    }

    let keypair = PassKeypair::generate();
    std::fs::write(&key_path, keypair.secret_key_hex())
        .with_context(|| format!("failed to write deployer key to {}", key_path.display()))?;

    // Restrict permissions on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!(key_path = %key_path.display(), "generated new deployer key");
    Ok(keypair)
}

/// Rebuild the factory from everything persisted in `db`.
///
/// A database remembers the template it was created with; starting it with
/// a different name or symbol would silently rebind every stored instance,
/// so that is refused.
fn restore_factory(
    db: &PassDB,
    deployer: Address,
    definition: TemplateDefinition,
) -> Result<InstanceFactory> {
    match db
        .get_template::<TemplateDefinition>()
        .context("failed to read stored template")?
    {
        Some(stored) if stored != definition => bail!(
            "database was created for template '{}' ({}), refusing to start with '{}' ({})",
            stored.name,
            stored.symbol,
            definition.name,
            definition.symbol
        ),
        Some(_) => {}
        None => db
            .put_template(&definition)
            .context("failed to record template")?,
    }

    let instances: Vec<(Address, RegistryState)> = db
        .load_instances()
        .context("failed to load persisted instances")?;
    let callers = db
        .load_callers()
        .context("failed to load caller index")?;
    let sequence = db.get_sequence().context("failed to read instance sequence")?;

    let snapshot = FactorySnapshot {
        deployer,
        definition,
        sequence,
        callers,
        instances,
    };
    let factory =
        InstanceFactory::from_snapshot(snapshot).context("failed to restore instance factory")?;
    tracing::info!(
        factory = %factory.address(),
        instances = factory.instance_count(),
        "instance factory ready"
    );
    Ok(factory)
}

/// Assemble the API state, seeding replay protection from `db`.
fn app_state(
    db: Arc<PassDB>,
    factory: Arc<InstanceFactory>,
    metrics: Arc<NodeMetrics>,
) -> Result<api::AppState> {
    let nonces: DashMap<Address, u64> = db
        .load_nonces()
        .context("failed to load caller nonces")?
        .into_iter()
        .collect();
    tracing::info!(callers = nonces.len(), "replay protection restored");

    Ok(api::AppState {
        version: format!("{} (protocol {})", env!("CARGO_PKG_VERSION"), PROTOCOL_VERSION),
        factory,
        db,
        metrics,
        nonces: Arc::new(nonces),
    })
}

/// Prints a fresh caller keypair to stdout.
fn keygen() {
    let keypair = PassKeypair::generate();
    let address = Address::from_public_key(&keypair.public_key());
    println!("address     : {}", address);
    println!("public key  : {}", keypair.public_key_hex());
    println!("secret key  : {}", keypair.secret_key_hex());
}

/// Prints version information to stdout.
fn print_version() {
    println!("humanpass-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol       {}", PROTOCOL_VERSION);
    println!("rustc          {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
