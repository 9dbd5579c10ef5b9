//! Link-cloak HTTP service.
//!
//! Configuration comes from `LINK_CLOAK_*` environment variables (see
//! [`ServiceConfig::from_env`]); log filtering follows `RUST_LOG`.

// std
use std::sync::Arc;
// crates.io
use color_eyre::{Result, eyre::eyre};
// self
use link_cloak::{
	config::ServiceConfig,
	obs,
	server::{self, AppState},
	store::{FileStore, LinkStore, MemoryStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	obs::init_tracing().map_err(|e| eyre!("Failed to install the tracing subscriber: {e}"))?;

	let config = ServiceConfig::from_env()?;
	let store: Arc<dyn LinkStore> = match &config.store_path {
		Some(path) => Arc::new(FileStore::open(path)?),
		None => {
			tracing::warn!("No store path configured; links will not survive a restart.");

			Arc::new(MemoryStore::default())
		},
	};
	let count = store.ensure_counter().await?;

	tracing::info!(
		count,
		mode = %config.cooldown_mode,
		endpoint = %config.endpoint,
		"Service configured."
	);

	let state = AppState::from_config(store, &config)?;

	server::serve(state, config.bind).await?;

	Ok(())
}
