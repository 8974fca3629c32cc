pub mod catalog;
pub mod compound;
pub mod config;
pub mod filter;
pub mod metrics;
pub mod oracle;
pub mod walker;

pub use catalog::{CatalogBuilder, ScannedHeader};
pub use compound::{expand_compound, qualified_candidates, ChainSource};
pub use config::CatalogConfig;
pub use filter::{classify_return, select_member, select_method, ReturnClass};
pub use metrics::{HeaderFailure, MetricsCollector, ScanReport};
pub use oracle::{JsonOracle, NullOracle, OracleCache, ReflectionOracle};
pub use walker::{FileWalker, HeaderPath};

use anyhow::Result;
use std::path::PathBuf;
use store::CatalogStore;
use tracing::info;

/// Timestamp written into the `Created:` field of catalog files.
pub fn created_timestamp() -> String {
    chrono::Local::now().format("%a %b %e %H:%M:%S %Y").to_string()
}

/// Build every catalog entry and write the class map and one catalog file
/// per class into `store`.
pub fn write_catalogs(
    builder: &mut CatalogBuilder,
    store: &CatalogStore,
    created: &str,
) -> Result<Vec<PathBuf>> {
    store.save_class_map(builder.class_map())?;
    let version = builder.config().version.clone();
    let entries = builder.build_all();
    let mut written = Vec::with_capacity(entries.len());
    for entry in &entries {
        written.push(store.write_entry(entry, &version, created)?);
    }
    info!("Wrote {} catalogs to {}", written.len(), store.catalog_dir().display());
    Ok(written)
}
