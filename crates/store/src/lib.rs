use anyhow::{Context, Result};
use protocol::{ClassCatalogEntry, ClassToHeaderMap};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub mod catalog;
pub mod classlist;
pub mod graph;

pub use catalog::{catalog_file_name, file_stem, parse_catalog, render_catalog, CatalogListing, ListedEntry};
pub use classlist::{build_class_list, exclusion_pattern, render_class_list, ClassListEntry, Multiplicity};
pub use graph::{GraphStats, InheritanceGraph};

pub const CLASS_MAP_FILE: &str = "classmap.json";
pub const CATALOG_DIR: &str = "txt";
pub const CLASS_LIST_FILE: &str = "classlist.txt";

pub fn render_class_map(map: &ClassToHeaderMap) -> Result<String> {
    let mut json = serde_json::to_string_pretty(map).context("serializing class map")?;
    json.push('\n');
    Ok(json)
}

pub fn load_class_map(path: &Path) -> Result<ClassToHeaderMap> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading class map {}", path.display()))?;
    let map: ClassToHeaderMap = serde_json::from_str(&text)
        .with_context(|| format!("parsing class map {}", path.display()))?;
    debug!("Loaded {} classes from {}", map.len(), path.display());
    Ok(map)
}

pub fn save_class_list(entries: &[ClassListEntry], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render_class_list(entries))
        .with_context(|| format!("writing class list {}", path.display()))?;
    info!("Wrote {} classes to {}", entries.len(), path.display());
    Ok(())
}

pub fn save_class_map(map: &ClassToHeaderMap, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render_class_map(map)?)
        .with_context(|| format!("writing class map {}", path.display()))?;
    info!("Wrote {} classes to {}", map.len(), path.display());
    Ok(())
}

/// Output directory holding the class map and one catalog text file per
/// class under `txt/`.
pub struct CatalogStore {
    root: PathBuf,
}

impl CatalogStore {
    pub fn new(root: &Path) -> Result<Self> {
        fs::create_dir_all(root.join(CATALOG_DIR))
            .with_context(|| format!("creating {}", root.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn class_map_path(&self) -> PathBuf {
        self.root.join(CLASS_MAP_FILE)
    }

    pub fn catalog_dir(&self) -> PathBuf {
        self.root.join(CATALOG_DIR)
    }

    pub fn save_class_map(&self, map: &ClassToHeaderMap) -> Result<PathBuf> {
        let path = self.class_map_path();
        save_class_map(map, &path)?;
        Ok(path)
    }

    pub fn write_entry(
        &self,
        entry: &ClassCatalogEntry,
        version: &str,
        created: &str,
    ) -> Result<PathBuf> {
        let name = catalog_file_name(&entry.record.header, &entry.record.name);
        let path = self.catalog_dir().join(name);
        fs::write(&path, render_catalog(entry, version, created))
            .with_context(|| format!("writing catalog {}", path.display()))?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }
}

/// Every `*.txt` catalog in `dir`, keyed by class name. Unreadable files are
/// skipped with a warning.
pub fn load_listings(dir: &Path) -> Result<BTreeMap<String, CatalogListing>> {
    let mut listings = BTreeMap::new();
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    paths.sort();

    for path in paths {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                warn!("Skipping {}: {}", path.display(), err);
                continue;
            }
        };
        let listing = parse_catalog(&text);
        if listing.class.is_empty() {
            warn!("Skipping {}: no Class: field", path.display());
            continue;
        }
        listings.entry(listing.class.clone()).or_insert(listing);
    }

    info!("Loaded {} catalog listings from {}", listings.len(), dir.display());
    Ok(listings)
}
