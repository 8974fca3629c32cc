use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use headercat::{
    created_timestamp, write_catalogs, CatalogBuilder, CatalogConfig, JsonOracle, NullOracle,
    ReflectionOracle,
};
use std::path::{Path, PathBuf};
use store::{
    build_class_list, exclusion_pattern, load_class_map, load_listings, render_catalog,
    save_class_list, save_class_map, CatalogStore, CLASS_LIST_FILE, CLASS_MAP_FILE,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "headercat")]
#[command(about = "Class map and accessor catalogs from C++ headers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true)]
    verbose: bool,

    /// JSON file with catalog settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct ScanArgs {
    /// Header trees to scan
    #[arg(required = true)]
    roots: Vec<PathBuf>,

    #[arg(long)]
    jobs: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the class-to-header map
    Map {
        #[command(flatten)]
        scan: ScanArgs,

        #[arg(long, default_value = CLASS_MAP_FILE)]
        out: PathBuf,

        /// Only add classes missing from an existing map
        #[arg(long)]
        update: bool,
    },

    /// Write the class map and one catalog file per class
    Catalog {
        #[command(flatten)]
        scan: ScanArgs,

        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Reflection dump consulted before the header text
        #[arg(long)]
        oracle: Option<PathBuf>,

        /// Catalog directory of an earlier run
        #[arg(long)]
        previous: Option<PathBuf>,

        /// Write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print the catalog of one class
    Show {
        class: String,

        #[command(flatten)]
        scan: ScanArgs,

        #[arg(long)]
        oracle: Option<PathBuf>,
    },

    /// Write the list of classes exposed downstream
    Classlist {
        #[arg(long, default_value = CLASS_MAP_FILE)]
        map: PathBuf,

        /// One class name per line
        #[arg(long)]
        classes: PathBuf,

        /// Extra exclusion patterns, one per line
        #[arg(long)]
        exclude: Option<PathBuf>,

        #[arg(long, default_value = CLASS_LIST_FILE)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &cli.config {
        Some(path) => CatalogConfig::load(path)?,
        None => CatalogConfig::default(),
    };

    match cli.command {
        Commands::Map { scan, out, update } => {
            let mut builder = new_builder(config, &scan, None)?;
            if update {
                if !out.exists() {
                    bail!("--update given but {} does not exist", out.display());
                }
                builder = builder.with_class_map(load_class_map(&out)?);
            }
            builder.scan_roots(&scan.roots)?;
            save_class_map(builder.class_map(), &out)?;

            let report = builder.report();
            report.log();
            println!(
                "Mapped {} classes from {} headers ({} failed)",
                builder.class_map().len(),
                report.headers_scanned,
                report.headers_failed
            );
        }

        Commands::Catalog {
            scan,
            out_dir,
            oracle,
            previous,
            report,
        } => {
            let mut builder = new_builder(config, &scan, oracle.as_deref())?;
            if let Some(previous) = previous {
                if !previous.is_dir() {
                    bail!("previous catalog directory {} does not exist", previous.display());
                }
                builder = builder.with_listings(load_listings(&previous)?);
            }
            builder.scan_roots(&scan.roots)?;

            let store = CatalogStore::new(&out_dir)?;
            let written = write_catalogs(&mut builder, &store, &created_timestamp())?;

            let stats = builder.graph().stats();
            info!(
                "Inheritance graph: {} classes, {} edges{}",
                stats.node_count,
                stats.edge_count,
                if stats.is_cyclic { ", cyclic" } else { "" }
            );

            let summary = builder.report();
            summary.log();
            if let Some(path) = report {
                let json = serde_json::to_string_pretty(&summary)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("writing report {}", path.display()))?;
            }
            println!(
                "Wrote {} catalogs for {} mapped classes ({} headers failed)",
                written.len(),
                builder.class_map().len(),
                summary.headers_failed
            );
        }

        Commands::Show {
            class,
            scan,
            oracle,
        } => {
            let mut builder = new_builder(config, &scan, oracle.as_deref())?;
            builder.scan_roots(&scan.roots)?;
            let Some(entry) = builder.build_entry(&class) else {
                bail!("{} is not defined in any scanned header", class);
            };
            let version = builder.config().version.clone();
            print!("{}", render_catalog(&entry, &version, &created_timestamp()));
        }

        Commands::Classlist {
            map,
            classes,
            exclude,
            out,
        } => {
            if !map.exists() {
                bail!("class map {} does not exist, run `headercat map` first", map.display());
            }
            let map = load_class_map(&map)?;
            let classes = read_lines(&classes)?;
            let extra = match exclude {
                Some(path) => read_lines(&path)?,
                None => Vec::new(),
            };

            let pattern = exclusion_pattern(&extra)?;
            let entries = build_class_list(&classes, &map, &pattern);
            save_class_list(&entries, &out)?;
            println!("Listed {} of {} classes in {}", entries.len(), classes.len(), out.display());
        }
    }

    Ok(())
}

fn new_builder(
    mut config: CatalogConfig,
    scan: &ScanArgs,
    oracle: Option<&Path>,
) -> Result<CatalogBuilder> {
    for root in &scan.roots {
        if !root.exists() {
            bail!("header root {} does not exist", root.display());
        }
    }
    if scan.jobs.is_some() {
        config.jobs = scan.jobs;
    }

    let oracle: Box<dyn ReflectionOracle> = match oracle {
        Some(path) => Box::new(JsonOracle::load(path)?),
        None => Box::new(NullOracle),
    };
    Ok(CatalogBuilder::new(config, oracle))
}

/// Non-empty lines with `#` comments removed.
fn read_lines(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let lines: Vec<String> = text
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        warn!("{} lists nothing", path.display());
    }
    Ok(lines)
}
