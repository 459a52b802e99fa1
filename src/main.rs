use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use upload_imaging::config::{self, UploadConfig};
use upload_imaging::imaging::RustBackend;
use upload_imaging::pipeline::{UploadOrigin, UploadPipeline};
use upload_imaging::storage::LocalStorage;
use upload_imaging::store::{AssetStore, JsonAssetStore};
use upload_imaging::output;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "upload-imaging")]
#[command(about = "Normalize uploaded images and generate responsive variants")]
#[command(long_about = "\
Normalize uploaded images and generate responsive variants

Uploaded files are stored in <public>/uploads under content-derived names,
converted to the canonical encoding, and given one resized variant per
breakpoint narrower than the source. Asset records live in a JSON store.

Layout:

  <root>/
  ├── upload.toml                       # Pipeline config (optional)
  ├── .upload-imaging/assets.json       # Asset records
  └── public/
      └── uploads/
          ├── photo_3fa9c01b2e.webp     # Main file, canonical encoding
          ├── photo_3fa9c01b2e-small.webp
          └── uploads-api/              # Files uploaded with --api

Per-format exceptions (upload.toml [exceptions]) can keep a format as-is,
skip its variants, or generate variants in the original encoding.

Run 'upload-imaging gen-config' to generate a documented upload.toml.")]
#[command(version)]
struct Cli {
    /// Project root containing upload.toml
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Public directory served as `/`, relative to the root
    #[arg(long, default_value = "public", global = true)]
    public: PathBuf,

    /// Asset store file, relative to the root
    #[arg(long, default_value = ".upload-imaging/assets.json", global = true)]
    store: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store files (or every file under directories) and process them
    Upload {
        /// Files or directories to upload
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Treat as content-API uploads (moved into the API folder)
        #[arg(long)]
        api: bool,
    },
    /// Run a stored asset through the pipeline again
    Reprocess {
        /// Asset id
        id: u64,
    },
    /// List stored assets and their variants
    List {
        /// Print raw JSON records instead of the summary
        #[arg(long)]
        json: bool,
    },
    /// Print a stock upload.toml with all options documented
    GenConfig,
    /// Validate upload.toml and print the effective configuration
    CheckConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Upload { paths, api } => {
            let config = config::load_config(&cli.root)?;
            init_thread_pool(&config.processing);
            let pipeline = build_pipeline(&cli, config)?;

            let mut results = Vec::new();
            let mut ingested = Vec::new();
            for file in collect_files(paths) {
                match pipeline.ingest_file(&file) {
                    Ok(asset) => ingested.push(asset),
                    Err(e) => {
                        e.log();
                        results.push(Err(e));
                    }
                }
            }

            let origin = if *api {
                UploadOrigin::Api
            } else {
                UploadOrigin::Admin
            };
            for result in pipeline.process_batch(ingested, origin) {
                if let Err(e) = &result {
                    e.log();
                }
                results.push(result);
            }

            output::print_upload_report(&results);
            let failed = results.iter().filter(|r| r.is_err()).count();
            if failed > 0 {
                return Err(format!("{failed} upload(s) failed").into());
            }
        }
        Command::Reprocess { id } => {
            let config = config::load_config(&cli.root)?;
            let pipeline = build_pipeline(&cli, config)?;
            let result = pipeline.reprocess(*id);
            if let Err(e) = &result {
                e.log();
            }
            let failed = result.is_err();
            output::print_upload_report(&[result]);
            if failed {
                return Err(format!("reprocessing asset {id} failed").into());
            }
        }
        Command::List { json } => {
            let store = JsonAssetStore::open(cli.root.join(&cli.store))?;
            let assets = store.list()?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&assets)?);
            } else {
                output::print_asset_list(&assets);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::CheckConfig => {
            let config = config::load_config(&cli.root)?;
            output::print_config_summary(&config);
            println!("==> {} is valid", config::CONFIG_FILENAME);
        }
    }

    Ok(())
}

type CliPipeline = UploadPipeline<RustBackend, JsonAssetStore>;

fn build_pipeline(
    cli: &Cli,
    config: UploadConfig,
) -> Result<CliPipeline, Box<dyn std::error::Error>> {
    let backend = RustBackend::with_max_dimension(config.processing.max_image_dimension);
    let store = JsonAssetStore::open(cli.root.join(&cli.store))?;
    let storage = LocalStorage::new(cli.root.join(&cli.public));
    Ok(UploadPipeline::new(config, backend, store, storage))
}

/// Expand directories into the regular files beneath them, skipping hidden
/// entries. Plain file arguments are kept as given.
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        let walker = WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()));
        for entry in walker {
            match entry {
                Ok(e) if e.file_type().is_file() => files.push(e.into_path()),
                Ok(_) => {}
                Err(e) => tracing::warn!("skipping unreadable entry: {}", e),
            }
        }
    }
    files
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with('.'))
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
