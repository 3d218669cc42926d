//! itemlens - identifies the item sprite under the pointer and shows its wiki entry.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::ImageReader;
use lens_cli::{render_record, App, AppConfig, DeviceQueryPointer, LoopSettings, TerminalSink, XcapScreen};
use lens_core::init_thread_pool;
use lens_match::{FeatureExtractor, MatchEngine, SpriteLibrary};
use lens_meta::{MetadataCache, WikiSource};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Item sprite detector with wiki lookups
#[derive(Parser)]
#[command(name = "itemlens")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML, or JSON by extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the screen around the pointer (the configured pause key toggles pausing)
    Run {
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,

        /// Override the sprite directory
        #[arg(short, long)]
        sprites: Option<PathBuf>,
    },

    /// Match a single image file against the sprite library
    Match {
        image: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch and print the metadata of one item
    Info {
        name: String,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_ansi(!cli.no_color)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &cli.config {
        Some(path) => AppConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Run { cycles, sprites } => {
            let config = match sprites {
                Some(dir) => config.with_sprite_dir(dir),
                None => config,
            };
            run(&config, cycles)
        }
        Commands::Match { image, json } => match_file(&config, &image, json),
        Commands::Info { name, json } => info_item(&config, &name, json),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn load_library(config: &AppConfig) -> Result<(Arc<FeatureExtractor>, Arc<SpriteLibrary>)> {
    if let Err(err) = init_thread_pool(config.extractor.n_threads) {
        warn!(error = %err, "using the existing global thread pool");
    }
    let extractor = Arc::new(FeatureExtractor::new(config.extractor.clone()).context("invalid extractor settings")?);
    let library = SpriteLibrary::build(&config.sprite_dir, &extractor)
        .with_context(|| format!("loading sprites from {}", config.sprite_dir.display()))?;
    Ok((extractor, Arc::new(library)))
}

fn metadata_cache(config: &AppConfig) -> Result<MetadataCache<WikiSource>> {
    let source = WikiSource::new(
        config.metadata.base_url.clone(),
        Duration::from_secs(config.metadata.timeout_secs),
    );
    Ok(MetadataCache::new(source)?)
}

fn run(config: &AppConfig, cycles: Option<u64>) -> Result<()> {
    info!("{}", config.summary());
    let (extractor, library) = load_library(config)?;
    if library.matchable_count() == 0 {
        warn!("no sprite in the library can be matched; every cycle will report no detection");
    }

    let engine = MatchEngine::new(extractor, config.matcher.clone());
    let cache = Arc::new(metadata_cache(config)?);
    let pause_key = config.pause_keycode()?;
    let settings = LoopSettings {
        interval: Duration::from_millis(config.poll_interval_ms),
        region_size: config.region_size,
        workers: config.metadata.workers,
    };

    let mut app = App::new(
        library,
        engine,
        cache,
        XcapScreen,
        DeviceQueryPointer::new(pause_key),
        TerminalSink::stdout(),
        settings,
    )
    .context("starting metadata workers")?;
    app.run(cycles);
    Ok(())
}

fn match_file(config: &AppConfig, path: &Path, json: bool) -> Result<()> {
    let img = ImageReader::open(path)
        .with_context(|| format!("opening {}", path.display()))?
        .with_guessed_format()?
        .decode()
        .with_context(|| format!("decoding {}", path.display()))?;

    let (extractor, library) = load_library(config)?;
    let features = extractor.extract(&img)?;
    info!(descriptors = features.descriptor_count(), "capture features extracted");

    let engine = MatchEngine::new(extractor, config.matcher.clone());
    let hit = engine.detect_features(&features, &library);

    if json {
        println!("{}", serde_json::to_string_pretty(&hit)?);
    } else {
        match hit {
            Some(hit) => println!("{} (score {:.2}, {} matches)", hit.name, hit.score, hit.good_matches),
            None => println!("No item detected"),
        }
    }
    Ok(())
}

fn info_item(config: &AppConfig, name: &str, json: bool) -> Result<()> {
    let cache = metadata_cache(config)?;
    let record = cache
        .get_or_fetch(name)
        .with_context(|| format!("fetching metadata for {name}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&*record)?);
    } else {
        println!("{}", render_record(&record));
    }
    Ok(())
}
