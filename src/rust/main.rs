use sspred::server::{serve, ServerConfig, DEFAULT_CORS_ORIGINS};
use sspred::weights::{CHECKPOINT_FILE, GRAPH_FILE, META_FILE};
use sspred::{Predictor, PredictorBuilder, RuntimeConfig, WeightStore, DEFAULT_MAX_LENGTH};
use log::info;
use env_logger::{Builder, Env};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding model_weights.onnx / model_weights.safetensors and meta.json
    #[arg(short, long, global = true, env = "SSPRED_WEIGHTS")]
    weights_dir: Option<PathBuf>,

    /// Residues kept after cleaning the input sequence
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_LENGTH)]
    max_length: usize,

    /// ONNX Runtime intra-op threads (0 lets the runtime decide)
    #[arg(long, global = true, default_value_t = 0)]
    intra_threads: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the prediction API over HTTP
    Serve {
        #[arg(long, env = "SSPRED_HOST", default_value = "127.0.0.1")]
        host: String,

        #[arg(short, long, env = "SSPRED_PORT", default_value_t = 8000)]
        port: u16,

        /// Allowed CORS origin (repeatable); defaults to the local frontend
        #[arg(long = "cors-origin")]
        cors_origins: Vec<String>,
    },
    /// Predict a single sequence and print it as CSV
    Predict {
        /// Amino-acid sequence; unsupported characters are dropped
        sequence: String,

        /// Number of the first residue
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
        index_start: u64,
    },
    /// Download a weight artifact into the weights directory
    Fetch {
        /// URL of the artifact
        url: String,

        /// File name to store it under
        #[arg(long, default_value = GRAPH_FILE, value_parser = [GRAPH_FILE, CHECKPOINT_FILE, META_FILE])]
        name: String,

        /// Expected SHA-256 of the artifact
        #[arg(long)]
        sha256: Option<String>,
    },
}

fn build_predictor(args: &Args) -> Result<Predictor, Box<dyn std::error::Error>> {
    let start_time = Instant::now();
    info!("Loading predictor...");

    let config = RuntimeConfig {
        intra_threads: args.intra_threads,
        ..RuntimeConfig::default()
    };
    let mut builder = PredictorBuilder::new()
        .with_runtime_config(config)
        .with_max_length(args.max_length)?;
    if let Some(dir) = &args.weights_dir {
        builder = builder.with_weights_dir(dir);
    }
    let predictor = builder.build()?;

    let loaded = predictor.load_info();
    info!("Loaded {} model from {:?} (took {:.2?})", loaded.backend, loaded.path, start_time.elapsed());
    if let Some(val_acc) = loaded.val_acc {
        info!("Checkpoint validation accuracy: {:.3}", val_acc);
    }
    Ok(predictor)
}

fn weight_store(args: &Args) -> WeightStore {
    match &args.weights_dir {
        Some(dir) => WeightStore::new(dir),
        None => WeightStore::new_default(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match &args.command {
        Command::Serve { host, port, cors_origins } => {
            let predictor = build_predictor(&args)?;
            let cors_origins = if cors_origins.is_empty() {
                DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect()
            } else {
                cors_origins.clone()
            };
            let config = ServerConfig {
                host: host.clone(),
                port: *port,
                cors_origins,
            };
            serve(predictor, config).await?;
        }
        Command::Predict { sequence, index_start } => {
            let predictor = build_predictor(&args)?;
            let prediction = predictor.predict(sequence, *index_start)?;
            println!("{}", prediction.to_csv());

            let composition = prediction.composition();
            println!();
            println!("Length: {}", composition.length);
            println!("  H: {} ({:.1}%)", composition.helix, composition.fraction(composition.helix) * 100.0);
            println!("  E: {} ({:.1}%)", composition.strand, composition.fraction(composition.strand) * 100.0);
            println!("  C: {} ({:.1}%)", composition.coil, composition.fraction(composition.coil) * 100.0);
        }
        Command::Fetch { url, name, sha256 } => {
            let store = weight_store(&args);
            let path = store.download_artifact(url, name, sha256.as_deref()).await?;
            println!("Saved {}", path.display());
        }
    }

    Ok(())
}
