use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::info;

use pawpredict::auth::{JwksConfig, DEFAULT_MIN_REFRESH_INTERVAL};
use pawpredict::model_manager::{
    ModelManager, ModelSource, DEFAULT_BREED_INFO_FILE, DEFAULT_LABELS_FILE, DEFAULT_MODEL_FILE,
};
use pawpredict::{Normalization, PreprocessConfig, RuntimeConfig, ServerConfig, TensorLayout};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: std::net::IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// ONNX model file (default: <models dir>/breed_classifier.onnx)
    #[arg(long, env = "MODEL_PATH")]
    model_path: Option<PathBuf>,

    /// JSON list or index->name map of class labels
    #[arg(long, env = "CLASS_INDICES_PATH")]
    labels_path: Option<PathBuf>,

    /// JSON map of breed name -> attributes
    #[arg(long, env = "BREED_INFO_PATH")]
    breed_info_path: Option<PathBuf>,

    /// Where to download the model from when it is missing or corrupt
    #[arg(long, env = "MODEL_URL")]
    model_url: Option<String>,

    /// Expected SHA-256 of the model file
    #[arg(long, env = "MODEL_SHA256")]
    model_sha256: Option<String>,

    /// Force a fresh download of the model file
    #[arg(short, long)]
    fresh: bool,

    /// Pixel normalization the model was trained with: raw, signed, imagenet
    #[arg(long, env = "NORMALIZATION", default_value_t = Normalization::Raw)]
    normalization: Normalization,

    /// Input tensor layout: nhwc, nchw
    #[arg(long, env = "TENSOR_LAYOUT", default_value_t = TensorLayout::Nhwc)]
    layout: TensorLayout,

    /// Square input size in pixels
    #[arg(long, env = "IMAGE_SIZE", default_value_t = pawpredict::preprocess::DEFAULT_IMAGE_SIZE)]
    image_size: u32,

    /// ONNX Runtime intra-op threads (0 = let the runtime decide)
    #[arg(long, env = "INTRA_THREADS", default_value_t = 0)]
    intra_threads: usize,

    /// JWKS endpoint used to verify bearer tokens
    #[arg(long, env = "JWKS_URL")]
    jwks_url: Option<String>,

    /// Clerk publishable key; the JWKS URL is derived from it when --jwks-url is absent
    #[arg(long, env = "CLERK_PUBLISHABLE_KEY")]
    clerk_publishable_key: Option<String>,

    /// Seconds a fetched key set stays trusted
    #[arg(long, env = "JWKS_TTL_SECS", default_value_t = 3600)]
    jwks_ttl_secs: u64,

    /// Timeout for one key set request, in seconds
    #[arg(long, env = "JWKS_TIMEOUT_SECS", default_value_t = 10)]
    jwks_timeout_secs: u64,

    /// Persist history to this JSON file instead of keeping it in memory
    #[arg(long, env = "HISTORY_FILE")]
    history_file: Option<PathBuf>,

    /// Maximum upload size in MiB
    #[arg(long, env = "MAX_UPLOAD_MB", default_value_t = 10)]
    max_upload_mb: usize,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let models_dir = ModelManager::get_default_models_dir();
        ServerConfig {
            addr: SocketAddr::new(self.host, self.port),
            model_path: self.model_path.unwrap_or_else(|| models_dir.join(DEFAULT_MODEL_FILE)),
            labels_path: self.labels_path.unwrap_or_else(|| models_dir.join(DEFAULT_LABELS_FILE)),
            breed_info_path: self.breed_info_path.unwrap_or_else(|| models_dir.join(DEFAULT_BREED_INFO_FILE)),
            model_source: ModelSource { url: self.model_url, sha256: self.model_sha256 },
            fresh: self.fresh,
            runtime: RuntimeConfig { intra_threads: self.intra_threads, ..Default::default() },
            preprocess: PreprocessConfig {
                width: self.image_size,
                height: self.image_size,
                normalization: self.normalization,
                layout: self.layout,
            },
            jwks_url: self.jwks_url,
            publishable_key: self.clerk_publishable_key,
            jwks: JwksConfig {
                ttl: Duration::from_secs(self.jwks_ttl_secs),
                min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
                fetch_timeout: Duration::from_secs(self.jwks_timeout_secs),
            },
            history_file: self.history_file,
            body_limit: self.max_upload_mb * 1024 * 1024,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pawpredict::init_logger();
    let config = Args::parse().into_config();

    info!("=== Dog Breed Predictor API - Starting ===");
    info!("Model: {}", config.model_path.display());
    info!("Class indices: {}", config.labels_path.display());
    info!("Breed info: {}", config.breed_info_path.display());
    info!(
        "Input: {}x{} {} / {}",
        config.preprocess.width, config.preprocess.height, config.preprocess.layout, config.preprocess.normalization
    );

    pawpredict::server::serve(config).await
}
