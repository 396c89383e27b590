use std::path::PathBuf;

use clap::Parser;
use quickdrop_core::Config;

// Use mimalloc as the global allocator for better performance and lower fragmentation,
// especially when running on musl-based systems inside containers.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Share text and files through a six-digit pickup code.
#[derive(Debug, Parser)]
#[command(name = "quickdrop", version, about)]
struct Cli {
    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Maximum upload size in megabytes (overrides MAX_UPLOAD_MB)
    #[arg(long)]
    maxsize: Option<u64>,

    /// Directory holding uploaded files (overrides STORAGE_PATH)
    #[arg(long)]
    storage_path: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(port) = self.port {
            config.server_port = port;
        }
        if let Some(maxsize) = self.maxsize {
            config.max_upload_mb = maxsize;
        }
        if let Some(path) = self.storage_path {
            config.storage_path = path;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Load configuration; command line flags win over the environment
    let mut config = Config::from_env()?;
    cli.apply(&mut config);
    config.validate()?;

    // Initialize the application (storage, registry, reaper, routes)
    let app = quickdrop_api::setup::initialize_app(config.clone()).await?;

    // Start the server
    quickdrop_api::setup::server::start_server(&config, app).await?;

    Ok(())
}
