use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;

use harbor::config::{ConfigValidator, LogFormat, ServerConfig, load_config};
use harbor::ports::HttpServer;
use harbor::tracing_setup::init_tracing;
use harbor::{DirFileStore, Service, StaticServer};

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve a directory of static assets")]
struct Args {
    /// YAML configuration file; flags and environment override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, env = "HOST")]
    host: Option<String>,

    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Directory to serve
    #[arg(short, long, env = "HARBOR_ROOT")]
    root: Option<String>,

    #[arg(long, env = "HARBOR_INDEX")]
    index: Option<String>,

    /// File served with status 404 when a path does not resolve
    #[arg(long, env = "HARBOR_NOT_FOUND_FILE")]
    not_found_file: Option<String>,

    /// Serve the index document for unknown paths
    #[arg(long, env = "HARBOR_CLIENT_SIDE_ROUTING", num_args = 0..=1, default_missing_value = "true")]
    csr: Option<bool>,

    #[arg(long, env = "HARBOR_GZIP", num_args = 0..=1, default_missing_value = "true")]
    gzip: Option<bool>,

    /// Long-lived caching for /_assets/ and /_next/, no caching elsewhere
    #[arg(long, env = "HARBOR_CACHE_POLICY", num_args = 0..=1, default_missing_value = "true")]
    cache_policy: Option<bool>,

    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Log every request with its status and duration
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    request_log: Option<bool>,
}

impl Args {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(root) = self.root {
            config.root = root;
        }
        // An empty index keeps the configured one.
        if let Some(index) = self.index.filter(|index| !index.is_empty()) {
            config.index = index;
        }
        if let Some(not_found_file) = self.not_found_file {
            config.not_found_file = (!not_found_file.is_empty()).then_some(not_found_file);
        }
        if let Some(csr) = self.csr {
            config.client_side_routing = csr;
        }
        if let Some(gzip) = self.gzip {
            config.gzip = gzip;
        }
        if let Some(cache_policy) = self.cache_policy {
            config.cache_policy.enabled = cache_policy;
        }
        if let Some(log_format) = self.log_format {
            config.log_format = log_format;
        }
        if let Some(request_log) = self.request_log {
            config.request_log = request_log;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    args.apply(&mut config);

    init_tracing(config.log_format).map_err(|e| anyhow!("Failed to initialize tracing: {e}"))?;

    ConfigValidator::validate(&config).context("Invalid configuration")?;

    let addr: SocketAddr = config
        .listen_addr()
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.listen_addr()))?;

    let store = DirFileStore::new(&config.root)
        .with_context(|| format!("Failed to open root directory: {}", config.root))?;
    let options = config
        .service_options()
        .context("Failed to build service options")?;
    let service = Service::new(store, options).context("Failed to build static file service")?;

    tracing::info!(
        root = %config.root,
        client_side_routing = config.client_side_routing,
        gzip = config.gzip,
        cache_policy = config.cache_policy.enabled,
        "Serving static files"
    );

    StaticServer::new(service, addr).run().await
}
