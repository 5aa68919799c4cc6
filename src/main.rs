use std::{env, process, sync::Arc};

use tracing::info;
use weather_mcp::{
    cache::TtlCache,
    config::Config,
    error::{AppError, AppResult},
    gateway::{transport, Dispatcher, SessionManager},
    initialize_logging,
    weather::{build_registry, prompt_catalog, OpenMeteoClient, WeatherBackend},
};

/// Command-line options
///
/// Flags are deliberately minimal; everything else comes from the config
/// file and environment overrides.
#[derive(Debug, Default)]
struct CliArgs {
    stdio: bool,
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<String>,
}

impl CliArgs {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut parsed = Self::default();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--stdio" => parsed.stdio = true,
                "--host" => {
                    let value = iter.next().ok_or("--host requires a value")?;
                    parsed.host = Some(value.clone());
                }
                "--port" => {
                    let value = iter.next().ok_or("--port requires a value")?;
                    let port = value
                        .parse()
                        .map_err(|_| format!("invalid port: {}", value))?;
                    parsed.port = Some(port);
                }
                "--config" => {
                    let value = iter.next().ok_or("--config requires a value")?;
                    parsed.config_path = Some(value.clone());
                }
                other => return Err(format!("unknown argument: {}", other)),
            }
        }

        Ok(parsed)
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command line arguments first (before logging to avoid noise)
    let args: Vec<String> = env::args().collect();

    // Handle version flag
    if args.contains(&"--version".to_string()) || args.contains(&"-V".to_string()) {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        process::exit(0);
    }

    // Handle help flag
    if args.contains(&"--help".to_string()) || args.contains(&"-h".to_string()) {
        print_help();
        process::exit(0);
    }

    let cli = match CliArgs::parse(&args[1..]) {
        Ok(cli) => cli,
        Err(message) => {
            eprintln!("error: {}", message);
            eprintln!("Run '{} --help' for usage.", env!("CARGO_PKG_NAME"));
            process::exit(2);
        }
    };

    // Initialize logging
    initialize_logging().map_err(|e| AppError::application(e.to_string()))?;

    // Configuration precedence: file, then environment, then flags
    let mut config = match &cli.config_path {
        Some(path) => Config::load_from_file(path).await?,
        None => Config::load().await?,
    };
    config.apply_env_overrides();
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.validate()?;

    // Wire the gateway: provider -> tool registry -> cache -> dispatcher
    let backend: Arc<dyn WeatherBackend> = Arc::new(OpenMeteoClient::new(&config.weather)?);
    let registry = Arc::new(build_registry(backend, &config.weather)?);

    let cache = Arc::new(TtlCache::new(config.cache.ttl()));
    TtlCache::spawn_sweeper(Arc::clone(&cache), config.cache.sweep_interval());

    let sessions = Arc::new(SessionManager::new());
    SessionManager::spawn_reaper(
        Arc::clone(&sessions),
        config.session.reap_interval(),
        config.session.idle_timeout(),
    );

    let dispatcher = Arc::new(Dispatcher::new(registry, cache, prompt_catalog()));

    if cli.stdio {
        info!(
            "🚀 {} v{} serving on stdio",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        );
        transport::stdio::serve(dispatcher, sessions).await
    } else {
        info!(
            "🚀 {} v{} serving SSE on {}:{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            config.server.host,
            config.server.port
        );
        transport::sse::serve(dispatcher, sessions, &config.server.host, config.server.port).await
    }
}

fn print_help() {
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    println!();
    println!("USAGE:");
    println!("    {} [OPTIONS]", env!("CARGO_PKG_NAME"));
    println!();
    println!("OPTIONS:");
    println!("        --stdio            Serve JSON-RPC over stdin/stdout instead of HTTP");
    println!("        --host <HOST>      Bind address for the SSE server (default: 0.0.0.0)");
    println!("        --port <PORT>      Bind port for the SSE server (default: 8000)");
    println!("        --config <PATH>    Load configuration from a specific file");
    println!("    -h, --help             Print this help message and exit");
    println!("    -V, --version          Print version information and exit");
    println!();
    println!("ENVIRONMENT:");
    println!("    WEATHER_MCP_HOST     Override the bind address");
    println!("    WEATHER_MCP_PORT     Override the bind port");
    println!("    DEFAULT_LOCATION     Fallback \"lat,lon\" for tool calls");
    println!("    DEFAULT_LANG         Geocoding language (default: ru)");
    println!("    CACHE_TTL            Tool result cache TTL in seconds");
    println!("    REQUEST_TIMEOUT      Upstream request timeout in seconds");
    println!("    RUST_LOG             Set logging level (debug, info, warn, error)");
    println!();
    println!("EXAMPLES:");
    println!("    {}                  Start the SSE server", env!("CARGO_PKG_NAME"));
    println!("    {} --stdio          Speak JSON-RPC on stdio", env!("CARGO_PKG_NAME"));
    println!("    {} --port 9000      Bind the SSE server to port 9000", env!("CARGO_PKG_NAME"));
}
