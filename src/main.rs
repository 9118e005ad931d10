use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zotero_bib_proxy::config::{
    find_config_file, get_config, load_config, Environment, QueryParams, RequestConfig, Settings,
};
use zotero_bib_proxy::server::{serve, RequestHandler};
use zotero_bib_proxy::utils::RequestLog;

/// Zotero Bibliography Proxy - Serve a Zotero library as one deduplicated bibliography
#[derive(Parser, Debug)]
#[command(name = "zotero-bib-proxy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Serve a Zotero library or collection tree as a single bibliography", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Settings file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show all environment variables
    #[arg(long, global = true)]
    env: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP proxy (default)
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Fetch one bibliography and print it, exactly as the proxy would serve it
    #[command(alias = "f")]
    Fetch {
        /// Collection path, e.g. "Papers/2024" (omit for the whole library)
        #[arg(default_value = "")]
        path: String,

        /// Use this collection id instead of resolving the path
        #[arg(long)]
        collection_id: Option<String>,

        /// Do not include sub-collections
        #[arg(long)]
        only_self: bool,

        /// Output format requested from Zotero (default: bibtex)
        #[arg(long)]
        format: Option<String>,

        /// Leave out the commented request log
        #[arg(long)]
        remove_comments: bool,
    },

    /// List the collection paths of the configured library
    #[command(alias = "c")]
    Collections,
}

/// Print all available environment variables
fn print_env_vars() {
    println!("Zotero Bibliography Proxy - Environment Variables");
    println!();
    println!("Library Defaults (overridable per request):");
    println!("  ZOTERO_GROUP                Group library id (takes precedence over ZOTERO_USER)");
    println!("  ZOTERO_USER                 User library id");
    println!("  ZOTERO_KEY                  Zotero API key");
    println!("  ZOTERO_FORMAT               Output format (default: bibtex)");
    println!("  ZOTERO_INCLUSION_STRATEGY   'only-self' to skip sub-collections (default: all)");
    println!();
    println!("Settings:");
    println!("  ZOTERO_PROXY_SERVER__HOST                  Bind address (default: 0.0.0.0)");
    println!("  ZOTERO_PROXY_SERVER__PORT                  Port (default: 5000)");
    println!("  ZOTERO_PROXY_API__BASE_URL                 Zotero API base URL (default: https://api.zotero.org)");
    println!("  ZOTERO_PROXY_API__PAGE_SIZE                Results per page (default: 100)");
    println!("  ZOTERO_PROXY_API__TIMEOUT_SECONDS          Timeout per page request (default: 30)");
    println!("  ZOTERO_PROXY_CACHE__COLLECTION_TTL_SECONDS Maximum age of a cached collection index (default: unset)");
    println!("  ZOTERO_PROXY_LOGGING__LEVEL                Log level (default: info)");
    println!("  ZOTERO_PROXY_LOGGING__FORMAT               'json' for structured logs");
    println!();
    println!("Other Settings:");
    println!("  RUST_LOG                    Rust logging level (e.g., debug, info, warn, error)");
    std::process::exit(0);
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings> {
    let settings = match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => match find_config_file() {
            Some(path) => load_config(&path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => get_config().context("Failed to read settings from the environment")?,
        },
    };
    Ok(settings)
}

fn init_tracing(cli: &Cli, settings: &Settings) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => settings.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };
    let json = settings.logging.format.as_deref() == Some("json");

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("zotero_bib_proxy={}", level)),
        ))
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.env {
        print_env_vars();
    }

    let mut settings = load_settings(cli.config.as_ref())?;
    init_tracing(&cli, &settings);

    let handler = RequestHandler::from_settings(&settings, Environment::from_env())?;

    match cli.command {
        None => {
            serve(&settings.server, Arc::new(handler)).await?;
        }
        Some(Commands::Serve { host, port }) => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            serve(&settings.server, Arc::new(handler)).await?;
        }
        Some(Commands::Fetch {
            path,
            collection_id,
            only_self,
            format,
            remove_comments,
        }) => {
            let mut pairs = Vec::new();
            if let Some(id) = collection_id {
                pairs.push(("collection_id", id));
            }
            if only_self {
                pairs.push(("inclusion_strategy", "only-self".to_string()));
            }
            if let Some(format) = format {
                pairs.push(("format", format));
            }
            if remove_comments {
                pairs.push(("remove_comments", "true".to_string()));
            }
            let body = handler.handle(&path, &QueryParams::from_pairs(pairs)).await;
            println!("{}", body);
        }
        Some(Commands::Collections) => {
            let log = RequestLog::new();
            let config =
                RequestConfig::from_sources(handler.environment(), &QueryParams::default(), &log)?;
            let index = handler
                .collections()
                .refresh(&config.entity, &config.key, &log)
                .await?;
            for (path, key) in index.entries() {
                println!("{}\t{}", path, key);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::try_parse_from(["zotero-bib-proxy"]).unwrap();
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
        assert!(cli.config.is_none());
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["zotero-bib-proxy", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_serve_command() {
        let cli = Cli::try_parse_from(["zotero-bib-proxy", "serve", "--port", "8080"]).unwrap();
        match cli.command {
            Some(Commands::Serve { host, port }) => {
                assert!(host.is_none());
                assert_eq!(port, Some(8080));
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_fetch_command() {
        let cli = Cli::try_parse_from([
            "zotero-bib-proxy",
            "fetch",
            "Papers/2024",
            "--only-self",
            "--remove-comments",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Fetch {
                path,
                only_self,
                remove_comments,
                collection_id,
                format,
            }) => {
                assert_eq!(path, "Papers/2024");
                assert!(only_self);
                assert!(remove_comments);
                assert!(collection_id.is_none());
                assert!(format.is_none());
            }
            _ => panic!("Expected Fetch command"),
        }
    }

    #[test]
    fn test_cli_fetch_defaults_to_library() {
        let cli = Cli::try_parse_from(["zotero-bib-proxy", "fetch"]).unwrap();
        match cli.command {
            Some(Commands::Fetch { path, .. }) => assert!(path.is_empty()),
            _ => panic!("Expected Fetch command"),
        }
    }

    #[test]
    fn test_cli_config_flag() {
        let cli =
            Cli::try_parse_from(["zotero-bib-proxy", "--config", "/tmp/proxy.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/proxy.toml")));
    }
}
