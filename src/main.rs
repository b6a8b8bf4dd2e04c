use std::path::PathBuf;

use clap::Parser;
use tower_lsp::{LspService, Server};
use tracing::info;

use i18n_keys_language_server::config::ServerConfig;
use i18n_keys_language_server::logging::init_logger;
use i18n_keys_language_server::lsp::backend::TranslationBackend;

/// Translation-key completion and hover for JSON locale files, over LSP on stdio.
#[derive(Parser, Debug)]
#[command(name = "i18n-keys-language-server", version, about)]
struct Args {
    /// Translation source: a JSON file or a directory scanned recursively (repeatable)
    #[arg(long = "source", value_name = "PATH")]
    sources: Vec<PathBuf>,

    /// Snapshot age in milliseconds after which requests trigger a background rebuild
    #[arg(long, value_name = "MS")]
    stale_threshold_ms: Option<u64>,

    /// Do not watch the sources for changes
    #[arg(long)]
    no_watch: bool,

    /// Never treat the argument of `obj.t("...")` as a namespace
    #[arg(long)]
    no_member_call_fallback: bool,

    /// Log level for stderr (overrides RUST_LOG)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Disable ANSI colors in stderr output
    #[arg(long)]
    no_color: bool,

    /// Disable the session log file in the user cache directory
    #[arg(long)]
    no_file_logging: bool,

    /// Communicate over stdio (the only supported transport)
    #[arg(long)]
    #[allow(dead_code)]
    stdio: bool,
}

impl Args {
    fn apply(&self, mut config: ServerConfig) -> ServerConfig {
        if !self.sources.is_empty() {
            config.sources = self.sources.clone();
        }
        if let Some(threshold) = self.stale_threshold_ms {
            config.stale_threshold_ms = threshold;
        }
        if self.no_watch {
            config.watch = false;
        }
        if self.no_member_call_fallback {
            config.member_call_fallback = false;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = init_logger(args.no_color, args.log_level.as_deref(), !args.no_file_logging)?;

    let config = args.apply(ServerConfig::from_env_or_default());
    info!(
        "Starting {} {} with {} configured sources",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        config.sources.len()
    );

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    let (service, socket) = LspService::new(|client| TranslationBackend::new(client, config));

    Server::new(stdin, stdout, socket).serve(service).await;

    info!("Language server stopped");
    Ok(())
}
