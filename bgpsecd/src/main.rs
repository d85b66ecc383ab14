#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use bgpsecd_core::config::load_from_path;
use bgpsecd_core::connection::{ConnectionHandler, HandlerDeps};
use bgpsecd_core::model::Verdict;
use bgpsecd_core::signer::Signer;
use bgpsecd_core::telemetry::init_tracing;
use bgpsecd_core::validators::{MockAspaValidator, MockBgpsecValidator, MockOriginValidator};

#[derive(Parser, Debug)]
#[command(author, version, about = "BGP security decision service")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", default_value = "bgpsecd.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_from_path(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            // tracing isn't initialized yet: we don't know the configured
            // log level until the file we failed to load tells us.
            eprintln!("failed to load configuration from {:?}: {err}", cli.config);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging);
    info!(listen = %config.server.listen, "configuration loaded");

    let signer = match &config.signing.private_key_path {
        Some(path) => match Signer::load(path.as_ref()) {
            Ok(signer) => Some(Arc::new(signer)),
            Err(err) => {
                error!(%err, %path, "failed to load signing key");
                std::process::exit(1);
            }
        },
        None => {
            info!("no signing key configured, running without SIGN/SIGTRA support");
            None
        }
    };

    // Real RPKI-Router wiring is out of scope for this crate; these mocks
    // back every request with the default "not yet validated" verdict until
    // an operator-supplied validator is wired in.
    let deps = HandlerDeps {
        origin: Arc::new(MockOriginValidator::new(Verdict::NotFound)),
        bgpsec: Arc::new(MockBgpsecValidator::new(Verdict::Undefined)),
        aspa: Arc::new(MockAspaValidator::new(Verdict::Undefined)),
        signer,
    };

    let handler = ConnectionHandler::build(&config, deps);

    let listener = match TcpListener::bind(&config.server.listen).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, listen = %config.server.listen, "failed to bind listener");
            std::process::exit(1);
        }
    };
    info!(listen = %config.server.listen, "listening for proxy connections");

    let token = handler.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            token.cancel();
        }
    });

    handler.serve(listener).await;
    handler.shutdown().await;
}
