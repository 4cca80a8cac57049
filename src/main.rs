//! chatwire binary entry point.

use std::process::ExitCode;
use std::sync::Arc;

use chatwire::cli::{self, Args};
use chatwire::protocol::loopback::LoopbackFactory;
use chatwire::{logging, Config, FileCredentialStore, Runtime, StdoutSink};
use tokio::io::BufReader;
use tracing::{error, info};

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Try '--help' for more information.");
            return ExitCode::FAILURE;
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    run(&args)
}

fn run(args: &Args) -> ExitCode {
    let config = match Config::load(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(config.log_filter());
    info!("chatwire v{}", env!("CARGO_PKG_VERSION"));
    info!(folder = %config.auth.folder.display(), "Using credential folder");

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let runtime = Runtime::new(
        Arc::new(LoopbackFactory::new()),
        Arc::new(FileCredentialStore::new(config.auth.folder.clone())),
        Arc::new(StdoutSink::new()),
        Box::new(BufReader::new(tokio::io::stdin())),
    )
    .with_address_suffix(config.address_suffix());

    let outcome = rt.block_on(runtime.run());
    // Stdin is read on a blocking thread that never finishes on its own.
    rt.shutdown_background();

    match outcome {
        Ok(reason) => {
            info!(%reason, "Exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
