//! `alat`: window host and its command-line client
//!
//! With no command the process becomes the host: the graphics executor runs
//! on the main thread while a tokio runtime serves remote calls. With a
//! command it connects to a running host, performs one call and prints the
//! result.

mod cli;

use std::process::ExitCode;

use alat_engine::foundation::logging;
use alat_engine::prelude::*;
use clap::Parser;
use cli::{Cli, Command};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match HostConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&config.logging);

    match cli.command {
        Some(command) => {
            if let Some(addr) = cli.addr {
                config.client.server_addr = addr;
            }
            run_client(&config.client, command)
        }
        None => {
            if let Some(addr) = cli.addr {
                config.server.bind_addr = addr;
            }
            match run_host(&config) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    log::error!("Host failed: {err}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

/// Perform one remote call and report it on stdout or stderr
fn run_client(config: &ClientConfig, command: Command) -> ExitCode {
    let call = Call::from(command);
    let method = call.method();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = runtime.block_on(async {
        let mut client = match Client::connect(config.server_addr.as_str()).await {
            Ok(client) => client,
            Err(err) => {
                eprintln!("Error connecting to server: {err}");
                return None;
            }
        };
        Some(client.call(&call).await)
    });

    match outcome {
        Some(Ok(status)) => {
            println!("Result of {method}:{status}");
            ExitCode::SUCCESS
        }
        Some(Err(err)) => {
            eprintln!("error calling {method}: {err}");
            ExitCode::FAILURE
        }
        None => ExitCode::FAILURE,
    }
}

/// Serve remote calls until a `Server.Close` ends the process
fn run_host(config: &HostConfig) -> Result<(), Box<dyn std::error::Error>> {
    let graphics = create_backend(&config.renderer)?;
    log::info!("Graphics backend: {}", graphics.name());
    let (executor, submitter) = CommandExecutor::new(graphics, &config.executor);

    let runtime = tokio::runtime::Runtime::new()?;
    let server = runtime.block_on(start_server(
        &config.server.bind_addr,
        WindowCreator::new(submitter),
        exit_process(),
    ))?;
    log::info!("Listening on {}", server.local_addr());

    // GLFW requires the main thread
    executor.run();

    drop(server);
    log::info!("Host stopped");
    Ok(())
}
