//! Process entry point: install logging, parse config, build the JobManager,
//! spawn the worker and listener reactor threads, install signal hooks, join.
//!
//! Grounded on `examples/original_source/src/core/main.c`'s `main`/
//! `signal_handler`: stop every listener first, then every worker, on
//! `SIGINT`/`SIGTERM`; `SIGPIPE` is ignored throughout.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use signal_hook::consts::{SIGINT, SIGPIPE, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{error, info, info_span};

use queen_httpd::config::{Cli, Config};
use queen_httpd::error::AppError;
use queen_httpd::listener::Listener;
use queen_httpd::logging;
use queen_httpd::manager::JobManager;
use queen_httpd::poller::default_backend;
use queen_httpd::transport::{load_server_config, Server};
use queen_httpd::worker::Worker;

fn main() -> ExitCode {
    logging::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal startup error");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), AppError> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| AppError::Config("failed to install rustls crypto provider".into()))?;

    let cli = Cli::parse();
    let config = Config::try_from(cli)?;

    let manager = Arc::new(JobManager::new(
        config.global_max_job(),
        config.listeners[0].root.clone(),
        config.buffer_size,
    ));

    let backend = default_backend();
    let mut workers = Vec::with_capacity(config.worker_count);
    for index in 0..config.worker_count {
        let worker = Arc::new(
            Worker::new(index, backend, manager.clone())
                .map_err(|e| AppError::setup("spawning worker poller", e))?,
        );
        workers.push(worker);
    }

    let worker_handles: Vec<_> = workers
        .iter()
        .cloned()
        .map(|worker| {
            let name = format!("worker-{}", worker.index());
            worker.spawn(name)
        })
        .collect();

    let mut listeners = Vec::with_capacity(config.listeners.len());
    for (index, listener_config) in config.listeners.iter().enumerate() {
        let address = SocketAddr::new(listener_config.address, listener_config.port);
        let mut server = Server::bind(address, listener_config.max)?;

        if listener_config.secure {
            let cert = listener_config
                .certificate
                .as_deref()
                .ok_or_else(|| AppError::Config("secure listener missing certificate path".into()))?;
            let key = listener_config
                .private_key
                .as_deref()
                .ok_or_else(|| AppError::Config("secure listener missing private key path".into()))?;
            let tls_config = load_server_config(cert, key)?;
            server.enable_tls(tls_config);
        }

        info!(listener = index, address = %address, secure = listener_config.secure, "binding listener");

        let listener = Listener::new(index, server, manager.clone(), workers.clone())
            .map_err(|e| AppError::setup("setting up listener poller", e))?;
        listeners.push(Arc::new(listener));
    }

    let listener_stops: Vec<_> = listeners.iter().map(|l| l.stop_handle()).collect();
    let worker_stops: Vec<_> = workers.iter().map(|w| w.stop_handle()).collect();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGPIPE])
        .map_err(|e| AppError::setup("installing signal handlers", e))?;
    let signal_handle = signals.handle();
    let signal_thread = std::thread::spawn(move || {
        for signal in signals.forever() {
            match signal {
                SIGINT | SIGTERM => {
                    info!(signal, "shutdown signal received");
                    for stop in &listener_stops {
                        stop.stop();
                    }
                    for stop in &worker_stops {
                        stop.stop();
                    }
                    break;
                }
                SIGPIPE => {}
                _ => {}
            }
        }
    });

    let listener_handles: Vec<_> = listeners
        .iter()
        .cloned()
        .enumerate()
        .map(|(index, listener)| {
            std::thread::Builder::new()
                .name(format!("listener-{index}"))
                .spawn(move || {
                    let _span = info_span!("listener", index).entered();
                    listener.run();
                })
                .expect("failed to spawn listener thread")
        })
        .collect();

    for handle in listener_handles {
        let _ = handle.join();
    }
    for handle in worker_handles {
        let _ = handle.join();
    }

    signal_handle.close();
    let _ = signal_thread.join();

    info!("shutdown complete");
    Ok(())
}
