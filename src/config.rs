//! Process-argument parsing and the validated [`Config`] it builds.
//!
//! Grounded on `examples/original_source/src/core/config.c` for flag names,
//! defaults, and the `max_job` sizing formulas; the `clap` derive API
//! replaces the hand-rolled `getopt` loop (precedent for `clap` throughout
//! `examples/other_examples/manifests/*`).

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use crate::error::AppError;

const DEFAULT_WORKERS: usize = 1;
const DEFAULT_MAX_CONN: usize = 255;
const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;
const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_HTTPS_PORT: u16 = 8443;

fn positive(s: &str) -> Result<usize, String> {
    let value: i64 = s.parse().map_err(|_| format!("`{s}` is not an integer"))?;
    if value <= 0 {
        return Err(format!("`{s}` must be a positive integer"));
    }
    Ok(value as usize)
}

/// Command-line flags, mirroring §6 of the design exactly.
#[derive(Debug, Parser)]
#[command(name = "queen-httpd", about = "A multi-threaded static-file HTTP/1.1 server")]
pub struct Cli {
    /// Number of worker reactor threads.
    #[arg(long, default_value_t = DEFAULT_WORKERS, value_parser = positive)]
    pub workers: usize,

    /// Maximum number of simultaneous connections, shared across workers.
    #[arg(long = "max-conn", default_value_t = DEFAULT_MAX_CONN, value_parser = positive)]
    pub max_conn: usize,

    /// Per-connection read/write scratch buffer size, in bytes.
    #[arg(long = "buffer-size", default_value_t = DEFAULT_BUFFER_SIZE, value_parser = positive)]
    pub buffer_size: usize,

    /// Bind the plain-HTTP and HTTPS listeners on IPv6 `::` instead of IPv4 `0.0.0.0`.
    #[arg(long = "ip6")]
    pub ip6: bool,

    /// Port for the plain-HTTP listener.
    #[arg(long = "http-port", default_value_t = DEFAULT_HTTP_PORT)]
    pub http_port: u16,

    /// Port for the HTTPS listener (only bound when `--ssl` is set).
    #[arg(long = "https-port", default_value_t = DEFAULT_HTTPS_PORT)]
    pub https_port: u16,

    /// Document root served by both listeners.
    #[arg(long = "root-path", default_value = "www")]
    pub root_path: PathBuf,

    /// Enable the HTTPS listener.
    #[arg(long = "ssl")]
    pub ssl: bool,

    /// PEM certificate chain path, used when `--ssl` is set.
    #[arg(long = "ssl-certificate-path", default_value = "fullchain.pem")]
    pub ssl_certificate_path: PathBuf,

    /// PEM private key path, used when `--ssl` is set.
    #[arg(long = "ssl-private-key-path", default_value = "privkey.pem")]
    pub ssl_private_key_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    V4,
    V6,
}

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub family: Family,
    pub address: IpAddr,
    pub port: u16,
    /// Listen backlog.
    pub max: usize,
    pub secure: bool,
    pub root: Arc<std::path::Path>,
    pub certificate: Option<PathBuf>,
    pub private_key: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub max_job: usize,
    pub buffer_size: usize,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub worker_count: usize,
    pub max_conn: usize,
    pub buffer_size: usize,
    pub listeners: Vec<ListenerConfig>,
    pub worker: WorkerConfig,
}

impl Config {
    /// Global job-manager capacity: `max_conn + 2`, the "+2" covering one
    /// hot-swap slot per listener (§3).
    pub fn global_max_job(&self) -> usize {
        self.max_conn + 2
    }
}

impl TryFrom<Cli> for Config {
    type Error = AppError;

    fn try_from(cli: Cli) -> Result<Config, AppError> {
        let root = std::fs::canonicalize(&cli.root_path).map_err(|e| {
            AppError::Config(format!(
                "root path {:?} does not exist or is not accessible: {e}",
                cli.root_path
            ))
        })?;
        let root: Arc<std::path::Path> = Arc::from(root.as_path());

        let (family, address) = if cli.ip6 {
            (Family::V6, IpAddr::from([0u16; 8]))
        } else {
            (Family::V4, IpAddr::from([0u8; 4]))
        };

        let mut listeners = vec![ListenerConfig {
            family,
            address,
            port: cli.http_port,
            max: cli.max_conn,
            secure: false,
            root: root.clone(),
            certificate: None,
            private_key: None,
        }];

        if cli.ssl {
            listeners.push(ListenerConfig {
                family,
                address,
                port: cli.https_port,
                max: cli.max_conn,
                secure: true,
                root,
                certificate: Some(cli.ssl_certificate_path.clone()),
                private_key: Some(cli.ssl_private_key_path.clone()),
            });
        }

        if listeners.is_empty() {
            return Err(AppError::Config("no listeners configured".into()));
        }

        // Effective per-worker max_job: ceil(max_conn / worker_count) + 1.
        let max_job = (cli.max_conn + cli.workers - 1) / cli.workers + 1;

        Ok(Config {
            worker_count: cli.workers,
            max_conn: cli.max_conn,
            buffer_size: cli.buffer_size,
            listeners,
            worker: WorkerConfig {
                max_job,
                buffer_size: cli.buffer_size,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_rejects_zero_and_negative() {
        assert!(positive("0").is_err());
        assert!(positive("-1").is_err());
        assert!(positive("3").is_ok());
    }

    #[test]
    fn max_job_formula_matches_spec() {
        // max_conn=255, workers=4 => ceil(255/4)+1 = 64+1 = 65
        let cli = Cli {
            workers: 4,
            max_conn: 255,
            buffer_size: DEFAULT_BUFFER_SIZE,
            ip6: false,
            http_port: DEFAULT_HTTP_PORT,
            https_port: DEFAULT_HTTPS_PORT,
            root_path: PathBuf::from("."),
            ssl: false,
            ssl_certificate_path: PathBuf::from("fullchain.pem"),
            ssl_private_key_path: PathBuf::from("privkey.pem"),
        };
        let config = Config::try_from(cli).unwrap();
        assert_eq!(config.worker.max_job, 65);
        assert_eq!(config.global_max_job(), 257);
    }
}
