use std::path::PathBuf;

use clap::Parser;
use clap::ValueHint;
use promwatch::FailurePolicy;
use regex::Regex;
use url::Url;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Prometheus endpoint to query
    ///
    /// Origin of the Prometheus compatible backend, without the /api/v1 path.
    #[arg(short, long, env="PROM_ENDPOINT", value_hint=ValueHint::Url, default_value="http://localhost:9090")]
    pub endpoint: String,

    /// Prometheus endpoint's port number
    ///
    /// Replaces the port of the endpoint. Example: http://localhost:<PORT>
    #[arg(short, long, env="PROM_PORT", value_hint=ValueHint::Other)]
    pub port: Option<u16>,

    /// Instant query expression
    #[arg(short, long, env = "PROM_QUERY", default_value = "up")]
    pub query: String,

    /// Dashboard server to send queries through
    ///
    /// Base URL of a server exposing /proxy?url=. When set, every query is
    /// forwarded through it instead of hitting the endpoint directly.
    #[arg(long, env="PROM_PROXY", value_hint=ValueHint::Url)]
    pub proxy: Option<Url>,

    /// Polling interval in milliseconds
    ///
    /// Time to wait after one query finishes before the next one starts.
    #[arg(short, long, env="PROM_POLL_INTERVAL_MS", value_hint=ValueHint::Other, default_value="1000")]
    pub interval: u64,

    /// Stop polling after the first failed query
    #[arg(long)]
    pub stop_on_error: bool,

    /// Set the logging level
    ///
    /// Set the logging level to use when logging to the log file
    #[arg(short, long, env="LOG_LEVEL", value_hint=ValueHint::Other, default_value="INFO")]
    pub loglevel: log::LevelFilter,

    /// Log file to write to
    #[arg(long, env="LOG_FILE", value_hint=ValueHint::FilePath, default_value="promwatch.log")]
    pub logfile: PathBuf,
}

impl Cli {
    /// The endpoint with `--port` applied.
    pub fn endpoint(&self) -> String {
        match self.port {
            Some(port) => replace_port(&self.endpoint, port),
            None => self.endpoint.clone(),
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        if self.stop_on_error {
            FailurePolicy::Stop
        } else {
            FailurePolicy::Continue
        }
    }
}

fn replace_port(endpoint: &str, port: u16) -> String {
    let with_port = Regex::new(r"^(\w+://[^/:]+):\d{1,5}").expect("valid port pattern");
    if with_port.is_match(endpoint) {
        return with_port
            .replace(endpoint, format!("${{1}}:{port}"))
            .to_string();
    }
    let without_port = Regex::new(r"^(\w+://[^/:]+)").expect("valid host pattern");
    without_port
        .replace(endpoint, format!("${{1}}:{port}"))
        .to_string()
}
