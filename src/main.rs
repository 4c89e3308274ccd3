use std::time::Duration;

use crate::logging::app_config;
use chrono::{DateTime, Utc};
use clap::Parser;
use cli::Cli;
use promwatch::clock::{format_time_of_day, recent_window};
use promwatch::{format_labels, PollRegistry, PromClient, QueryError, Sample, Timer};

mod cli;
mod logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // initialize the logger
    log4rs::init_config(app_config(&cli.logfile, cli.loglevel)?)?;
    log::info!("Starting the application!");

    let endpoint = cli.endpoint();
    log::info!("Querying metrics from endpoint: {}", endpoint);
    log::info!("Polling interval is: {}ms", cli.interval);

    let mut client = PromClient::new(reqwest::Client::new());
    if let Some(proxy) = cli.proxy.clone() {
        log::info!("Sending queries through proxy: {}", proxy);
        client = client.with_proxy_base(proxy);
    }
    let use_proxy = client.proxy_base().is_some();

    let registry = PollRegistry::with_failure_policy(cli.failure_policy());
    let query = cli.query.clone();
    let handle = registry.register(
        move || {
            let client = client.clone();
            let query = query.clone();
            let endpoint = endpoint.clone();
            async move { poll_once(&client, &query, &endpoint, use_proxy).await }
        },
        Duration::from_millis(cli.interval),
    )?;

    tokio::signal::ctrl_c().await?;
    log::info!("Interrupted, stopping poll {handle}");
    registry.cancel_all();
    Ok(())
}

async fn poll_once(
    client: &PromClient,
    query: &str,
    endpoint: &str,
    use_proxy: bool,
) -> Result<(), QueryError> {
    let timer = Timer::start();
    let result = client.query(query, endpoint, use_proxy).await;
    log::debug!("Query `{}` took {}ms", query, timer.elapsed());

    match result? {
        None => println!("{} no data", format_time_of_day(&Utc::now())),
        Some(samples) => {
            let (window_start, _) = recent_window();
            for sample in &samples {
                println!("{}", render_sample(sample, window_start));
            }
        }
    }
    Ok(())
}

fn render_sample(sample: &Sample, window_start: DateTime<Utc>) -> String {
    let stale = if sample.timestamp < window_start {
        " (stale)"
    } else {
        ""
    };
    format!(
        "{} {{{}}} {}{}",
        format_time_of_day(&sample.timestamp),
        format_labels(&sample.labels),
        sample.value,
        stale
    )
}
