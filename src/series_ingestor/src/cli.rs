//! Command-line entrypoints.

pub mod commands;

use std::fs;

use tracing::info;

use crate::{
    clock::{Clock, SystemClock},
    config::{IngestorConfig, apply_env_overrides, load_config_path},
    errors::Error,
    extract,
    models::Observation,
    poll::Orchestrator,
};

use commands::{Cli, Commands};

pub async fn dispatch(cli: Cli) -> Result<(), Error> {
    let (mut config, report) = load_config_path(&cli.config).map_err(Error::Config)?;
    for var in apply_env_overrides(&mut config).map_err(Error::Config)? {
        info!(var, "config value overridden from environment");
    }
    info!(
        config = %cli.config.display(),
        feeds = config.feeds.len(),
        keys_renamed = report.keys_renamed,
        headers_dropped = report.headers_dropped,
        "config loaded"
    );

    match cli.command {
        Commands::Run => {
            let orchestrator = Orchestrator::from_config(config)?;
            for report in orchestrator.run().await {
                println!("{report}");
            }
        }
        Commands::CheckConfig => print_config(&config),
        Commands::Extract { feed, input, day } => {
            let feed = config
                .feeds
                .iter()
                .find(|f| f.key == feed.trim().to_lowercase())
                .ok_or(Error::UnknownFeed(feed))?;
            let day = match day {
                Some(d) => d,
                None => SystemClock::new(config.upstream.tz().map_err(Error::Config)?).today(),
            };
            let body = fs::read_to_string(&input)?;
            let observation = extract::extract_body(&body, feed, day)?;
            print!("{}", render_observation(&observation));
        }
    }
    Ok(())
}

fn print_config(config: &IngestorConfig) {
    println!("upstream: {}", config.upstream.base_url);
    println!("gate: {:?}", config.gate);
    println!("storage: {}", config.storage.root.display());
    for feed in &config.feeds {
        println!(
            "feed {}: {} [{}] primary={} diffs={}",
            feed.key,
            feed.path,
            feed.header(),
            feed.primary,
            feed.diffs.len()
        );
    }
}

fn render_observation(observation: &Observation) -> String {
    let mut out = format!("time = {}\n", observation.time);
    for (column, value) in &observation.metrics {
        out.push_str(&format!("{column} = {value}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SampleTime;

    #[test]
    fn renders_one_line_per_metric() {
        let obs = Observation::new(SampleTime::new("09:20"))
            .with_metric("vol", 10)
            .with_metric("buy", 3);
        assert_eq!(render_observation(&obs), "time = 09:20\nvol = 10\nbuy = 3\n");
    }
}
