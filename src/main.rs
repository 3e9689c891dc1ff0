use chrono::Local;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod alert;
mod config;
mod menu;
mod notify;
mod store;
mod utils;

use alert::{MenuWatcher, Outcome, WatchSettings};
use config::Config;
use notify::{Notifier, SlackNotifier};
use store::{ObjectStore, S3Store};
use utils::fetch::MenuFetcher;

fn cli() -> Command {
    Command::new("tsukemen-alert")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Checks Ramen Shop's dinner menu and alerts Slack when tsukemen is on it")
        .long_about(
            "Downloads the daily PDF menu, looks for the dish, reads the menu date and,\n\
            for menus not seen before, posts a Slack alert and archives the PDF to S3.\n\
            Settings are read from config.json or from MENU_SRC_URL, S3_ACCESS_KEY_ID,\n\
            S3_SECRET_ACCESS_KEY, S3_BUCKET, SLACK_API_TOKEN and SLACK_CHANNEL.",
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .help("Path to a JSON config file (default: ./config.json, then environment)")
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("keyword")
                .long("keyword")
                .value_name("DISH")
                .env("TSUKEMEN_KEYWORD")
                .default_value("tsukemen")
                .help("Dish to look for on the menu")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("interval")
                .long("interval")
                .value_name("SECONDS")
                .env("TSUKEMEN_INTERVAL")
                .help("Keep running and check the menu every SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Check the menu but do not post or upload anything")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("Only log errors")
                .action(ArgAction::SetTrue),
        )
}

async fn run_once<S: ObjectStore, N: Notifier>(
    watcher: &MenuWatcher<S, N>,
) -> anyhow::Result<Outcome> {
    let today = Local::now().date_naive();
    let outcome = watcher.check(today).await?;
    info!(target: "menu_check", today = %today, "Check finished: {}", outcome);
    if let Outcome::DryRun { message, .. } = &outcome {
        info!(target: "menu_check", "Would post: {}", message);
    }
    Ok(outcome)
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    // Logs go to stderr; RUST_LOG wins over the defaults.
    let default_level = if matches.get_flag("quiet") {
        "error"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let config_path = matches.get_one::<PathBuf>("config");
    let config = match Config::load(config_path.map(PathBuf::as_path)) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            process::exit(1);
        }
    };

    let menu_url = match url::Url::parse(&config.menu_src_url) {
        Ok(url) => url,
        Err(e) => {
            error!("Invalid MENU_SRC_URL: {}", e);
            process::exit(1);
        }
    };

    let fetcher = match MenuFetcher::new() {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to create menu fetcher: {}", e);
            process::exit(1);
        }
    };

    let store = match S3Store::from_config(&config) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to create S3 client: {}", e);
            process::exit(1);
        }
    };

    let notifier = match SlackNotifier::new(config.slack_api_token.clone()) {
        Ok(notifier) => notifier,
        Err(e) => {
            error!("Failed to create Slack client: {}", e);
            process::exit(1);
        }
    };

    let settings = WatchSettings {
        menu_url,
        keyword: matches
            .get_one::<String>("keyword")
            .cloned()
            .unwrap_or_else(|| "tsukemen".to_string()),
        bucket: config.s3_bucket.clone(),
        channel: config.slack_channel.clone(),
        dry_run: matches.get_flag("dry-run"),
    };

    info!(
        menu_url = %settings.menu_url,
        bucket = %settings.bucket,
        keyword = %settings.keyword,
        dry_run = settings.dry_run,
        "Starting tsukemen-alert"
    );

    let watcher = MenuWatcher::new(fetcher, store, notifier, settings);

    let Some(&interval) = matches.get_one::<u64>("interval") else {
        if let Err(e) = run_once(&watcher).await {
            error!("Menu check failed: {:#}", e);
            process::exit(1);
        }
        return;
    };

    info!("Checking the menu every {}s", interval);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_once(&watcher).await {
                    error!("Menu check failed: {:#}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; shutting down");
                break;
            }
        }
    }
}
