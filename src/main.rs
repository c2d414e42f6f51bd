//! release-fetcher - Main entry point
//!
//! Searches a Soulseek daemon for music releases and supervises their download.

use anyhow::{Context, Result};
use release_fetcher::{
    load_blacklist, load_releases, BatchRunner, CliArgs, Config, DaemonClient, DownloadGate, MatchEngine,
    PollingHub, RetryScheduler, SearchScheduler, ServiceHandles, SummaryDisplay, TransferService,
    UnattendedDecisionMaker,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Set up panic handler for unexpected errors
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        let backtrace = std::backtrace::Backtrace::capture();
        if let Some(location) = panic_info.location() {
            error!(
                "PANIC occurred at {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }
        let payload = panic_info.payload();
        if let Some(s) = payload.downcast_ref::<&str>() {
            error!("Panic message: {}", s);
        } else if let Some(s) = payload.downcast_ref::<String>() {
            error!("Panic message: {}", s);
        } else {
            error!("Panic message: unknown");
        }
        error!("Backtrace:\n{:?}", backtrace);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_panic_handler();

    let args = CliArgs::parse_args();
    init_logging(&args);
    info!("release-fetcher starting");
    debug!("CLI arguments: {:?}", args);

    let config = Config::from_args(&args);
    config.validate().context("Invalid configuration")?;

    let display = SummaryDisplay::new(config.quiet);

    let client = Arc::new(DaemonClient::new(
        config.base_url.clone(),
        config.username.clone(),
        config.password.clone(),
    ));
    let gate = DownloadGate::new();
    let hub = Arc::new(PollingHub::new(client.clone(), gate.clone(), config.hub.clone()));
    let transfers = Arc::new(TransferService::new(client.clone(), gate.clone()));
    let retry = Arc::new(RetryScheduler::new(hub.clone(), transfers.clone(), config.retry.clone()));

    let mut services = ServiceHandles::new();
    {
        let hub = hub.clone();
        services.spawn("polling hub", async move { hub.run_polling_loop().await });
    }
    services.spawn("retry scheduler", async move { retry.run_retry_loop().await });

    if config.retry_only {
        display.print_status("Retrying failed transfers until interrupted")?;
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for interrupt")?;
        info!("Interrupted, shutting down");
        services.shutdown().await;
        return Ok(());
    }

    let releases_file = config
        .releases_file
        .as_deref()
        .context("No releases file given")?;
    let releases = match load_releases(releases_file) {
        Ok(releases) => releases,
        Err(e) => {
            display.print_error(&format!("Failed to load releases: {}", e))?;
            return Err(e);
        }
    };

    let blacklist = match &config.blacklist {
        Some(path) => load_blacklist(path).context("Failed to load blacklist")?,
        None => HashSet::new(),
    };
    let engine = Arc::new(MatchEngine::new(config.target_format.clone()).with_blacklist(blacklist));

    let scheduler = Arc::new(SearchScheduler::new(client.clone(), gate.clone(), config.search.clone()));
    if let Err(e) = scheduler.preload().await {
        warn!("Could not load existing searches: {}", e);
    }

    let runner = BatchRunner::new(
        scheduler,
        engine,
        Arc::new(UnattendedDecisionMaker::new(config.strict)),
        transfers,
        hub,
        config.supervisor.clone(),
    );

    display.print_status(&format!("Fetching {} releases", releases.len()))?;
    let summary = tokio::select! {
        summary = runner.run(releases) => summary,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            services.shutdown().await;
            return Ok(());
        }
    };
    services.shutdown().await;

    display.print_summary(&summary)?;
    let elapsed = display.elapsed();
    info!("release-fetcher finished in {:?}", elapsed);
    Ok(())
}

/// Initialize logging based on verbosity settings
fn init_logging(args: &CliArgs) {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if args.verbose {
        subscriber.pretty().init();
    } else {
        subscriber.compact().init();
    }

    debug!("Logging initialized");
}
