mod inputs;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use webcrack_common::protocol::{Selector, TaskResult};
use webcrack_engine::driver::{Driver, DriverFactory};
use webcrack_engine::{
    generate_tasks, AttemptOptions, CrackOptions, CrackOrchestrator, FormLocator,
};
use webcrack_h::{HeadlessDriverFactory, LaunchOptions};
use webcrack_ocr::OcrClient;

/// Web login testing tool: automatic form detection plus concurrent
/// credential testing against the detected controls.
#[derive(Parser, Debug)]
#[command(name = "webcrack", version, about)]
struct Args {
    /// Target login URLs
    #[arg(short = 'i', long = "inputs", value_delimiter = ',')]
    inputs: Vec<String>,

    /// File with one target URL per line
    #[arg(short = 'f', long = "inputs-file")]
    inputs_file: Option<PathBuf>,

    /// Logger level (trace|debug|info|warn|error)
    #[arg(long, default_value = "info")]
    level: String,

    /// Output file for the JSON result document
    #[arg(short = 'o', long = "output-file", default_value = "output.json")]
    output_file: PathBuf,

    /// Try every username with every password instead of pairing them
    #[arg(long)]
    crack_all: bool,

    /// Seconds to wait between tasks on one worker
    #[arg(long, default_value_t = 1)]
    delay: u64,

    /// Run the browser headless
    #[arg(long)]
    headless: bool,

    /// Only detect form selectors, do not attempt any login
    #[arg(long)]
    detect_only: bool,

    /// Attempts per task before giving up
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Stop after this many successes (0 = no limit)
    #[arg(long, default_value_t = 0)]
    max_crack_num: usize,

    /// Wall-clock budget for the whole run, in seconds
    #[arg(long, default_value_t = 300)]
    max_crack_time: u64,

    /// Navigation timeout per page load, in seconds
    #[arg(long, default_value_t = 10)]
    navigation_timeout: u64,

    /// Verification deadline per login attempt, in seconds
    #[arg(long, default_value_t = 10)]
    login_timeout: u64,

    /// Usernames
    #[arg(long = "user", value_delimiter = ',')]
    users: Vec<String>,

    /// File with one username per line
    #[arg(long)]
    user_file: Option<PathBuf>,

    /// Passwords; %user% expands to the task's username
    #[arg(long = "pass", value_delimiter = ',')]
    passes: Vec<String>,

    /// File with one password per line
    #[arg(long)]
    pass_file: Option<PathBuf>,

    /// Proxy server for the browser
    #[arg(long)]
    proxy: Option<String>,

    /// YAML file with selector overrides, skips auto-detection
    #[arg(long)]
    selector_file: Option<PathBuf>,

    /// Worker pool size
    #[arg(long, default_value_t = 3)]
    threads: usize,

    /// OCR service URL for captcha solving (empty = captcha disabled)
    #[arg(long, default_value = "")]
    ocr_url: String,
}

#[derive(Debug, Serialize)]
struct DetectionRecord {
    url: String,
    selectors: Selector,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.level)?;

    let urls = inputs::merge_list(&args.inputs, args.inputs_file.as_deref())?;
    if urls.is_empty() {
        bail!("no input URLs provided");
    }
    let users = inputs::merge_list(&args.users, args.user_file.as_deref())?;
    let passes = inputs::merge_list(&args.passes, args.pass_file.as_deref())?;
    info!(targets = urls.len(), "target URLs loaded");

    let launch = LaunchOptions {
        headless: args.headless,
        proxy: args.proxy.clone(),
        user_agent: None,
    };
    let factory: Arc<dyn DriverFactory> = Arc::new(HeadlessDriverFactory::new(launch));

    let solver = if args.ocr_url.is_empty() {
        None
    } else {
        Some(Arc::new(OcrClient::new(args.ocr_url.clone()).map_err(
            |e| anyhow::anyhow!("failed to create OCR client: {e}"),
        )?))
    };

    let navigation_timeout = Duration::from_secs(args.navigation_timeout);
    let selectors = resolve_selectors(&args, &urls, factory.as_ref(), solver.is_some()).await?;
    if selectors.is_empty() {
        bail!("no usable login form on any target");
    }

    if args.detect_only {
        let records: Vec<DetectionRecord> = selectors
            .into_iter()
            .map(|(url, selectors)| DetectionRecord { url, selectors })
            .collect();
        inputs::save_results(&records, &args.output_file)?;
        info!(output = %args.output_file.display(), "detection results written");
        return Ok(());
    }

    if users.is_empty() {
        bail!("no usernames provided");
    }

    let options = CrackOptions {
        crack_all: args.crack_all,
        delay: Duration::from_secs(args.delay),
        max_attempts: args.max_attempts,
        max_crack_num: args.max_crack_num,
        max_crack_time: Duration::from_secs(args.max_crack_time),
        threads: args.threads,
        navigation_timeout,
    };
    let attempt_options = AttemptOptions {
        login_timeout: Duration::from_secs(args.login_timeout),
        ..Default::default()
    };

    let mut orchestrator =
        CrackOrchestrator::new(Arc::clone(&factory), options).with_attempt_options(attempt_options);
    if let Some(solver) = solver {
        orchestrator = orchestrator.with_solver(solver);
    }

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let targets: Vec<String> = selectors.keys().cloned().collect();
    let results = if passes.is_empty() {
        // No passwords given: walk the built-in dictionary per credential,
        // one target at a time.
        info!("no passwords provided, using the built-in dictionary");
        let mut results = Vec::new();
        'outer: for url in &targets {
            for user in &users {
                if cancel.is_cancelled() {
                    break 'outer;
                }
                let selector = selectors.get(url).cloned();
                results.extend(
                    orchestrator
                        .crack_single(url, user, selector, cancel.clone())
                        .await,
                );
            }
        }
        results
    } else {
        let tasks = generate_tasks(&targets, &users, &passes, args.crack_all);
        orchestrator
            .run_with_cancel(tasks, selectors, cancel)
            .await
    };

    report(&results);
    inputs::save_results(&results, &args.output_file)?;
    info!(output = %args.output_file.display(), "results written");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping run");
            cancel.cancel();
        }
    });
}

/// One selector per target: loaded from the override file, or detected with
/// a dedicated browser session. Targets that fail detection are dropped
/// from the run with a warning.
async fn resolve_selectors(
    args: &Args,
    urls: &[String],
    factory: &dyn DriverFactory,
    captcha_enabled: bool,
) -> Result<HashMap<String, Selector>> {
    let mut selectors = HashMap::new();

    if let Some(path) = &args.selector_file {
        let selector = inputs::load_selector(path)?;
        info!(
            selector = %serde_json::to_string(&selector).unwrap_or_default(),
            "selector overrides loaded"
        );
        for url in urls {
            selectors.insert(url.clone(), selector.clone());
        }
        return Ok(selectors);
    }

    let mut driver = factory
        .create()
        .await
        .context("failed to create browser session for detection")?;
    let locator = FormLocator::new(captcha_enabled);
    let navigation_timeout = Duration::from_secs(args.navigation_timeout);

    for url in urls {
        let navigated =
            tokio::time::timeout(navigation_timeout, driver.navigate(url)).await;
        match navigated {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(url = %url, error = %e, "navigation failed, skipping target");
                continue;
            }
            Err(_) => {
                warn!(url = %url, "navigation timed out, skipping target");
                continue;
            }
        }

        match locator.detect(driver.as_mut()).await {
            Ok(selector) => {
                info!(
                    url = %url,
                    selector = %serde_json::to_string(&selector).unwrap_or_default(),
                    "selectors detected"
                );
                selectors.insert(url.clone(), selector);
            }
            Err(e) => {
                warn!(url = %url, error = %e, "form detection failed, skipping target");
            }
        }
    }

    if let Err(e) = driver.close().await {
        warn!(error = %e, "error closing detection session");
    }
    Ok(selectors)
}

fn report(results: &[TaskResult]) {
    let successes = results.iter().filter(|r| r.success).count();
    info!(
        total = results.len(),
        successes,
        failures = results.len() - successes,
        "run finished"
    );
    for result in results.iter().filter(|r| r.success) {
        info!(
            url = %result.task.url,
            username = %result.task.username,
            password = %result.task.password,
            attempts = result.attempts,
            "valid credentials found"
        );
    }
}
