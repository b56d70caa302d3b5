//! Caixa Smoke Harness
//!
//! Drives one full worker lifecycle against a live origin: install and
//! activate, serve a list of paths cache-first, replay some of them with the
//! network cut off, relay a push message and click it. Prints a JSON report.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use async_trait::async_trait;
use caixa_common::{init_logging, LogConfig, LogFormat};
use caixa_net::{HttpNetwork, LoaderConfig};
use caixa_sw::{
    CacheStorage, Clients, EventOutcome, FetchRequest, FetchResponse, Network,
    NotificationCenter, NotificationClickEvent, PromiseWorker, PushEvent,
    ServiceWorkerRegistration, SwError, SwResult, WorkerConfig, WorkerHost, CACHE_NAME_ENV,
};
use serde_json::json;
use tracing::info;
use url::Url;

#[derive(Default)]
struct Phase {
    runs: u32,
    total: Duration,
    slowest: Duration,
}

/// Wall-clock time spent per harness phase.
#[derive(Default)]
struct Stopwatch {
    phases: RefCell<BTreeMap<&'static str, Phase>>,
}

impl Stopwatch {
    fn lap(&self, phase: &'static str, started: Instant) {
        let elapsed = started.elapsed();
        let mut phases = self.phases.borrow_mut();
        let entry = phases.entry(phase).or_default();
        entry.runs += 1;
        entry.total += elapsed;
        entry.slowest = entry.slowest.max(elapsed);
    }

    fn report(&self) -> serde_json::Value {
        let ms = |d: Duration| (d.as_secs_f64() * 100_000.0).round() / 100.0;
        self.phases
            .borrow()
            .iter()
            .map(|(name, phase)| {
                let entry = json!({
                    "runs": phase.runs,
                    "total_ms": ms(phase.total),
                    "slowest_ms": ms(phase.slowest),
                });
                (name.to_string(), entry)
            })
            .collect::<serde_json::Map<_, _>>()
            .into()
    }
}

/// Network wrapper that can simulate losing connectivity.
struct Switchable {
    inner: HttpNetwork,
    offline: AtomicBool,
}

#[async_trait]
impl Network for Switchable {
    async fn fetch(&self, request: &FetchRequest) -> SwResult<FetchResponse> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SwError::Network("simulated offline".into()));
        }
        self.inner.fetch(request).await
    }
}

struct Args {
    origin: Option<String>,
    config: Option<PathBuf>,
    snapshot: Option<PathBuf>,
    paths: Vec<String>,
    offline_paths: Vec<String>,
    push: Option<String>,
    log_format: Option<LogFormat>,
    verbose: bool,
}

impl Args {
    fn parse() -> anyhow::Result<Self> {
        let mut args = std::env::args().skip(1);
        let mut parsed = Self {
            origin: None,
            config: None,
            snapshot: None,
            paths: Vec::new(),
            offline_paths: Vec::new(),
            push: None,
            log_format: None,
            verbose: false,
        };

        while let Some(arg) = args.next() {
            let mut value = || {
                args.next()
                    .with_context(|| format!("{arg} expects a value"))
            };
            match arg.as_str() {
                "--origin" => parsed.origin = Some(value()?),
                "--config" => parsed.config = Some(PathBuf::from(value()?)),
                "--snapshot" => parsed.snapshot = Some(PathBuf::from(value()?)),
                "--path" => parsed.paths.push(value()?),
                "--offline-path" => parsed.offline_paths.push(value()?),
                "--push" => parsed.push = Some(value()?),
                "--log-format" => parsed.log_format = Some(value()?.parse()?),
                "--verbose" | "-v" => parsed.verbose = true,
                other => bail!("unknown argument {other}"),
            }
        }

        Ok(parsed)
    }

    fn worker_config(&self) -> anyhow::Result<WorkerConfig> {
        let config = match (&self.config, &self.origin) {
            (Some(path), _) => WorkerConfig::load(path)?,
            (None, Some(origin)) => {
                let origin = Url::parse(origin).context("invalid --origin")?;
                WorkerConfig::new(origin)
            }
            (None, None) => bail!("either --origin or --config is required"),
        };
        let config = config.with_cache_name_override(std::env::var(CACHE_NAME_ENV).ok());
        config.validate()?;
        Ok(config)
    }
}

/// Paths without a file extension are treated as page navigations.
fn request_for(config: &WorkerConfig, path: &str) -> anyhow::Result<FetchRequest> {
    let url = config.resolve(path)?;
    let last = url.path_segments().and_then(|mut s| s.next_back()).unwrap_or("");
    Ok(if last.contains('.') {
        FetchRequest::get(url)
    } else {
        FetchRequest::navigate(url)
    })
}

fn describe(outcome: &EventOutcome) -> serde_json::Value {
    match outcome {
        EventOutcome::RespondWith(r) => json!({
            "status": r.status,
            "from_cache": r.from_cache,
            "bytes": r.body.len(),
        }),
        EventOutcome::Passthrough => json!("passthrough"),
        EventOutcome::Completed => json!("completed"),
    }
}

async fn serve_all(
    registration: &ServiceWorkerRegistration,
    config: &WorkerConfig,
    paths: &[String],
    clock: &Stopwatch,
    label: &'static str,
) -> anyhow::Result<serde_json::Value> {
    let mut results = serde_json::Map::new();
    for path in paths {
        let request = request_for(config, path)?;
        let started = Instant::now();
        let outcome = registration.fetch(request).await?;
        clock.lap(label, started);
        info!(path = %path, outcome = %describe(&outcome), "Served");
        results.insert(path.clone(), describe(&outcome));
    }
    Ok(serde_json::Value::Object(results))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse()?;
    let mut log_config = LogConfig::from_env()?;
    if args.verbose {
        log_config = LogConfig::verbose().with_format(log_config.format);
    }
    if let Some(format) = args.log_format {
        log_config = log_config.with_format(format);
    }
    init_logging(log_config)?;

    let config = args.worker_config()?;
    info!(
        origin = %config.origin,
        cache = %config.cache_name,
        assets = config.precache.len(),
        "Starting caixa smoke harness"
    );

    let storage = match &args.snapshot {
        Some(path) if path.exists() => CacheStorage::load_snapshot(path).await?,
        _ => CacheStorage::new(),
    };
    let caches = storage.shared();
    let network = Arc::new(Switchable {
        inner: HttpNetwork::new(LoaderConfig::default())?,
        offline: AtomicBool::new(false),
    });
    let notifications = Arc::new(NotificationCenter::new());
    let clients = Arc::new(Clients::new());
    let host = WorkerHost::new(
        Arc::clone(&caches),
        network.clone(),
        notifications.clone(),
        clients.clone(),
    );

    let clock = Stopwatch::default();
    let mut registration = ServiceWorkerRegistration::new(config.origin.clone());
    let worker = Arc::new(PromiseWorker::new(config.clone(), host)?);

    let started = Instant::now();
    let state = registration.update(worker).await;
    clock.lap("install_activate", started);
    let state = state.context("worker update failed")?;
    info!(state = ?state, "Worker updated");

    let online = serve_all(&registration, &config, &args.paths, &clock, "fetch_online").await?;

    network.offline.store(true, Ordering::SeqCst);
    let offline =
        serve_all(&registration, &config, &args.offline_paths, &clock, "fetch_offline").await?;
    network.offline.store(false, Ordering::SeqCst);

    if let Some(payload) = &args.push {
        let started = Instant::now();
        registration.push(PushEvent::new(payload.as_bytes())).await?;
        clock.lap("push", started);

        if let Some(shown) = notifications.shown().await.last().cloned() {
            let started = Instant::now();
            registration
                .notification_click(NotificationClickEvent {
                    notification: shown.id,
                    data: shown.descriptor.data.clone(),
                })
                .await?;
            clock.lap("notification_click", started);
        }
    }

    if let Some(path) = &args.snapshot {
        caches.read().await.save_snapshot(path).await?;
    }

    let cache_report: serde_json::Map<String, serde_json::Value> = {
        let storage = caches.read().await;
        storage
            .keys()
            .into_iter()
            .map(|name| {
                let mut keys: Vec<&str> = storage.get(name).map(|c| c.keys()).unwrap_or_default();
                keys.sort_unstable();
                (name.to_string(), json!(keys))
            })
            .collect()
    };
    let windows: Vec<_> = clients
        .all()
        .await
        .into_iter()
        .map(|c| json!({ "url": c.url.as_str(), "focused": c.focused }))
        .collect();

    let report = json!({
        "state": format!("{state:?}"),
        "cache_name": config.cache_name,
        "online": online,
        "offline": offline,
        "caches": cache_report,
        "notifications": notifications.shown().await,
        "windows": windows,
        "timings": clock.report(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
