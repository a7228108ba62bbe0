use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use goal_renderer::card::{GoalCard, GOAL_TEMPLATE};
use goal_renderer::config::Config;
use goal_renderer::engine::{EngineLauncher, WorkerLauncher};
use goal_renderer::generator::Generator;
use goal_renderer::health::HealthChecker;
use goal_renderer::lifecycle::Lifecycle;
use goal_renderer::observability::Metrics;
use goal_renderer::pool::WorkerPool;
use goal_renderer::server::{run_internal_server, InternalState};
use goal_renderer::service::ImageService;
use goal_renderer::storage::BucketStorage;
use goal_renderer::template::TemplateCache;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Directory for `render` output when not uploading.
const OUTPUT_DIR: &str = "output";

const USAGE: &str = "usage: goal_renderer [serve]\n       goal_renderer render <card.json> [--upload]";

enum Command {
    Serve,
    Render { card: PathBuf, upload: bool },
}

impl Command {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, BoxError> {
        match args.next().as_deref() {
            None | Some("serve") => Ok(Command::Serve),
            Some("render") => {
                let mut card = None;
                let mut upload = false;
                for arg in args {
                    match arg.as_str() {
                        "--upload" => upload = true,
                        _ if card.is_none() => card = Some(PathBuf::from(arg)),
                        other => return Err(format!("unexpected argument '{}'\n{}", other, USAGE).into()),
                    }
                }
                let card = card.ok_or_else(|| format!("missing card file\n{}", USAGE))?;
                Ok(Command::Render { card, upload })
            }
            Some(other) => Err(format!("unknown command '{}'\n{}", other, USAGE).into()),
        }
    }
}

/// Shared pieces built from configuration.
struct App {
    config: Config,
    pool: WorkerPool<EngineLauncher>,
    templates: Arc<TemplateCache>,
    metrics: Arc<Metrics>,
    health: Arc<HealthChecker>,
}

impl App {
    fn build(config: Config) -> Result<Self, BoxError> {
        let launcher = EngineLauncher::from_config(&config.render)?;
        let health = Arc::new(HealthChecker::new(launcher.name()));
        let pool = WorkerPool::new(launcher, &config.pool);
        let templates = Arc::new(TemplateCache::new(config.render.template_dir.clone()));
        let metrics = Arc::new(Metrics::new()?);

        Ok(Self {
            config,
            pool,
            templates,
            metrics,
            health,
        })
    }

    fn generator(&self) -> Generator<EngineLauncher> {
        Generator::new(
            self.pool.clone(),
            Arc::clone(&self.templates),
            self.config.render.max_retries(),
        )
        .with_metrics(Arc::clone(&self.metrics))
    }

    fn lifecycle(&self) -> Lifecycle<EngineLauncher> {
        Lifecycle::new(
            self.pool.clone(),
            Arc::clone(&self.health),
            self.config.server.drain_timeout,
        )
        .with_repair_interval(self.config.pool.repair_interval)
    }
}

fn main() -> Result<(), BoxError> {
    let command = Command::parse(std::env::args().skip(1))?;
    let config = Config::from_env()?;
    goal_renderer::logging::init(&config.logging)?;

    info!(version = goal_renderer::VERSION, "starting goal_renderer");
    config.log_summary();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let app = App::build(config)?;
    runtime.block_on(async move {
        match command {
            Command::Serve => serve(app).await,
            Command::Render { card, upload } => render(app, &card, upload).await,
        }
    })
}

/// Keep the pool warm and expose internal endpoints until a signal arrives.
async fn serve(app: App) -> Result<(), BoxError> {
    // Bound before the pool warms up so probes can report startup progress
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let internal = match app.config.server.internal_addr {
        Some(addr) => {
            let listener = TcpListener::bind(addr).await?;
            let state = Arc::new(InternalState::new(
                app.pool.clone(),
                Arc::clone(&app.health),
                Arc::clone(&app.metrics),
                Arc::clone(&app.templates),
            ));
            Some(tokio::spawn(run_internal_server(listener, state, shutdown_rx)))
        }
        None => None,
    };

    let lifecycle = app.lifecycle();
    if let Err(e) = lifecycle.startup().await {
        error!(error = %e, "pool startup failed");
        let _ = shutdown_tx.send(true);
        stop_internal(internal).await;
        return Err(e.into());
    }

    if let Err(e) = app.templates.load(GOAL_TEMPLATE).await {
        warn!(error = %e, "goal template not preloaded");
    }

    wait_for_signal().await;
    info!("Shutting down...");

    let drained = lifecycle.shutdown().await;
    let _ = shutdown_tx.send(true);
    stop_internal(internal).await;

    info!(drained, "shutdown complete");
    Ok(())
}

async fn stop_internal(handle: Option<JoinHandle<Result<(), BoxError>>>) {
    let Some(handle) = handle else {
        return;
    };
    match handle.await {
        Ok(Err(e)) => error!(error = %e, "internal server error"),
        Err(e) => error!(error = %e, "internal server task failed"),
        Ok(Ok(())) => {}
    }
}

/// One-shot render of a goal card file.
async fn render(app: App, path: &Path, upload: bool) -> Result<(), BoxError> {
    let raw = tokio::fs::read(path).await?;
    let card: GoalCard = serde_json::from_slice(&raw)?;

    let lifecycle = app.lifecycle();
    lifecycle.startup().await?;
    let generator = app.generator();

    let outcome = if upload {
        upload_card(&app, generator, &card).await
    } else {
        write_card(&app, &generator, &card).await
    };

    lifecycle.shutdown().await;
    outcome
}

async fn upload_card(
    app: &App,
    generator: Generator<EngineLauncher>,
    card: &GoalCard,
) -> Result<(), BoxError> {
    let storage = Arc::new(BucketStorage::from_config(&app.config.storage)?);
    let service = ImageService::new(generator, storage, app.config.render.dimensions)
        .with_metrics(Arc::clone(&app.metrics));

    let uploaded = service.generate_and_upload(card).await?;
    println!("{}", serde_json::to_string_pretty(&uploaded)?);
    Ok(())
}

async fn write_card(
    app: &App,
    generator: &Generator<EngineLauncher>,
    card: &GoalCard,
) -> Result<(), BoxError> {
    let request = card.render_request(app.config.render.dimensions)?;
    let png = generator.generate(&request).await?;

    tokio::fs::create_dir_all(OUTPUT_DIR).await?;
    let target = Path::new(OUTPUT_DIR).join(card.file_name());
    tokio::fs::write(&target, &png).await?;

    info!(path = %target.display(), bytes = png.len(), "image written");
    println!("{}", target.display());
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
                return;
            }
            Err(e) => warn!(error = %e, "SIGTERM handler unavailable"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
    }
}
