use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use merilearn_api::app::{app, AppState};
use merilearn_api::config::{self, AppConfig};
use merilearn_api::database::{ensure_schema, DatabaseManager};
use merilearn_api::groups::{
    CourseId, EnrollmentDirectory, GroupStore, GroupingSettings, MemoryStore, PeerGroupService,
    PgGroupStore, StudentId,
};
use merilearn_api::notify::notifier_from_config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Parser)]
#[command(name = "merilearn-api", version, about = "MeriLearn peer-group service")]
struct ServerArgs {
    /// Storage backend
    #[arg(long, env = "MERILEARN_STORE", value_enum, default_value_t = StoreKind::Postgres)]
    store: StoreKind,

    /// Shortcut for `--store memory`
    #[arg(long)]
    memory: bool,

    /// Enroll this many demo students (two courses) into the in-memory store
    #[arg(long, env = "MERILEARN_SEED_STUDENTS", default_value_t = 0)]
    seed_students: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();
    let args = ServerArgs::parse();

    // Initialize configuration (this loads the config singleton)
    let config: AppConfig = config::config().clone();
    init_tracing(&config);
    config.validate().context("invalid configuration")?;
    tracing::info!("Starting MeriLearn API in {:?} mode", config.environment);

    let settings = GroupingSettings::from_config(&config).context("invalid grouping settings")?;
    let notifier = notifier_from_config(&config.mail).context("invalid mail configuration")?;

    let directory: Arc<dyn EnrollmentDirectory>;
    let store: Arc<dyn GroupStore>;
    let mut database = None;

    if args.memory || args.store == StoreKind::Memory {
        let memory = Arc::new(MemoryStore::new());
        seed_demo_students(&memory, args.seed_students).await;
        tracing::warn!("Using in-memory store; data is lost on shutdown");
        directory = memory.clone();
        store = memory;
    } else {
        let manager = DatabaseManager::connect(&config.database).context("database setup failed")?;
        ensure_schema(manager.pool())
            .await
            .context("could not ensure peer group schema")?;
        let pg = Arc::new(PgGroupStore::new(manager.pool().clone()));
        directory = pg.clone();
        store = pg;
        database = Some(manager);
    }

    let groups = Arc::new(PeerGroupService::new(directory, store, notifier, settings));
    let port = config.api.port;
    let router = app(AppState::new(config, groups));

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("MeriLearn API listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(database) = database {
        database.close().await;
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let default = if config.database.enable_query_logging {
        "info,sqlx=debug"
    } else {
        "info,sqlx=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn seed_demo_students(store: &MemoryStore, count: u32) {
    for n in 1..=i64::from(count) {
        let course = CourseId(1 + n % 2);
        store
            .enroll(
                StudentId(n),
                &format!("Demo Student {}", n),
                &format!("student{}@merilearn.local", n),
                course,
            )
            .await;
    }
    if count > 0 {
        tracing::info!("Seeded {} demo students", count);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
