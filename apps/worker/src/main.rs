//! Geogrant expiration reconciler worker.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use geogrant_application::{
    AuthorizationService, Clock, EffectiveAccessService, ExpirationReconciler, SweepOutcome,
    SystemClock,
};
use geogrant_core::{AppError, AppResult};
use geogrant_infrastructure::{
    PostgresAuditRepository, PostgresAuthorizationRepository, PostgresGrantStore,
};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    worker_id: String,
    interval_seconds: u64,
    batch_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerCommand {
    Run,
    SweepOnce,
    RebuildAccess,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let command = parse_command(env::args().nth(1).as_deref())?;
    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match command {
        WorkerCommand::RebuildAccess => {
            let rows = build_effective_access_service(pool, clock).rebuild().await?;
            info!(worker_id = %config.worker_id, rows, "effective-access projection rebuilt");
            Ok(())
        }
        WorkerCommand::SweepOnce => {
            let reconciler = build_reconciler(pool, clock, &config)?;
            match reconciler.sweep().await? {
                SweepOutcome::Completed(report) => info!(
                    worker_id = %config.worker_id,
                    examined = report.examined,
                    expired = report.expired,
                    "expiration sweep finished"
                ),
                SweepOutcome::Skipped => warn!(
                    worker_id = %config.worker_id,
                    "expiration sweep skipped"
                ),
            }
            Ok(())
        }
        WorkerCommand::Run => {
            let reconciler = build_reconciler(pool, clock, &config)?;

            info!(
                worker_id = %config.worker_id,
                interval_seconds = config.interval_seconds,
                batch_size = config.batch_size,
                "geogrant-worker started"
            );

            reconciler
                .run(Duration::from_secs(config.interval_seconds), shutdown_signal())
                .await;

            info!(worker_id = %config.worker_id, "geogrant-worker stopped");
            Ok(())
        }
    }
}

fn parse_command(argument: Option<&str>) -> AppResult<WorkerCommand> {
    match argument {
        None | Some("run") => Ok(WorkerCommand::Run),
        Some("sweep") => Ok(WorkerCommand::SweepOnce),
        Some("rebuild") => Ok(WorkerCommand::RebuildAccess),
        Some(other) => Err(AppError::Validation(format!(
            "unknown worker command '{other}', expected one of: run, sweep, rebuild"
        ))),
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .map_err(|error| AppError::Storage(format!("failed to connect to database: {error}")))
}

fn build_reconciler(
    pool: PgPool,
    clock: Arc<dyn Clock>,
    config: &WorkerConfig,
) -> AppResult<ExpirationReconciler> {
    let grant_store = Arc::new(PostgresGrantStore::new(pool.clone()));

    ExpirationReconciler::new(
        grant_store.clone(),
        grant_store,
        Arc::new(PostgresAuditRepository::new(pool)),
        clock,
        config.worker_id.clone(),
        config.batch_size,
    )
}

fn build_effective_access_service(pool: PgPool, clock: Arc<dyn Clock>) -> EffectiveAccessService {
    let grant_store = Arc::new(PostgresGrantStore::new(pool.clone()));
    let authorization_service =
        AuthorizationService::new(Arc::new(PostgresAuthorizationRepository::new(pool)));

    EffectiveAccessService::new(
        authorization_service,
        grant_store.clone(),
        grant_store,
        clock,
    )
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "failed to listen for shutdown signal");
    }
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let worker_id = env::var("WORKER_ID")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| format!("worker-{}", std::process::id()));
        let interval_seconds = parse_env_u64("RECONCILER_INTERVAL_SECONDS", 30)?;
        let batch_size = parse_env_usize("RECONCILER_BATCH_SIZE", 100)?;

        if interval_seconds == 0 {
            return Err(AppError::Validation(
                "RECONCILER_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        if batch_size == 0 {
            return Err(AppError::Validation(
                "RECONCILER_BATCH_SIZE must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            worker_id,
            interval_seconds,
            batch_size,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_usize(name: &str, default: usize) -> AppResult<usize> {
    match env::var(name) {
        Ok(value) => value.trim().parse::<usize>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.trim().parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use geogrant_core::AppError;

    use super::{WorkerCommand, parse_command};

    #[test]
    fn commands_default_to_run() {
        assert_eq!(parse_command(None).ok(), Some(WorkerCommand::Run));
        assert_eq!(parse_command(Some("run")).ok(), Some(WorkerCommand::Run));
        assert_eq!(
            parse_command(Some("sweep")).ok(),
            Some(WorkerCommand::SweepOnce)
        );
        assert_eq!(
            parse_command(Some("rebuild")).ok(),
            Some(WorkerCommand::RebuildAccess)
        );
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(matches!(
            parse_command(Some("purge")),
            Err(AppError::Validation(_))
        ));
    }
}
