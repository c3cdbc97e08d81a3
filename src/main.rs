//! Subtrack command line.
//!
//! ```text
//! subtrack evaluate [YYYY-MM-DD]     queue reminders due from the given day (default: today)
//! subtrack dispatch                  deliver due reminders once
//! subtrack worker                    deliver continuously until Ctrl-C
//! subtrack calendar <user> [months]  print upcoming events as JSON
//! subtrack failures [days]           list reminders that failed recently
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use subtrack::adapters::{
    DispatchWorker, DispatchWorkerConfig, PostgresRecipientDirectory, PostgresReminderLedger,
    PostgresRuleSource, PostgresSubscriptionSource, ResendEmailChannel,
};
use subtrack::application::{
    CalendarQuery, CalendarQueryHandler, EvaluateRemindersHandler, ReminderDispatcher,
    ReminderMaintenanceHandler,
};
use subtrack::config::{AppConfig, ConfigError, RuntimeConfig};
use subtrack::domain::foundation::{DomainError, Timestamp, UserId};
use subtrack::ports::{ReminderLedger, RuleSource, SubscriptionSource};

const USAGE: &str = "usage: subtrack <evaluate [YYYY-MM-DD] | dispatch | worker | calendar <user> [months] | failures [days]>";

/// Default window for `failures`.
const DEFAULT_FAILURE_WINDOW_DAYS: u32 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Evaluate { reference_date: Option<NaiveDate> },
    Dispatch,
    Worker,
    Calendar { user_id: UserId, months_ahead: Option<u32> },
    Failures { days: u32 },
}

impl Command {
    fn parse(args: &[String]) -> Result<Self, CliError> {
        let usage = || CliError::Usage(USAGE.to_string());
        let (name, rest) = args.split_first().ok_or_else(usage)?;

        let command = match (name.as_str(), rest) {
            ("evaluate", []) => Command::Evaluate { reference_date: None },
            ("evaluate", [date]) => Command::Evaluate {
                reference_date: Some(parse_date(date)?),
            },
            ("dispatch", []) => Command::Dispatch,
            ("worker", []) => Command::Worker,
            ("calendar", [user]) => Command::Calendar {
                user_id: parse_user(user)?,
                months_ahead: None,
            },
            ("calendar", [user, months]) => Command::Calendar {
                user_id: parse_user(user)?,
                months_ahead: Some(parse_number(months)?),
            },
            ("failures", []) => Command::Failures {
                days: DEFAULT_FAILURE_WINDOW_DAYS,
            },
            ("failures", [days]) => Command::Failures {
                days: parse_number(days)?,
            },
            _ => return Err(usage()),
        };
        Ok(command)
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| CliError::Usage(format!("invalid date '{}': {}", raw, e)))
}

fn parse_user(raw: &str) -> Result<UserId, CliError> {
    UserId::new(raw).map_err(|e| CliError::Usage(format!("invalid user id: {}", e)))
}

fn parse_number(raw: &str) -> Result<u32, CliError> {
    raw.parse()
        .map_err(|_| CliError::Usage(format!("expected a positive number, got '{}'", raw)))
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Adapters wired against one pool.
struct Services {
    ledger: Arc<dyn ReminderLedger>,
    subscriptions: Arc<dyn SubscriptionSource>,
    rules: Arc<dyn RuleSource>,
    pool: PgPool,
}

impl Services {
    fn new(pool: PgPool, config: &AppConfig) -> Self {
        Self {
            ledger: Arc::new(PostgresReminderLedger::with_max_attempts(
                pool.clone(),
                config.scheduler.max_attempts,
            )),
            subscriptions: Arc::new(PostgresSubscriptionSource::new(pool.clone())),
            rules: Arc::new(PostgresRuleSource::new(pool.clone())),
            pool,
        }
    }

    fn dispatcher(&self, config: &AppConfig) -> Result<ReminderDispatcher, CliError> {
        let recipients = Arc::new(PostgresRecipientDirectory::new(self.pool.clone()));
        let channel = ResendEmailChannel::new(config.email.resend_config(), recipients)?;
        Ok(ReminderDispatcher::with_settings(
            self.ledger.clone(),
            self.subscriptions.clone(),
            Arc::new(channel),
            config.scheduler.dispatch_settings(),
        ))
    }
}

fn init_tracing(runtime: &RuntimeConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&runtime.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if runtime.json_logs() {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    let config = match AppConfig::load().map_err(CliError::from).and_then(|c| {
        c.validate().map_err(ConfigError::from)?;
        Ok(c)
    }) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.runtime);

    match run(command, config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when the command completed with partial failures.
async fn run(command: Command, config: AppConfig) -> Result<bool, CliError> {
    let pool = config.database.pool_options().connect(&config.database.url).await?;
    if config.database.run_migrations {
        sqlx::migrate!().run(&pool).await?;
        info!("Migrations applied");
    }
    let services = Services::new(pool, &config);

    match command {
        Command::Evaluate { reference_date } => {
            let now = Timestamp::now();
            let handler = EvaluateRemindersHandler::new(
                services.subscriptions.clone(),
                services.rules.clone(),
                services.ledger.clone(),
            )
            .with_concurrency(config.scheduler.evaluation_concurrency);

            let report = handler.run_all(reference_date.unwrap_or_else(|| now.date()), now).await?;
            info!(
                evaluated = report.subscriptions_evaluated,
                created = report.reminders_created,
                duplicates = report.duplicates,
                malformed = report.malformed,
                storage_errors = report.storage_errors,
                "Evaluation finished"
            );
            Ok(!report.is_partial_failure())
        }

        Command::Dispatch => {
            let dispatcher = services.dispatcher(&config)?;
            let now = Timestamp::now();
            dispatcher.recover_stale_claims(now).await?;
            let report = dispatcher.drain_and_send(now).await?;
            Ok(!report.has_storage_faults())
        }

        Command::Worker => {
            let dispatcher = Arc::new(services.dispatcher(&config)?);
            let worker = DispatchWorker::with_config(
                dispatcher,
                DispatchWorkerConfig::default().with_poll_interval(config.scheduler.poll_interval()),
            );

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Failed to listen for shutdown signal");
                }
                info!("Shutdown requested");
                let _ = shutdown_tx.send(true);
            });

            let total = worker.run(shutdown_rx).await;
            Ok(!total.has_storage_faults())
        }

        Command::Calendar { user_id, months_ahead } => {
            let handler = CalendarQueryHandler::new(services.subscriptions.clone(), services.rules.clone())
                .with_default_months_ahead(config.scheduler.calendar_months_ahead);
            let view = handler
                .handle(CalendarQuery {
                    user_id,
                    today: Timestamp::now().date(),
                    months_ahead,
                })
                .await?;

            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(view.skipped_subscriptions == 0)
        }

        Command::Failures { days } => {
            let handler = ReminderMaintenanceHandler::new(services.ledger.clone());
            let failures = handler.recent_failures(Timestamp::now(), days).await?;
            println!("{}", serde_json::to_string_pretty(&failures)?);
            Ok(true)
        }
    }
}
