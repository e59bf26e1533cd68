//! Game Data - bootstrap entry point.
//!
//! Connects to the configured database and manages the registered tables.

use clap::Parser;
use game_data::config::{Command, Config};
use game_data::db::{Database, Schemas, UnitOfWork};
use game_data::domains::{CharacterUnitSchema, UnitSchema};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

/// Every schema in dependency order.
fn schemas(database: Database) -> Schemas {
    Schemas::new(database)
        .add_schema(UnitSchema)
        .add_schema(CharacterUnitSchema)
}

async fn run(command: Command, database: &Database) -> game_data::DbResult<()> {
    let uow = UnitOfWork::Detached;
    let schemas = schemas(database.clone());

    match command {
        Command::Ping => info!("Database is reachable"),
        Command::CreateTables => schemas.create_all_tables(&uow).await?,
        Command::DropTables => schemas.drop_all_tables(&uow).await?,
        Command::Reset => {
            schemas.drop_all_tables(&uow).await?;
            schemas.create_all_tables(&uow).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine; the environment may already be set
    dotenvy::dotenv().ok();

    let config = Config::parse();
    init_tracing(&config);

    let command = config.command();
    info!(
        command = ?command,
        "Starting game-data v{}",
        env!("CARGO_PKG_VERSION")
    );

    let database = Database::connect(&config.database_config()).await?;
    let result = run(command, &database).await;
    database.disconnect().await;

    if let Err(e) = result {
        error!(
            error = %e,
            suggestion = e.suggestion().unwrap_or_default(),
            "Bootstrap failed"
        );
        return Err(e.into());
    }

    info!("Done");
    Ok(())
}
