use anyhow::Result;
use bikeshare_ingest::config::AppConfig;
use bikeshare_ingest::db::Database;
use bikeshare_ingest::logging;
use bikeshare_ingest::pipeline::importer::import_file;
use bikeshare_ingest::pipeline::writer::TripWriter;
use bikeshare_ingest::server::{start_server, AppState};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "bikeshare-ingest")]
#[command(about = "Bicycle-share trip history CSV import service")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP import service
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Import a trip-history CSV from disk and exit
    Import {
        /// Path to the CSV file
        #[arg(long)]
        file: PathBuf,
        /// Rows per write batch (overrides BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }

            let db = Database::connect(&config.database).await?;
            db.run_migrations().await?;

            let port = config.port;
            let state = Arc::new(AppState { db, config });
            start_server(state, port).await?;
        }
        Commands::Import { file, batch_size } => {
            if let Some(batch_size) = batch_size {
                if batch_size == 0 {
                    anyhow::bail!("--batch-size must be positive");
                }
                config.batch_size = batch_size;
            }

            let db = Database::connect(&config.database).await?;
            db.run_migrations().await?;

            info!("Importing {}", file.display());
            let conn = db.acquire().await?;
            let writer = TripWriter::new(conn);
            let summary = import_file(&file, &writer, config.batch_size).await?;

            println!("\n📊 Import results for {}:", file.display());
            println!("   Rows read: {}", summary.rows_read);
            println!("   Batches written: {}", summary.batches_written);
            println!("   Rides inserted: {}", summary.rides_inserted);
            println!("   Stations inserted: {}", summary.stations_inserted);
            println!("   Coordinates inserted: {}", summary.coordinates_inserted);
        }
    }

    Ok(())
}
