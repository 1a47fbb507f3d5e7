mod config;
mod display;
mod error;
mod form;
mod parser;
mod schedule;
mod stats;
mod store;
mod web;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use display::{print_outcome, write_board_to_file};
use form::export_board_to_csv;
use parser::load_registrations;
use schedule::{Category, OfficerSession, SortKey, UtcOffset};

#[derive(Parser)]
#[command(name = "officer-scheduler", about = "Alliance officer slot scheduling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the web server
    Web {
        /// Overrides PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Fill all three boards from a roster CSV
    Assign {
        csv: PathBuf,
        /// UTC time of the first slot
        #[arg(long, default_value = "00:00")]
        utc_offset: UtcOffset,
        /// accel, fire-sparkle, fire-gem or refined-fire-gem
        #[arg(long, default_value = "accel")]
        sort_by: SortKey,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Web { port } => {
            let mut config = Config::load()?;
            if let Some(port) = port {
                config.port = port;
            }
            web::start_server(config).await?;
        }
        Command::Assign {
            csv,
            utc_offset,
            sort_by,
            out_dir,
        } => run_assign(&csv, utc_offset, sort_by, &out_dir)?,
    }

    Ok(())
}

/// Research first, then training, then building; a player placed on an
/// earlier board is skipped on the later ones.
fn run_assign(
    csv: &Path,
    utc_offset: UtcOffset,
    sort_by: SortKey,
    out_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading registrations from CSV...");
    let registrations = load_registrations(csv)?;
    println!("Loaded {} registrations (resubmissions merged)", registrations.len());

    let mut session = OfficerSession::new("cli", utc_offset);
    println!(
        "\n\n=== Running Auto-Assigner (by {}, window starts {} UTC) ===",
        sort_by.label(),
        session.utc_offset()
    );
    for category in Category::ALL {
        let outcome = session.auto_assign(category, &registrations, sort_by);
        print_outcome(&outcome, &registrations);
    }

    // Write schedules to files
    println!("\n=== Writing Schedules to Files ===");
    std::fs::create_dir_all(out_dir)?;
    for category in Category::ALL {
        let board = session.board(category);
        let text_path = out_dir.join(format!("schedule_{}.txt", category));
        let csv_path = out_dir.join(format!("schedule_{}.csv", category));
        write_board_to_file(board, &text_path)?;
        export_board_to_csv(board, &csv_path)?;
        info!("Wrote {} and {}", text_path.display(), csv_path.display());
    }
    println!("Schedules saved to {}", out_dir.display());

    Ok(())
}
