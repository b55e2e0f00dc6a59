//! Print the diagnosis history as a table.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use dermabot::config::DEFAULT_DIAGNOSIS_LOG_PATH;
use dermabot::diagnosis_log::{load_records, render_table};

#[derive(Parser, Debug)]
#[command(name = "view_logs", about = "Show past skin lesion diagnoses")]
struct Cli {
    /// Diagnosis log file (JSON array of records)
    #[arg(short, long, env = "DIAGNOSIS_LOG_PATH", default_value = DEFAULT_DIAGNOSIS_LOG_PATH)]
    file: PathBuf,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let records = load_records(&cli.file)?;
    println!("{}", render_table(&records));
    Ok(())
}
