// Run `cargo run --example basic_usage -- <path to a trip CSV or Parquet file>` to execute this example

use std::error::Error;
use std::path::PathBuf;

use datafusion::prelude::SessionContext;
use trip_loader::fetcher::load_file;
use trip_loader::normalizer::Normalizer;
use trip_loader::summary::{DataPeriod, TripSummary};
use trip_loader::transformers::dictionary::CodeLabelMapper;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("nyc_taxi_data.csv"));

    // Load the file and clean it
    let ctx = SessionContext::new();
    let loaded = load_file(&ctx, &path).await?;
    println!("Read {} rows and {} columns", loaded.rows, loaded.columns);

    let cleaned = Normalizer::default().normalize(loaded.frame).await?;
    println!("Removed {} duplicates", cleaned.report.duplicates_removed());

    // Replace the code columns with readable labels
    let labelled = CodeLabelMapper::nyc_taxi().transform(cleaned.frame)?;
    labelled.clone().limit(0, Some(5))?.show().await?;

    if let Some(period) = DataPeriod::detect(&labelled).await? {
        println!("Period: {}", period);
    }
    for insight in TripSummary::compute(&labelled).await?.insights() {
        println!("- {}", insight);
    }

    Ok(())
}
