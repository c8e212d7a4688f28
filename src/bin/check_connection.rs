//! Write one test document to confirm Firestore is reachable.

use portfolio_uploader_lib::connectivity::describe_failure;
use portfolio_uploader_lib::{check_connection, config, logging, FirebaseGateway, ServiceAccountKey, UploaderConfig};
use std::error::Error;
use std::process::ExitCode;

async fn run() -> Result<(), Box<dyn Error>> {
    let config = UploaderConfig::load()?;
    let key = ServiceAccountKey::load(&config.credentials_path)?;
    let gateway = FirebaseGateway::new(&key, &config)?;

    // A failed write is reported, not fatal
    match check_connection(&gateway, &config.connection_collection).await {
        Ok(report) => println!(
            "✅ Firestore connection OK, test document ID: {} ({:.2} ms)",
            report.id,
            report.latency.as_secs_f64() * 1000.0
        ),
        Err(e) => println!("❌ Firestore connection failed: {}", describe_failure(&e)),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let _guard = logging::init_tracing(config::get_logs_dir().as_deref());

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Connection check could not start");
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
