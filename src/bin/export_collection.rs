//! Save every document of the images collection as one JSON file.

use portfolio_uploader_lib::{
    config, logging, CollectionExporter, ExportOptions, ExportReport, FirebaseGateway, ServiceAccountKey,
    UploaderConfig,
};
use std::error::Error;
use std::process::ExitCode;

async fn run() -> Result<ExportReport, Box<dyn Error>> {
    let config = UploaderConfig::load()?;
    let key = ServiceAccountKey::load(&config.credentials_path)?;
    let gateway = FirebaseGateway::new(&key, &config)?;

    println!(
        "📥 Exporting collection '{}' to {}",
        config.images_collection,
        config.export_dir.display()
    );

    let report = CollectionExporter::new(&gateway, ExportOptions::from_config(&config))
        .run()
        .await?;

    Ok(report)
}

#[tokio::main]
async fn main() -> ExitCode {
    let _guard = logging::init_tracing(config::get_logs_dir().as_deref());

    match run().await {
        Ok(report) => {
            println!("\n{}", report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Export aborted");
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
