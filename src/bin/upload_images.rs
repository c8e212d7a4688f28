//! Upload every image under the input directory and index it in Firestore.

use portfolio_uploader_lib::{
    config, logging, BatchOptions, BatchProcessor, BatchReport, FirebaseGateway, ImageUploader, ServiceAccountKey,
    UploaderConfig,
};
use std::error::Error;
use std::process::ExitCode;
use std::time::Duration;

async fn run() -> Result<BatchReport, Box<dyn Error>> {
    let config = UploaderConfig::load()?;
    let key = ServiceAccountKey::load(&config.credentials_path)?;
    let gateway = FirebaseGateway::new(&key, &config)?;

    println!(
        "🚀 Uploading images from {} to bucket {}",
        config.input_dir.display(),
        gateway.bucket()
    );

    let uploader = ImageUploader::new(
        &gateway,
        config.images_collection.clone(),
        Duration::from_secs(config.signed_url_ttl_secs),
    );
    let report = BatchProcessor::new(&uploader, BatchOptions::from_config(&config))
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
            tracing::error!(error = %e, "Upload run aborted");
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
