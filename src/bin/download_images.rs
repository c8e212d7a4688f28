//! Fetch the images listed in `image_data.json` into tag folders.

use portfolio_uploader_lib::{
    config, logging, DownloadOptions, DownloadReport, FirebaseGateway, ImageDownloader, ServiceAccountKey,
    UploaderConfig,
};
use std::error::Error;
use std::process::ExitCode;

async fn run() -> Result<DownloadReport, Box<dyn Error>> {
    let config = UploaderConfig::load()?;
    let key = ServiceAccountKey::load(&config.credentials_path)?;
    let gateway = FirebaseGateway::new(&key, &config)?;

    let options = DownloadOptions::from_config(&config);
    println!(
        "📥 Downloading images listed in {} to {}",
        options.manifest_path.display(),
        options.output_dir.display()
    );

    let report = ImageDownloader::new(&gateway, options).run().await?;
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
            tracing::error!(error = %e, "Download run aborted");
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
