//! Command-line front end for the optimizer API: uploads each file in turn,
//! reports per-file outcomes, and can bundle the results into a ZIP.

use clap::Parser;
use image_optimizer_backend::client::{
    ApiClient, FileStatus, UploadQueue, mime_for_path, process_queue,
};
use image_optimizer_backend::models::{OptimizationSettings, OutputFormat};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Optimize images through the backend API")]
struct Args {
    /// Base URL of the optimizer server
    #[arg(short, long, default_value = "http://localhost:3000")]
    server: String,

    /// Output format: keep, jpeg, png, webp or avif
    #[arg(short, long, default_value = "keep")]
    format: String,

    /// Lossy-compression quality (10-100)
    #[arg(short, long, default_value_t = 85)]
    quality: u8,

    /// Write a ZIP bundle of all optimized files to this path
    #[arg(short, long)]
    zip: Option<PathBuf>,

    /// Image files to optimize
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let format: OutputFormat = serde_json::from_value(serde_json::Value::String(
        args.format.to_lowercase(),
    ))
    .map_err(|_| anyhow::anyhow!("unknown format '{}'", args.format))?;
    let settings = OptimizationSettings {
        format,
        quality: args.quality,
    };

    // Read every input up front so validation problems surface before the
    // first request goes out.
    let mut inputs: Vec<(String, String, Vec<u8>)> = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let mime = mime_for_path(path)
            .ok_or_else(|| anyhow::anyhow!("unsupported file type: {}", path.display()))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow::anyhow!("invalid filename: {}", path.display()))?
            .to_string();
        let bytes = std::fs::read(path)?;
        inputs.push((name, mime.to_string(), bytes));
    }

    let client = ApiClient::new(&args.server);
    let mut queue = UploadQueue::new(inputs.iter().map(|(name, _, _)| name.clone()));

    process_queue(&client, &mut queue, &inputs, &settings).await?;

    let mut failures = 0;
    for file in queue.files() {
        match file.status {
            FileStatus::Completed => {
                let result = file.result.as_ref().expect("completed file has a result");
                println!(
                    "✅ {}: {} -> {} bytes ({}%)",
                    file.name, result.original_size, result.optimized_size,
                    result.compression_ratio
                );
            }
            _ => {
                failures += 1;
                println!(
                    "❌ {}: {}",
                    file.name,
                    file.error.as_deref().unwrap_or("not processed")
                );
            }
        }
    }

    if let Some(zip_path) = args.zip {
        let completed: Vec<(String, Vec<u8>)> = queue
            .completed()
            .map(|(name, result)| (name.to_string(), result.bytes.clone()))
            .collect();

        if completed.is_empty() {
            anyhow::bail!("no optimized files to bundle");
        }

        let zip_bytes = client.download_zip(completed).await?;
        std::fs::write(&zip_path, &zip_bytes)?;
        println!("📦 Wrote {} bytes to {}", zip_bytes.len(), zip_path.display());
    }

    if failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}
