use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use patchscan::{AnalyzeRequest, Analyzer, ImageInput, PatchscanConfig};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: patchscan <image-path> [config.yaml]";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(image_path) = args.next() else {
        bail!(USAGE);
    };
    let config = match args.next() {
        Some(path) => PatchscanConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {path}"))?,
        None => PatchscanConfig::default(),
    }
    .with_env_overrides();

    let bytes = std::fs::read(&image_path)
        .with_context(|| format!("failed to read image {image_path}"))?;
    let mime_type = mime_for(Path::new(&image_path))
        .with_context(|| format!("cannot infer an image type for {image_path}"))?;

    let image = intake::normalize_image(&ImageInput::bytes(mime_type, bytes), &config.intake)
        .context("image rejected")?;

    let analyzer = Analyzer::from_config(config.into_analyzer_config())?;
    let response = analyzer
        .respond(&AnalyzeRequest::new(image.to_data_uri()))
        .await;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}
