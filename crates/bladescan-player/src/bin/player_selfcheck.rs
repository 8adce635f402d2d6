use std::path::Path;

use bladescan_media::{check_ffmpeg, check_ffprobe};
use bladescan_ml_client::InferenceClient;
use bladescan_player::PlayerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = PlayerConfig::from_env();

    println!(
        "player-selfcheck: starting with output_dir={}",
        config.output_dir.display()
    );
    ensure_output_dir(&config.output_dir).await?;
    ensure_tools()?;
    ensure_font(config.font_path.as_deref())?;
    ensure_service().await?;

    println!("player-selfcheck: ok");
    Ok(())
}

async fn ensure_output_dir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

fn ensure_tools() -> anyhow::Result<()> {
    let ffmpeg = check_ffmpeg().map_err(|e| anyhow::anyhow!("{}", e))?;
    let ffprobe = check_ffprobe().map_err(|e| anyhow::anyhow!("{}", e))?;
    println!(
        "player-selfcheck: ffmpeg={} ffprobe={}",
        ffmpeg.display(),
        ffprobe.display()
    );
    Ok(())
}

fn ensure_font(path: Option<&Path>) -> anyhow::Result<()> {
    if let Some(path) = path {
        if !path.is_file() {
            return Err(anyhow::anyhow!("font not found at {}", path.display()));
        }
    }
    Ok(())
}

async fn ensure_service() -> anyhow::Result<()> {
    let client = InferenceClient::from_env()?;
    if !client.health_check().await {
        return Err(anyhow::anyhow!(
            "detection service at {} is not healthy",
            client.config().base_url
        ));
    }
    Ok(())
}
