use std::process::Stdio;

use tokio::process::Command;

use crate::CompressorConfig;

#[derive(Debug, thiserror::Error)]
pub(crate) enum VideoCompressError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ffmpeg failed: {0}")]
    Ffmpeg(String),
}

/// Transcodes a video to H.264/MP4 with capped height and bitrate.
///
/// The payload takes a round trip through a scratch directory because
/// ffmpeg needs seekable files on both ends.
pub(crate) async fn transcode(
    data: &[u8],
    config: &CompressorConfig,
) -> Result<Vec<u8>, VideoCompressError> {
    let dir = tempfile::tempdir()?;
    let input_path = dir.path().join("input.bin");
    let output_path = dir.path().join("output.mp4");
    tokio::fs::write(&input_path, data).await?;

    // -2 keeps the width even, which libx264 requires.
    let scale = format!("scale=-2:'min({},ih)'", config.video_max_height);
    let bitrate = format!("{}k", config.video_bitrate_kbps);

    let output = Command::new(&config.ffmpeg_path)
        .arg("-y")
        .arg("-i")
        .arg(&input_path)
        .args(["-vf", &scale])
        .args(["-c:v", "libx264"])
        .args(["-b:v", &bitrate])
        .args(["-preset", "fast"])
        .args(["-c:a", "aac"])
        .args(["-movflags", "+faststart"])
        .arg(&output_path)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VideoCompressError::Ffmpeg(stderr.trim().to_string()));
    }

    Ok(tokio::fs::read(&output_path).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_errors() {
        let config = CompressorConfig {
            ffmpeg_path: "/nonexistent/ffmpeg".into(),
            ..CompressorConfig::default()
        };
        let result = transcode(&[0u8; 128], &config).await;
        assert!(result.is_err());
    }
}
