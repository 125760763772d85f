//! Best-effort media compression applied before chunking.
//!
//! Compression here is strictly an optimization: every failure path —
//! undecodable input, a missing `ffmpeg` binary, an output that came out
//! bigger than the input — falls back to the original bytes. The rest of
//! the pipeline never depends on compression having happened, and the
//! output length never exceeds the input length.

mod image_compress;
mod video_compress;

use tracing::{debug, warn};

/// Tuning knobs for the pre-compressor.
#[derive(Debug, Clone)]
pub struct CompressorConfig {
    /// Images are downscaled so their longest edge does not exceed this.
    pub max_image_edge: u32,
    /// Videos at or below this many bytes pass through untouched.
    pub video_passthrough_max: usize,
    /// Height cap for video transcode output.
    pub video_max_height: u32,
    /// Bitrate cap for video transcode output, in kbit/s.
    pub video_bitrate_kbps: u32,
    /// Path to the `ffmpeg` binary.
    pub ffmpeg_path: String,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            max_image_edge: 2048,
            video_passthrough_max: 50 * 1024 * 1024,
            video_max_height: 1080,
            video_bitrate_kbps: 2500,
            ffmpeg_path: "ffmpeg".into(),
        }
    }
}

/// Result of a compression pass.
#[derive(Debug, Clone)]
pub struct CompressedMedia {
    pub data: Vec<u8>,
    /// MIME type of `data` — format conversion (e.g. PNG → JPEG, any video
    /// container → MP4) changes it from the declared input type.
    pub mime_type: String,
    pub original_len: usize,
    /// `false` when the original bytes came back unchanged.
    pub compressed: bool,
}

/// Best-effort size reduction for images and video.
pub struct MediaCompressor {
    config: CompressorConfig,
}

impl Default for MediaCompressor {
    fn default() -> Self {
        Self::new(CompressorConfig::default())
    }
}

impl MediaCompressor {
    pub fn new(config: CompressorConfig) -> Self {
        Self { config }
    }

    /// Compresses `data` according to its declared MIME type. Never fails
    /// and never grows the payload: anything unprocessable comes back
    /// unchanged.
    pub async fn compress(&self, data: Vec<u8>, mime_type: &str) -> CompressedMedia {
        let original_len = data.len();

        let attempt = if mime_type.starts_with("image/") {
            self.compress_image(&data).await
        } else if mime_type.starts_with("video/") {
            self.compress_video(&data).await
        } else {
            None
        };

        match attempt {
            // The size guarantee is enforced here, at the one exit point.
            Some((out, out_mime)) if out.len() < original_len => {
                debug!(
                    mime = mime_type,
                    before = original_len,
                    after = out.len(),
                    "media compressed"
                );
                CompressedMedia {
                    data: out,
                    mime_type: out_mime,
                    original_len,
                    compressed: true,
                }
            }
            _ => CompressedMedia {
                data,
                mime_type: mime_type.to_string(),
                original_len,
                compressed: false,
            },
        }
    }

    async fn compress_image(&self, data: &[u8]) -> Option<(Vec<u8>, String)> {
        let input = data.to_vec();
        let max_edge = self.config.max_image_edge;
        // Image decode/encode is CPU-bound; keep it off the async pool.
        let result =
            tokio::task::spawn_blocking(move || image_compress::compress_image(&input, max_edge))
                .await;
        match result {
            Ok(Ok(encoded)) => Some((encoded.data, encoded.mime_type.to_string())),
            Ok(Err(e)) => {
                warn!(error = %e, "image compression failed, keeping original");
                None
            }
            Err(e) => {
                warn!(error = %e, "image compression task failed, keeping original");
                None
            }
        }
    }

    async fn compress_video(&self, data: &[u8]) -> Option<(Vec<u8>, String)> {
        if data.len() <= self.config.video_passthrough_max {
            return None;
        }
        match video_compress::transcode(data, &self.config).await {
            Ok(out) => Some((out, "video/mp4".to_string())),
            Err(e) => {
                warn!(error = %e, "video transcode failed, keeping original");
                None
            }
        }
    }
}
