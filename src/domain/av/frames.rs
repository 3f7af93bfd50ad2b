//! In-process last frame decoding, used when the ffmpeg CLI cannot produce one.

use crate::error::MediaError;
use std::path::{Path, PathBuf};

/// Translate an ffmpeg `-q:v` value (2 best, 31 worst) into a JPEG quality
/// percentage. Values already on the 1..=100 scale pass through.
pub fn jpeg_quality(quality: Option<u32>) -> u8 {
    match quality {
        Some(q @ 2..=31) => ((31 - q) as f64 / 29.0 * 90.0 + 10.0).round() as u8,
        Some(q @ 1..=100) => q as u8,
        _ => 95,
    }
}

#[cfg(feature = "native-frames")]
pub async fn decode_last_frame(
    video: &Path,
    output: &Path,
    quality: Option<u32>,
) -> Result<PathBuf, MediaError> {
    let source = video.to_path_buf();
    let target = output.to_path_buf();

    tokio::task::spawn_blocking(move || native::save_last_frame(&source, &target, quality))
        .await
        .map_err(|e| MediaError::FrameUnavailable(e.to_string()))??;
    Ok(output.to_path_buf())
}

#[cfg(not(feature = "native-frames"))]
pub async fn decode_last_frame(
    video: &Path,
    _output: &Path,
    _quality: Option<u32>,
) -> Result<PathBuf, MediaError> {
    Err(MediaError::FrameUnavailable(format!(
        "native decoding not built in, cannot read {}",
        video.display()
    )))
}

#[cfg(feature = "native-frames")]
mod native {
    use super::jpeg_quality;
    use crate::error::MediaError;
    use ffmpeg_next as ffmpeg;
    use image::codecs::jpeg::JpegEncoder;
    use image::RgbImage;
    use std::fs::{self, File};
    use std::io::BufWriter;
    use std::path::Path;

    fn unavailable(e: impl std::fmt::Display) -> MediaError {
        MediaError::FrameUnavailable(e.to_string())
    }

    pub fn save_last_frame(
        source: &Path,
        output: &Path,
        quality: Option<u32>,
    ) -> Result<(), MediaError> {
        ffmpeg::init().map_err(unavailable)?;

        let mut ictx = ffmpeg::format::input(&source).map_err(unavailable)?;
        let input_stream = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| unavailable("no video stream"))?;
        let stream_index = input_stream.index();

        let context_decoder =
            ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
                .map_err(unavailable)?;
        let mut decoder = context_decoder.decoder().video().map_err(unavailable)?;

        let mut decoded = ffmpeg::util::frame::Video::empty();
        let mut last: Option<ffmpeg::util::frame::Video> = None;

        for (stream, packet) in ictx.packets() {
            if stream.index() != stream_index {
                continue;
            }
            decoder.send_packet(&packet).map_err(unavailable)?;
            while decoder.receive_frame(&mut decoded).is_ok() {
                last = Some(decoded.clone());
            }
        }
        decoder.send_eof().map_err(unavailable)?;
        while decoder.receive_frame(&mut decoded).is_ok() {
            last = Some(decoded.clone());
        }

        let frame = last.ok_or_else(|| unavailable("video has no decodable frames"))?;

        let mut rgb = ffmpeg::util::frame::Video::empty();
        let mut scaler = ffmpeg::software::scaling::context::Context::get(
            frame.format(),
            frame.width(),
            frame.height(),
            ffmpeg::format::Pixel::RGB24,
            frame.width(),
            frame.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(unavailable)?;
        scaler.run(&frame, &mut rgb).map_err(unavailable)?;

        // Rows are padded to the stride, copy only the visible pixels.
        let width = rgb.width() as usize;
        let height = rgb.height() as usize;
        let stride = rgb.stride(0);
        let data = rgb.data(0);
        let mut pixels = Vec::with_capacity(width * height * 3);
        for row in 0..height {
            let start = row * stride;
            pixels.extend_from_slice(&data[start..start + width * 3]);
        }
        let img = RgbImage::from_raw(rgb.width(), rgb.height(), pixels)
            .ok_or_else(|| unavailable("frame buffer size mismatch"))?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let is_jpeg = output
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
            .unwrap_or(false);

        if is_jpeg {
            let writer = BufWriter::new(File::create(output)?);
            let encoder = JpegEncoder::new_with_quality(writer, jpeg_quality(quality));
            img.write_with_encoder(encoder).map_err(unavailable)?;
        } else {
            img.save(output).map_err(unavailable)?;
        }
        tracing::debug!(?output, "saved last frame natively");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ffmpeg_scale_maps_to_percent() {
        assert_eq!(jpeg_quality(Some(2)), 100);
        assert_eq!(jpeg_quality(Some(31)), 10);
        assert_eq!(jpeg_quality(Some(16)), 57);
    }

    #[test]
    fn percent_scale_passes_through() {
        assert_eq!(jpeg_quality(Some(1)), 1);
        assert_eq!(jpeg_quality(Some(85)), 85);
    }

    #[test]
    fn out_of_range_uses_default() {
        assert_eq!(jpeg_quality(None), 95);
        assert_eq!(jpeg_quality(Some(0)), 95);
        assert_eq!(jpeg_quality(Some(250)), 95);
    }

    #[cfg(not(feature = "native-frames"))]
    #[tokio::test]
    async fn without_native_support_reports_unavailable() {
        let err = decode_last_frame(Path::new("clip.mp4"), Path::new("f.png"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FrameUnavailable(_)));
    }
}
