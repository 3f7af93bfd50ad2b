use super::cmd::FfmpegRunner;
use super::frames::decode_last_frame;
use crate::error::MediaError;
use crate::ports::editor::{BackgroundOptions, MergeOptions, VideoEditor};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::fs;

const H264: [&str; 6] = ["-c:v", "libx264", "-preset", "veryfast", "-crf", "18"];
const AAC: [&str; 4] = ["-c:a", "aac", "-b:a", "192k"];

/// [`VideoEditor`] backed by the ffmpeg command line.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEditor<R> {
    runner: R,
}

impl<R: FfmpegRunner> FfmpegEditor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    async fn ensure_ffmpeg(&self) -> Result<(), MediaError> {
        if self.runner.ffmpeg_available().await {
            Ok(())
        } else {
            Err(MediaError::FfmpegNotFound)
        }
    }

    async fn run_ffmpeg(&self, args: Vec<String>) -> Result<(), MediaError> {
        let output = self.runner.ffmpeg(args).await?;
        check(output, "ffmpeg").map(|_| ())
    }

    /// Duration of a media file in seconds.
    pub async fn probe_duration(&self, media: &Path) -> Result<f64, MediaError> {
        let output = self.runner.ffprobe(probe_duration_args(media)).await?;
        let output = check(output, "ffprobe")?;
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        stdout
            .parse::<f64>()
            .map_err(|_| MediaError::InvalidDuration(stdout))
    }
}

#[async_trait]
impl<R: FfmpegRunner> VideoEditor for FfmpegEditor<R> {
    async fn merge_audio(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        options: &MergeOptions,
    ) -> Result<PathBuf, MediaError> {
        self.ensure_ffmpeg().await?;
        ensure_parent(output).await?;
        self.run_ffmpeg(merge_audio_args(video, audio, output, options))
            .await?;
        Ok(output.to_path_buf())
    }

    async fn add_background_audio(
        &self,
        video: &Path,
        background: &Path,
        output: &Path,
        options: &BackgroundOptions,
    ) -> Result<PathBuf, MediaError> {
        self.ensure_ffmpeg().await?;
        let args = background_audio_args(video, background, output, options)?;
        ensure_parent(output).await?;
        self.run_ffmpeg(args).await?;
        Ok(output.to_path_buf())
    }

    async fn concat(
        &self,
        videos: &[PathBuf],
        output: &Path,
        reencode: bool,
    ) -> Result<PathBuf, MediaError> {
        self.ensure_ffmpeg().await?;
        if videos.is_empty() {
            return Err(MediaError::EmptyInput);
        }
        ensure_parent(output).await?;

        if reencode {
            self.run_ffmpeg(concat_filter_args(videos, output)).await?;
            return Ok(output.to_path_buf());
        }

        // The demuxer resolves relative entries against the list file.
        let mut absolute = Vec::with_capacity(videos.len());
        for video in videos {
            absolute.push(fs::canonicalize(video).await?);
        }
        let list_dir = tempfile::tempdir()?;
        let list_file = list_dir.path().join("concat.txt");
        fs::write(&list_file, concat_list(&absolute)).await?;
        self.run_ffmpeg(concat_demuxer_args(&list_file, output))
            .await?;
        Ok(output.to_path_buf())
    }

    async fn extract_last_frame(
        &self,
        video: &Path,
        output: &Path,
        quality: Option<u32>,
    ) -> Result<PathBuf, MediaError> {
        if !self.runner.ffmpeg_available().await {
            tracing::warn!("ffmpeg unavailable, decoding last frame natively");
            return decode_last_frame(video, output, quality).await;
        }
        ensure_parent(output).await?;

        let first = self
            .runner
            .ffmpeg(seek_from_end_args(video, output, quality))
            .await?;
        if first.status.success() {
            return Ok(output.to_path_buf());
        }
        let first_err = stderr_of(&first);

        let duration = match self.probe_duration(video).await {
            Ok(duration) => duration,
            Err(probe_err) => {
                return decode_last_frame(video, output, quality)
                    .await
                    .map_err(|native_err| {
                        MediaError::FrameUnavailable(format!(
                            "ffmpeg -sseof failed: {}; duration probe failed: {}; native decoding failed: {}",
                            first_err, probe_err, native_err
                        ))
                    });
            }
        };

        let seek = (duration - 0.05).max(0.0);
        let second = self
            .runner
            .ffmpeg(seek_to_args(video, output, seek, quality))
            .await?;
        if second.status.success() {
            return Ok(output.to_path_buf());
        }
        let second_err = stderr_of(&second);

        decode_last_frame(video, output, quality)
            .await
            .map_err(|native_err| {
                MediaError::FrameUnavailable(format!(
                    "ffmpeg -sseof failed: {}; ffmpeg -ss {:.3} failed: {}; native decoding failed: {}",
                    first_err, seek, second_err, native_err
                ))
            })
    }
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn strings<'a>(items: &'a [&'a str]) -> impl Iterator<Item = String> + 'a {
    items.iter().map(|s| s.to_string())
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn check(output: Output, tool: &'static str) -> Result<Output, MediaError> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(MediaError::CommandFailed {
            tool,
            stderr: stderr_of(&output),
        })
    }
}

async fn ensure_parent(path: &Path) -> Result<(), MediaError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

fn probe_duration_args(media: &Path) -> Vec<String> {
    let mut args: Vec<String> = strings(&[
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ])
    .collect();
    args.push(arg(media));
    args
}

fn merge_audio_args(video: &Path, audio: &Path, output: &Path, options: &MergeOptions) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        arg(video),
        "-i".to_string(),
        arg(audio),
    ];

    let mut filters = Vec::new();
    let mut label = "[1:a]".to_string();
    if options.audio_offset_sec > 0.0 {
        let delay_ms = (options.audio_offset_sec * 1000.0) as u64;
        filters.push(format!("{}adelay={}|{}[a_del]", label, delay_ms, delay_ms));
        label = "[a_del]".to_string();
    }
    if let Some(volume) = options.volume {
        filters.push(format!("{}volume={}[a_vol]", label, volume));
        label = "[a_vol]".to_string();
    }

    if filters.is_empty() {
        args.extend(strings(&["-map", "0:v:0", "-map", "1:a:0"]));
    } else {
        args.push("-filter_complex".to_string());
        args.push(filters.join(";"));
        args.extend(strings(&["-map", "0:v:0", "-map"]));
        args.push(label);
    }

    if options.reencode {
        args.extend(strings(&H264));
    } else {
        args.extend(strings(&["-c:v", "copy"]));
    }
    args.extend(strings(&AAC));
    args.push("-shortest".to_string());
    args.push(arg(output));
    args
}

fn background_audio_args(
    video: &Path,
    background: &Path,
    output: &Path,
    options: &BackgroundOptions,
) -> Result<Vec<String>, MediaError> {
    if options.bg_volume < 0.0 {
        return Err(MediaError::InvalidParameter(
            "bg_volume must be >= 0".to_string(),
        ));
    }
    if matches!(options.main_volume, Some(v) if v < 0.0) {
        return Err(MediaError::InvalidParameter(
            "main_volume must be >= 0".to_string(),
        ));
    }
    if options.bg_offset_sec < 0.0 {
        return Err(MediaError::InvalidParameter(
            "bg_offset_sec must be >= 0".to_string(),
        ));
    }

    let mut args = vec!["-y".to_string(), "-i".to_string(), arg(video)];
    if options.loop_bg {
        args.extend(strings(&["-stream_loop", "-1"]));
    }
    args.push("-i".to_string());
    args.push(arg(background));

    let mut filters = Vec::new();
    let mut bg = "[1:a]".to_string();
    if options.bg_offset_sec > 0.0 {
        let delay_ms = (options.bg_offset_sec * 1000.0) as u64;
        filters.push(format!("{}adelay={}|{}[bg_del]", bg, delay_ms, delay_ms));
        bg = "[bg_del]".to_string();
    }
    if options.bg_volume != 1.0 {
        filters.push(format!("{}volume={}[bg_vol]", bg, options.bg_volume));
        bg = "[bg_vol]".to_string();
    }
    let mut main = "[0:a]".to_string();
    if let Some(volume) = options.main_volume.filter(|v| *v != 1.0) {
        filters.push(format!("{}volume={}[main_vol]", main, volume));
        main = "[main_vol]".to_string();
    }
    filters.push(format!(
        "{}{}amix=inputs=2:duration=first:dropout_transition=0[mix]",
        main, bg
    ));

    args.push("-filter_complex".to_string());
    args.push(filters.join(";"));
    args.extend(strings(&["-map", "0:v:0", "-map", "[mix]"]));
    if options.reencode_video {
        args.extend(strings(&H264));
    } else {
        args.extend(strings(&["-c:v", "copy"]));
    }
    args.extend(strings(&AAC));
    args.push("-shortest".to_string());
    args.push(arg(output));
    Ok(args)
}

fn concat_filter_args(videos: &[PathBuf], output: &Path) -> Vec<String> {
    let mut args = vec!["-y".to_string()];
    for video in videos {
        args.push("-i".to_string());
        args.push(arg(video));
    }
    let labels: String = (0..videos.len())
        .map(|i| format!("[{}:v][{}:a]", i, i))
        .collect();
    args.push("-filter_complex".to_string());
    args.push(format!(
        "{}concat=n={}:v=1:a=1[vout][aout]",
        labels,
        videos.len()
    ));
    args.extend(strings(&["-map", "[vout]", "-map", "[aout]"]));
    args.extend(strings(&H264));
    args.extend(strings(&AAC));
    args.push(arg(output));
    args
}

fn concat_list(videos: &[PathBuf]) -> String {
    videos
        .iter()
        .map(|v| format!("file '{}'\n", arg(v).replace('\'', r"'\''")))
        .collect()
}

fn concat_demuxer_args(list_file: &Path, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = strings(&["-y", "-f", "concat", "-safe", "0", "-i"]).collect();
    args.push(arg(list_file));
    args.extend(strings(&["-c", "copy"]));
    args.push(arg(output));
    args
}

fn seek_from_end_args(video: &Path, output: &Path, quality: Option<u32>) -> Vec<String> {
    let mut args: Vec<String> = strings(&["-y", "-sseof", "-0.001", "-i"]).collect();
    args.push(arg(video));
    args.extend(strings(&["-frames:v", "1"]));
    if let Some(q) = quality {
        args.push("-q:v".to_string());
        args.push(q.to_string());
    }
    args.push(arg(output));
    args
}

fn seek_to_args(video: &Path, output: &Path, seek: f64, quality: Option<u32>) -> Vec<String> {
    let mut args = vec!["-y".to_string(), "-i".to_string(), arg(video)];
    args.push("-ss".to_string());
    args.push(format!("{:.3}", seek));
    args.extend(strings(&["-frames:v", "1"]));
    if let Some(q) = quality {
        args.push("-q:v".to_string());
        args.push(q.to_string());
    }
    args.push(arg(output));
    args
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::domain::av::cmd::MockFfmpegRunner;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use tempfile::tempdir;

    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn merge_without_filters_maps_inputs() {
        let args = merge_audio_args(
            &p("v.mp4"),
            &p("a.wav"),
            &p("out.mp4"),
            &MergeOptions::default(),
        );
        assert_eq!(
            args.join(" "),
            "-y -i v.mp4 -i a.wav -map 0:v:0 -map 1:a:0 -c:v copy -c:a aac -b:a 192k -shortest out.mp4"
        );
    }

    #[test]
    fn merge_chains_delay_and_volume() {
        let options = MergeOptions {
            audio_offset_sec: 0.25,
            volume: Some(1.5),
            reencode: true,
        };
        let args = merge_audio_args(&p("v.mp4"), &p("a.wav"), &p("out.mp4"), &options);
        let joined = args.join(" ");
        assert!(joined.contains(
            "-filter_complex [1:a]adelay=250|250[a_del];[a_del]volume=1.5[a_vol] -map 0:v:0 -map [a_vol]"
        ));
        assert!(joined.contains("-c:v libx264 -preset veryfast -crf 18"));
    }

    #[test]
    fn background_mix_defaults() {
        let args = background_audio_args(
            &p("v.mp4"),
            &p("bg.mp3"),
            &p("out.mp4"),
            &BackgroundOptions::default(),
        )
        .unwrap();
        assert_eq!(
            args.join(" "),
            "-y -i v.mp4 -stream_loop -1 -i bg.mp3 -filter_complex \
             [1:a]volume=0.5[bg_vol];[0:a][bg_vol]amix=inputs=2:duration=first:dropout_transition=0[mix] \
             -map 0:v:0 -map [mix] -c:v copy -c:a aac -b:a 192k -shortest out.mp4"
        );
    }

    #[test]
    fn background_mix_rejects_negative_values() {
        let options = BackgroundOptions {
            bg_offset_sec: -1.0,
            ..BackgroundOptions::default()
        };
        assert!(matches!(
            background_audio_args(&p("v"), &p("b"), &p("o"), &options),
            Err(MediaError::InvalidParameter(_))
        ));
    }

    #[test]
    fn concat_filter_pairs_every_input() {
        let args = concat_filter_args(&[p("a.mp4"), p("b.mp4"), p("c.mp4")], &p("f.mp4"));
        let joined = args.join(" ");
        assert!(joined.starts_with("-y -i a.mp4 -i b.mp4 -i c.mp4 -filter_complex"));
        assert!(joined.contains("[0:v][0:a][1:v][1:a][2:v][2:a]concat=n=3:v=1:a=1[vout][aout]"));
        assert!(joined.ends_with("-c:a aac -b:a 192k f.mp4"));
    }

    #[test]
    fn concat_list_escapes_quotes() {
        assert_eq!(
            concat_list(&[p("/tmp/kid's.mp4")]),
            "file '/tmp/kid'\\''s.mp4'\n"
        );
    }

    #[tokio::test]
    async fn concat_rejects_empty_input() {
        let mut runner = MockFfmpegRunner::new();
        runner.expect_ffmpeg_available().returning(|| true);
        let editor = FfmpegEditor::new(runner);
        let err = editor.concat(&[], &p("out.mp4"), true).await.unwrap_err();
        assert!(matches!(err, MediaError::EmptyInput));
    }

    #[tokio::test]
    async fn missing_ffmpeg_is_reported() {
        let mut runner = MockFfmpegRunner::new();
        runner.expect_ffmpeg_available().returning(|| false);
        let editor = FfmpegEditor::new(runner);
        let err = editor
            .merge_audio(&p("v"), &p("a"), &p("o"), &MergeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound));
    }

    #[tokio::test]
    async fn ffmpeg_failure_carries_stderr() {
        let dir = tempdir().unwrap();
        let mut runner = MockFfmpegRunner::new();
        runner.expect_ffmpeg_available().returning(|| true);
        runner
            .expect_ffmpeg()
            .times(1)
            .returning(|_| Ok(output(1, "", "Invalid data found")));
        let editor = FfmpegEditor::new(runner);
        let err = editor
            .merge_audio(
                &p("v.mp4"),
                &p("a.wav"),
                &dir.path().join("nested/out.mp4"),
                &MergeOptions::default(),
            )
            .await
            .unwrap_err();
        match err {
            MediaError::CommandFailed { tool, stderr } => {
                assert_eq!(tool, "ffmpeg");
                assert_eq!(stderr, "Invalid data found");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(dir.path().join("nested").is_dir());
    }

    #[tokio::test]
    async fn probe_duration_parses_stdout() {
        let mut runner = MockFfmpegRunner::new();
        runner
            .expect_ffprobe()
            .withf(|args| args.contains(&"format=duration".to_string()))
            .returning(|_| Ok(output(0, "8.041000\n", "")));
        let editor = FfmpegEditor::new(runner);
        assert_eq!(editor.probe_duration(&p("v.mp4")).await.unwrap(), 8.041);
    }

    #[tokio::test]
    async fn probe_duration_rejects_garbage() {
        let mut runner = MockFfmpegRunner::new();
        runner
            .expect_ffprobe()
            .returning(|_| Ok(output(0, "N/A", "")));
        let editor = FfmpegEditor::new(runner);
        assert!(matches!(
            editor.probe_duration(&p("v.mp4")).await,
            Err(MediaError::InvalidDuration(_))
        ));
    }

    #[tokio::test]
    async fn last_frame_from_end_seek() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("last.png");
        let mut runner = MockFfmpegRunner::new();
        runner.expect_ffmpeg_available().returning(|| true);
        runner
            .expect_ffmpeg()
            .withf(|args| args.contains(&"-sseof".to_string()))
            .times(1)
            .returning(|_| Ok(output(0, "", "")));
        let editor = FfmpegEditor::new(runner);
        let saved = editor
            .extract_last_frame(&p("clip.mp4"), &out, None)
            .await
            .unwrap();
        assert_eq!(saved, out);
    }

    #[tokio::test]
    async fn last_frame_falls_back_to_duration_seek() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("last.jpg");
        let mut runner = MockFfmpegRunner::new();
        runner.expect_ffmpeg_available().returning(|| true);
        runner
            .expect_ffmpeg()
            .withf(|args| args.contains(&"-sseof".to_string()))
            .times(1)
            .returning(|_| Ok(output(1, "", "seek failed")));
        runner
            .expect_ffprobe()
            .times(1)
            .returning(|_| Ok(output(0, "8.0", "")));
        runner
            .expect_ffmpeg()
            .withf(|args| {
                args.windows(2).any(|w| w[0] == "-ss" && w[1] == "7.950")
                    && args.windows(2).any(|w| w[0] == "-q:v" && w[1] == "2")
            })
            .times(1)
            .returning(|_| Ok(output(0, "", "")));
        let editor = FfmpegEditor::new(runner);
        let saved = editor
            .extract_last_frame(&p("clip.mp4"), &out, Some(2))
            .await
            .unwrap();
        assert_eq!(saved, out);
    }

    #[cfg(not(feature = "native-frames"))]
    #[tokio::test]
    async fn last_frame_reports_every_attempt() {
        let dir = tempdir().unwrap();
        let mut runner = MockFfmpegRunner::new();
        runner.expect_ffmpeg_available().returning(|| true);
        runner
            .expect_ffmpeg()
            .returning(|_| Ok(output(1, "", "no frames")));
        runner
            .expect_ffprobe()
            .returning(|_| Ok(output(0, "0.02", "")));
        let editor = FfmpegEditor::new(runner);
        let err = editor
            .extract_last_frame(&p("clip.mp4"), &dir.path().join("x.png"), None)
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("-sseof failed: no frames"));
        assert!(message.contains("-ss 0.000 failed"));
        assert!(message.contains("native decoding failed"));
    }
}
