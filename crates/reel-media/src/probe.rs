//! Source inspection with ffprobe.
//!
//! Only the facts the pipeline acts on are queried: how long a source runs,
//! its picture size and frame timing, and whether it carries sound.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Frame rate assumed when a stream reports none.
const FALLBACK_FPS: f64 = 30.0;

/// What the pipeline needs to know about one source.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    /// Seconds; 0.0 when neither container nor stream reports it
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Reported by the container, else estimated from duration and fps
    pub frame_count: u64,
    /// Sources without sound get generated silence downstream
    pub has_audio: bool,
}

impl VideoInfo {
    /// Wider than tall; square sources count as portrait.
    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

impl ProbeStream {
    /// Average rate first; some containers leave it at `0/0`.
    fn frame_rate(&self) -> Option<f64> {
        self.avg_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .or_else(|| self.r_frame_rate.as_deref().and_then(parse_frame_rate))
    }
}

/// Inspect a source file.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json"])
        .args(["-show_entries", "format=duration"])
        .args([
            "-show_entries",
            "stream=codec_type,width,height,r_frame_rate,avg_frame_rate,nb_frames,duration",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("cannot read {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
        });
    }

    interpret(serde_json::from_slice(&output.stdout)?)
}

fn interpret(report: ProbeReport) -> MediaResult<VideoInfo> {
    let picture = report
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("no picture stream".to_string()))?;
    let has_audio = report.streams.iter().any(|s| s.codec_type == "audio");

    let duration = [report.format.duration.as_deref(), picture.duration.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|d| d.parse::<f64>().ok().filter(|d| d.is_finite() && *d > 0.0))
        .unwrap_or(0.0);
    let fps = picture.frame_rate().unwrap_or(FALLBACK_FPS);
    let frame_count = picture
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or_else(|| (duration * fps).round() as u64);

    Ok(VideoInfo {
        duration,
        width: picture.width.unwrap_or(0),
        height: picture.height.unwrap_or(0),
        fps,
        frame_count,
        has_audio,
    })
}

/// Duration of a media file in seconds.
pub async fn get_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    Ok(probe_video(path).await?.duration)
}

/// `30/1`, `30000/1001` or `29.97`; zero and malformed rates are `None`.
pub(crate) fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            if den <= 0.0 {
                return None;
            }
            num.parse::<f64>().ok()? / den
        }
        None => s.parse().ok()?,
    };
    (rate > 0.0 && rate.is_finite()).then_some(rate)
}
