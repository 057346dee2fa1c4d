//! Full runs against real FFmpeg; ignored by default, run with `--ignored`.

use std::path::Path;

use tempfile::TempDir;
use tokio::process::Command;

use reel_media::MediaSettings;
use reel_models::CanvasSize;
use reel_worker::{Pipeline, RunRequest, ShortsMode, WorkerConfig};

async fn require_ffmpeg() {
    assert!(ffmpeg_ready().await, "ffmpeg and ffprobe with drawtext support must be on PATH");
}

async fn ffmpeg_ready() -> bool {
    if which_ffmpeg().is_none() {
        return false;
    }
    Command::new("ffmpeg")
        .args([
            "-v", "error", "-f", "lavfi", "-i", "color=s=64x64:d=0.1", "-vf", "drawtext=text=ok",
            "-f", "null", "-",
        ])
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

fn which_ffmpeg() -> Option<()> {
    reel_media::check_ffmpeg().ok()?;
    reel_media::check_ffprobe().ok()?;
    Some(())
}

async fn make_clip(path: &Path, secs: u32) {
    let status = Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-f", "lavfi", "-i"])
        .arg(format!("testsrc=size=360x640:rate=30:duration={}", secs))
        .args(["-f", "lavfi", "-i"])
        .arg(format!("sine=frequency=330:duration={}", secs))
        .args(["-c:v", "libx264", "-preset", "ultrafast", "-pix_fmt", "yuv420p", "-c:a", "aac", "-shortest"])
        .arg(path)
        .status()
        .await
        .unwrap();
    assert!(status.success());
}

#[tokio::test]
#[ignore = "requires ffmpeg with drawtext"]
async fn run_writes_compilation_thumbnail_and_short() {
    require_ffmpeg().await;
    let dir = TempDir::new().unwrap();
    let media = dir.path().join("media");
    std::fs::create_dir_all(&media).unwrap();
    for name in ["a", "b", "c"] {
        make_clip(&media.join(format!("{}.mp4", name)), 3).await;
    }
    let manifest = dir.path().join("clips.json");
    std::fs::write(
        &manifest,
        r#"[
            {"id": "a", "author": "one", "duration": 3.0, "local_path": "media/a.mp4"},
            {"id": "b", "author": "two", "duration": 3.0, "local_path": "media/b.mp4"},
            {"id": "c", "duration": 3.0, "local_path": "media/c.mp4"}
        ]"#,
    )
    .unwrap();

    let config = WorkerConfig {
        work_dir: dir.path().join("work"),
        output_dir: dir.path().join("out"),
        ..Default::default()
    };
    let settings = MediaSettings {
        canvas: CanvasSize::new(640, 360),
        thumbnail_canvas: CanvasSize::new(640, 360),
        ..Default::default()
    };

    let summary = Pipeline::new(config, settings)
        .run(&RunRequest {
            manifest,
            title: Some("Best of the Week".to_string()),
            max_videos: None,
            shorts: ShortsMode::Compilation,
        })
        .await
        .unwrap();

    let compilation = &summary.compilation.output_path;
    assert!(compilation.is_file());
    assert!(compilation.starts_with(dir.path().join("out").join("compilations")));
    assert!(compilation
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("compilation_Best_of_the_Week_"));
    assert_eq!(summary.compilation.clips_used.len(), 3);

    let thumbnail = summary.thumbnail.as_ref().unwrap();
    assert!(thumbnail.is_file());

    assert_eq!(summary.shorts.len(), 1);
    assert!(summary.shorts[0].is_file());

    let leftovers = std::fs::read_dir(dir.path().join("work")).unwrap().count();
    assert_eq!(leftovers, 0);
}
