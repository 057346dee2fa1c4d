//! Output file naming.
//!
//! Names embed a filesystem-safe form of the title plus a timestamp so
//! repeated runs never collide:
//! - `compilations/compilation_<title>_<unix>.mp4`
//! - `thumbnails/thumbnail_<title>_<YYYYmmdd_HHMMSS>.jpg`
//! - `shorts/short_<title or clip id>_<unix>.mp4`

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};

/// Prefix of the title used when a run supplies none.
pub const DEFAULT_TITLE_PREFIX: &str = "TikTok Highlights";

/// Title for a run without one, e.g. `TikTok Highlights | June 01, 2024`.
pub fn default_title(today: NaiveDate) -> String {
    format!("{} | {}", DEFAULT_TITLE_PREFIX, today.format("%B %d, %Y"))
}

/// Filesystem-safe form of `title`.
///
/// Alphanumerics, spaces, `-` and `_` are kept and anything else becomes
/// `_`. The result is trimmed and spaces become `_`.
pub fn safe_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    kept.trim().replace(' ', "_")
}

/// Output locations for one run.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    root: PathBuf,
    now: DateTime<Local>,
}

impl OutputPaths {
    pub fn new(root: impl Into<PathBuf>, now: DateTime<Local>) -> Self {
        Self {
            root: root.into(),
            now,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn compilation_dir(&self) -> PathBuf {
        self.root.join("compilations")
    }

    pub fn thumbnail_dir(&self) -> PathBuf {
        self.root.join("thumbnails")
    }

    pub fn shorts_dir(&self) -> PathBuf {
        self.root.join("shorts")
    }

    fn unix(&self) -> i64 {
        self.now.timestamp()
    }

    pub fn compilation(&self, title: Option<&str>) -> PathBuf {
        let name = match title.map(safe_title).filter(|t| !t.is_empty()) {
            Some(safe) => format!("compilation_{}_{}.mp4", safe, self.unix()),
            None => format!("compilation_{}.mp4", self.unix()),
        };
        self.compilation_dir().join(name)
    }

    pub fn thumbnail(&self, title: Option<&str>) -> PathBuf {
        let stamp = self.now.format("%Y%m%d_%H%M%S");
        let name = match title.map(safe_title).filter(|t| !t.is_empty()) {
            Some(safe) => format!("thumbnail_{}_{}.jpg", safe, stamp),
            None => format!("thumbnail_{}.jpg", stamp),
        };
        self.thumbnail_dir().join(name)
    }

    /// Short made from the compilation.
    pub fn compilation_short(&self, title: Option<&str>) -> PathBuf {
        let name = match title.map(safe_title).filter(|t| !t.is_empty()) {
            Some(safe) => format!("short_{}_{}.mp4", safe, self.unix()),
            None => format!("compilation_short_{}.mp4", self.unix()),
        };
        self.shorts_dir().join(name)
    }

    /// Short made from one clip.
    pub fn clip_short(&self, clip_id: &str) -> PathBuf {
        self.shorts_dir()
            .join(format!("short_{}_{}.mp4", safe_title(clip_id), self.unix()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn paths() -> OutputPaths {
        let now = Local.with_ymd_and_hms(2024, 6, 1, 14, 30, 5).unwrap();
        OutputPaths::new("/data/out", now)
    }

    #[test]
    fn test_safe_title() {
        assert_eq!(safe_title("Top 10: Week #23!"), "Top_10__Week__23_");
        assert_eq!(safe_title("  padded title  "), "padded_title");
        assert_eq!(safe_title("keep-dash_and_underscore"), "keep-dash_and_underscore");
        assert_eq!(safe_title(""), "");
    }

    #[test]
    fn test_default_title() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(default_title(today), "TikTok Highlights | June 01, 2024");
    }

    #[test]
    fn test_compilation_names() {
        let paths = paths();
        let unix = paths.unix();
        assert_eq!(
            paths.compilation(Some("Best of June")),
            PathBuf::from(format!("/data/out/compilations/compilation_Best_of_June_{}.mp4", unix))
        );
        assert_eq!(
            paths.compilation(None),
            PathBuf::from(format!("/data/out/compilations/compilation_{}.mp4", unix))
        );
    }

    #[test]
    fn test_thumbnail_uses_wall_clock_stamp() {
        assert_eq!(
            paths().thumbnail(Some("Best of June")),
            PathBuf::from("/data/out/thumbnails/thumbnail_Best_of_June_20240601_143005.jpg")
        );
    }

    #[test]
    fn test_short_names() {
        let paths = paths();
        let unix = paths.unix();
        assert_eq!(
            paths.compilation_short(None),
            PathBuf::from(format!("/data/out/shorts/compilation_short_{}.mp4", unix))
        );
        assert_eq!(
            paths.clip_short("7300012345"),
            PathBuf::from(format!("/data/out/shorts/short_7300012345_{}.mp4", unix))
        );
    }
}
