//! Media resolution capability
//!
//! The media-extraction engine is an external capability: given a URL and a
//! format option it yields descriptive metadata (or `None` when the source
//! has nothing to extract, which is distinct from an error) and downloads
//! exactly one media file into a caller-supplied directory, reporting
//! progress along the way. The production implementation drives the yt-dlp
//! executable; tests script the trait directly.

use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Quality/format fallback ladder for media downloads, tried in order until
/// one option resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatOption {
    /// 720p or best available
    Hd720,
    /// 480p or best available
    Sd480,
    /// Best available quality
    Best,
    /// Worst available quality, the last resort
    Worst,
}

impl FormatOption {
    /// The fixed degrade order
    pub const DEGRADE_ORDER: [FormatOption; 4] = [
        FormatOption::Hd720,
        FormatOption::Sd480,
        FormatOption::Best,
        FormatOption::Worst,
    ];

    /// Format selector handed to the extraction engine
    pub fn selector(self) -> &'static str {
        match self {
            FormatOption::Hd720 => "best[height<=720]/best",
            FormatOption::Sd480 => "best[height<=480]/best",
            FormatOption::Best => "best",
            FormatOption::Worst => "worst",
        }
    }
}

/// Descriptive metadata extracted from a media source
#[derive(Debug, Clone, Default)]
pub struct MediaInfo {
    pub title: String,
    pub duration_seconds: Option<i64>,
    pub uploader: Option<String>,
    pub upload_date: Option<String>,
    pub source_site: Option<String>,
    pub canonical_url: Option<String>,
}

/// A media file written by the resolver
#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub path: PathBuf,
    pub filename: String,
}

/// Progress report emitted during a download
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub percent: f64,
    pub rate: String,
}

/// Callback invoked with progress events during a download
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Errors surfaced by media resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("resolver process failed: {0}")]
    Process(String),

    #[error("resolver output unreadable: {0}")]
    Output(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// External media-extraction capability.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Extract descriptive metadata for a URL under a format option.
    ///
    /// `Ok(None)` means the source yielded no extraction info for this
    /// option; the caller moves on to the next option without treating it
    /// as a hard failure.
    async fn inspect(
        &self,
        url: &str,
        format: FormatOption,
    ) -> Result<Option<MediaInfo>, ResolveError>;

    /// Download the media file for a URL under a format option into
    /// `output_dir`, which receives exactly one file.
    async fn download(
        &self,
        url: &str,
        output_dir: &Path,
        format: FormatOption,
        progress: Option<ProgressSink>,
    ) -> Result<DownloadedMedia, ResolveError>;
}

/// yt-dlp line like `[download]  42.7% of 10.00MiB at 1.25MiB/s ETA 00:04`
const PROGRESS_PATTERN: &str = r"\[download\]\s+(\d+(?:\.\d+)?)%.*?\bat\s+(\S+)";

/// Media resolver backed by the yt-dlp executable
pub struct YtDlpResolver {
    bin: String,
    progress_re: Regex,
}

impl YtDlpResolver {
    pub fn new(bin: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            bin: bin.into(),
            progress_re: Regex::new(PROGRESS_PATTERN)?,
        })
    }

    fn parse_progress_line(&self, line: &str) -> Option<ProgressEvent> {
        let captures = self.progress_re.captures(line)?;
        let percent: f64 = captures.get(1)?.as_str().parse().ok()?;
        let rate = captures.get(2)?.as_str().to_string();
        Some(ProgressEvent { percent, rate })
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn inspect(
        &self,
        url: &str,
        format: FormatOption,
    ) -> Result<Option<MediaInfo>, ResolveError> {
        debug!(url = %url, format = format.selector(), "Extracting media info");

        let output = Command::new(&self.bin)
            .arg("--format")
            .arg(format.selector())
            .arg("--no-playlist")
            .arg("--skip-download")
            .arg("--dump-json")
            .arg(url)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Process(truncate_lines(&stderr)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() || stdout == "null" {
            return Ok(None);
        }

        let info: serde_json::Value = serde_json::from_str(stdout)
            .map_err(|e| ResolveError::Output(format!("bad metadata json: {e}")))?;

        Ok(Some(MediaInfo {
            title: info
                .get("title")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown")
                .to_string(),
            duration_seconds: info
                .get("duration")
                .and_then(|v| v.as_f64())
                .map(|secs| secs as i64),
            uploader: json_string(&info, "uploader"),
            upload_date: json_string(&info, "upload_date"),
            source_site: json_string(&info, "extractor_key"),
            canonical_url: json_string(&info, "webpage_url"),
        }))
    }

    async fn download(
        &self,
        url: &str,
        output_dir: &Path,
        format: FormatOption,
        progress: Option<ProgressSink>,
    ) -> Result<DownloadedMedia, ResolveError> {
        debug!(url = %url, format = format.selector(), "Downloading media");

        let template = output_dir.join("%(title)s.%(ext)s");

        let mut child = Command::new(&self.bin)
            .arg("--format")
            .arg(format.selector())
            .arg("--no-playlist")
            .arg("--newline")
            .arg("--output")
            .arg(&template)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(event) = self.parse_progress_line(&line) {
                    if let Some(sink) = &progress {
                        sink(event);
                    }
                }
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Process(truncate_lines(&stderr)));
        }

        // The resolver writes exactly one media file into the scoped
        // directory; anything still carrying a partial-download suffix
        // does not count.
        let mut entries = tokio::fs::read_dir(output_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if filename.ends_with(".part") || filename.ends_with(".ytdl") {
                continue;
            }
            return Ok(DownloadedMedia {
                filename: filename.to_string(),
                path,
            });
        }

        warn!(url = %url, "Resolver reported success but produced no file");
        Err(ResolveError::Output("no media file produced".to_string()))
    }
}

fn json_string(value: &serde_json::Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).map(str::to_string)
}

/// First few lines of resolver stderr, enough to diagnose without dumping
/// a full transcript into the logs
fn truncate_lines(text: &str) -> String {
    text.lines().take(4).collect::<Vec<_>>().join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degrade_order() {
        assert_eq!(
            FormatOption::DEGRADE_ORDER,
            [
                FormatOption::Hd720,
                FormatOption::Sd480,
                FormatOption::Best,
                FormatOption::Worst,
            ]
        );
        assert_eq!(FormatOption::Hd720.selector(), "best[height<=720]/best");
        assert_eq!(FormatOption::Sd480.selector(), "best[height<=480]/best");
        assert_eq!(FormatOption::Best.selector(), "best");
        assert_eq!(FormatOption::Worst.selector(), "worst");
    }

    #[test]
    fn test_parse_progress_line() {
        let resolver = YtDlpResolver::new("yt-dlp").unwrap();

        let event = resolver
            .parse_progress_line("[download]  42.7% of 10.00MiB at 1.25MiB/s ETA 00:04")
            .unwrap();
        assert_eq!(event.percent, 42.7);
        assert_eq!(event.rate, "1.25MiB/s");

        let event = resolver
            .parse_progress_line("[download] 100% of 2.00MiB at 500.00KiB/s ETA 00:00")
            .unwrap();
        assert_eq!(event.percent, 100.0);

        assert!(resolver.parse_progress_line("[info] Writing metadata").is_none());
        assert!(resolver
            .parse_progress_line("[download] Destination: video.mp4")
            .is_none());
    }
}
