use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::batch::BatchSummary;
use crate::cli::OutputFormat;
use crate::extract::{Transcript, VideoId};
use crate::utils::sanitize_filename;

pub mod formatters;

pub use formatters::*;

pub const BATCH_REPORT: &str = "batch_report.json";

/// Render a transcript in the requested format
pub fn render(transcript: &Transcript, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => format_as_text(transcript),
        OutputFormat::Json => format_as_json(transcript)?,
        OutputFormat::Raw => format_as_raw(transcript),
    })
}

/// Save transcript to file, creating parent directories
pub async fn save_to_file(transcript: &Transcript, path: &Path, format: OutputFormat) -> Result<()> {
    let content = render(transcript, format)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs_err::create_dir_all(parent)?;
    }
    fs_err::write(path, content).context("Failed to write transcript")?;
    Ok(())
}

/// Print transcript to console
pub fn print_to_console(transcript: &Transcript, format: OutputFormat) -> Result<()> {
    println!("{}", render(transcript, format)?);
    Ok(())
}

/// File a batch run writes one video's transcript to
pub fn batch_file_path(dir: &Path, video_id: &VideoId, format: OutputFormat) -> PathBuf {
    dir.join(format!(
        "{}.{}",
        sanitize_filename(video_id.as_str()),
        format.extension()
    ))
}

/// Write the JSON batch report into `dir` and return its path
pub async fn save_batch_report(summary: &BatchSummary, dir: &Path) -> Result<PathBuf> {
    fs_err::create_dir_all(dir)?;
    let path = dir.join(BATCH_REPORT);
    fs_err::write(&path, summary.to_json()?).context("Failed to write batch report")?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractionResult, TranscriptSegment};
    use crate::ErrorKind;
    use std::collections::HashMap;

    fn transcript() -> Transcript {
        Transcript::new(vec![TranscriptSegment {
            timestamp: "0:00".into(),
            text: "hello".into(),
        }])
    }

    #[tokio::test]
    async fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("out.txt");

        save_to_file(&transcript(), &path, OutputFormat::Text).await.unwrap();
        assert_eq!(fs_err::read_to_string(&path).unwrap(), "0:00 hello");
    }

    #[test]
    fn test_batch_file_path() {
        let id = VideoId::parse("Iv-u8hwjHw4").unwrap();
        let path = batch_file_path(Path::new("out"), &id, OutputFormat::Json);
        assert_eq!(path, Path::new("out").join("Iv-u8hwjHw4.json"));
    }

    #[tokio::test]
    async fn test_batch_report_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut results = HashMap::new();
        results.insert(
            VideoId::parse("Iv-u8hwjHw4").unwrap(),
            ExtractionResult::Success(transcript()),
        );
        results.insert(
            VideoId::parse("dQw4w9WgXcQ").unwrap(),
            ExtractionResult::Failure {
                kind: ErrorKind::VideoNotFound,
                detail: "video dQw4w9WgXcQ is unavailable".into(),
            },
        );

        let path = save_batch_report(&BatchSummary::new(results), dir.path())
            .await
            .unwrap();
        let report: serde_json::Value =
            serde_json::from_str(&fs_err::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(report["succeeded"], 1);
        assert_eq!(report["failed"], 1);
        assert_eq!(report["results"]["dQw4w9WgXcQ"]["kind"], "video_not_found");
        assert!(report["generated_at"].is_string());
    }
}
