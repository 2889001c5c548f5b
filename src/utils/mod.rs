use anyhow::{Context, Result};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::extract::VideoId;

/// Accept a bare video id or any common YouTube URL form and return the id
pub fn extract_video_id(input: &str) -> Result<VideoId> {
    let input = input.trim();
    if let Ok(id) = VideoId::parse(input) {
        return Ok(id);
    }

    let with_scheme = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };
    let parsed = Url::parse(&with_scheme)
        .map_err(|_| anyhow::anyhow!("Not a video id or URL: {}", input))?;

    let host = parsed.host_str().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host);
    let host = host.strip_prefix("m.").unwrap_or(host);

    let candidate = match host {
        "youtu.be" => parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .map(str::to_string),
        "youtube.com" | "music.youtube.com" | "youtube-nocookie.com" => {
            let mut segments = parsed
                .path_segments()
                .map(|s| s.collect::<Vec<_>>())
                .unwrap_or_default();
            match segments.first().copied() {
                Some("watch") => parsed
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned()),
                Some("embed") | Some("shorts") | Some("live") | Some("v") if segments.len() > 1 => {
                    Some(segments.swap_remove(1).to_string())
                }
                _ => None,
            }
        }
        _ => anyhow::bail!("Not a YouTube URL: {}", input),
    };

    match candidate {
        Some(id) => VideoId::parse(&id),
        None => anyhow::bail!("No video id in URL: {}", input),
    }
}

/// Read video ids or URLs from a file, one per line. Blank lines and `#` comments are skipped.
pub fn read_video_ids(path: &Path) -> Result<Vec<VideoId>> {
    let content = fs_err::read_to_string(path).context("Failed to read id list")?;

    content
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.split('#').next().unwrap_or_default().trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(number, line)| {
            extract_video_id(line).with_context(|| format!("{}:{}", path.display(), number))
        })
        .collect()
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else if total_seconds > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Await `work` unless `cancel` resolves first, in which case `work` is dropped
pub async fn until_cancelled<T>(
    work: impl Future<Output = T>,
    cancel: impl Future<Output = ()>,
) -> Option<T> {
    tokio::select! {
        result = work => Some(result),
        _ = cancel => None,
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Sanitize filename for safe filesystem usage
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            c if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' || c == '.' => c,
            _ => '_',
        })
        .collect::<String>()
        .trim()
        .to_string()
}
