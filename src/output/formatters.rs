use anyhow::Result;

use crate::extract::Transcript;

/// One `"{timestamp} {text}"` line per segment
pub fn format_as_text(transcript: &Transcript) -> String {
    transcript
        .iter()
        .map(|segment| format!("{} {}", segment.timestamp, segment.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pretty-printed array of `{timestamp, text}` objects
pub fn format_as_json(transcript: &Transcript) -> Result<String> {
    Ok(serde_json::to_string_pretty(transcript.segments())?)
}

/// Debug list of `(timestamp, text)` tuples
pub fn format_as_raw(transcript: &Transcript) -> String {
    let tuples: Vec<(&str, &str)> = transcript
        .iter()
        .map(|segment| (segment.timestamp.as_str(), segment.text.as_str()))
        .collect();
    format!("{:?}", tuples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::TranscriptSegment;

    fn sample() -> Transcript {
        Transcript::new(vec![
            TranscriptSegment {
                timestamp: "0:00".into(),
                text: "Welcome".into(),
            },
            TranscriptSegment {
                timestamp: "0:02".into(),
                text: "Today we'll learn".into(),
            },
        ])
    }

    #[test]
    fn test_text() {
        assert_eq!(format_as_text(&sample()), "0:00 Welcome\n0:02 Today we'll learn");
    }

    #[test]
    fn test_json_shape() {
        let value: serde_json::Value = serde_json::from_str(&format_as_json(&sample()).unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!([
                {"timestamp": "0:00", "text": "Welcome"},
                {"timestamp": "0:02", "text": "Today we'll learn"}
            ])
        );
    }

    #[test]
    fn test_raw() {
        assert_eq!(
            format_as_raw(&sample()),
            r#"[("0:00", "Welcome"), ("0:02", "Today we'll learn")]"#
        );
    }
}
