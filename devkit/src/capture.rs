/*!
Rejeu de captures MQTT

Une capture est la sortie de `shelly-exporter debug`, une ligne par message :
`2024-01-21T15:04:05.123::: message topic:: shellies/shellyem3-x/emeter/0/power=12.5`
Les lignes vides, les commentaires `#` et les lignes d'état du mode debug
(ex: `blocking and waiting for messages`) sont ignorés.
*/

use shelly_exporter::Telemetry;
use std::path::Path;

const MARKER: &str = "::: message topic:: ";

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("capture IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed capture line {line}: {content:?}")]
    Malformed { line: usize, content: String },
}

/// Parse une capture complète, dans l'ordre d'arrivée
pub fn parse_capture(text: &str) -> Result<Vec<Telemetry>, CaptureError> {
    let mut out = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim_end();
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }
        let Some((_, rest)) = line.split_once(MARKER) else {
            // lignes d'état du mode debug
            continue;
        };
        let Some((topic, payload)) = rest.split_once('=') else {
            return Err(CaptureError::Malformed { line: idx + 1, content: raw.to_string() });
        };
        if topic.is_empty() {
            return Err(CaptureError::Malformed { line: idx + 1, content: raw.to_string() });
        }
        out.push(Telemetry::new(topic, payload));
    }
    Ok(out)
}

pub fn load_capture<P: AsRef<Path>>(path: P) -> Result<Vec<Telemetry>, CaptureError> {
    let text = std::fs::read_to_string(path)?;
    parse_capture(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_capture_lines() {
        let text = "\
blocking and waiting for messages
# 3em washtumbler
2024-01-21T15:04:05.123::: message topic:: shellies/shellyem3-x/emeter/0/power=12.5

2024-01-21T15:04:05.200::: message topic:: shellies/shellyht-1/info={\"mac\":\"1\",\"a\":\"b=c\"}
";
        let msgs = parse_capture(text).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0], Telemetry::new("shellies/shellyem3-x/emeter/0/power", "12.5"));
        // seul le premier '=' sépare topic et payload
        assert_eq!(msgs[1].payload_lossy(), "{\"mac\":\"1\",\"a\":\"b=c\"}");
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let err = parse_capture("t::: message topic:: no-separator\n").unwrap_err();
        assert!(matches!(err, CaptureError::Malformed { line: 1, .. }));
    }

    #[test]
    fn test_load_capture_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cap.txt");
        std::fs::write(&path, "t::: message topic:: a/b/c/d=1\n").unwrap();
        assert_eq!(load_capture(&path).unwrap().len(), 1);
        assert!(matches!(load_capture(dir.path().join("missing.txt")), Err(CaptureError::Io(_))));
    }
}
