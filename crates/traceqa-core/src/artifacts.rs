use crate::error::{CoreError, CoreResult};
use crate::expected::{parse_qa_map, QaMap};
use crate::model::LogEntry;
use crate::normalize::normalize_str;
use serde::Serialize;
use std::path::Path;
use tracing::info;

fn read_text(path: &Path) -> CoreResult<String> {
    std::fs::read_to_string(path)
        .map_err(|err| CoreError::io(format!("failed to read {}: {err}", path.display())))
}

pub fn read_capture(path: impl AsRef<Path>) -> CoreResult<Vec<LogEntry>> {
    let path = path.as_ref();
    let entries = normalize_str(&read_text(path)?)?;
    info!("loaded {} log entries from {}", entries.len(), path.display());
    Ok(entries)
}

pub fn read_qa_map(path: impl AsRef<Path>) -> CoreResult<QaMap> {
    parse_qa_map(&read_text(path.as_ref())?)
}

pub fn read_optional_text(path: Option<&Path>) -> CoreResult<Option<String>> {
    path.map(read_text).transpose()
}

/// Writes `value` as pretty JSON, creating parent directories as needed.
pub fn write_json<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> CoreResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| {
            CoreError::io(format!("failed to create {}: {err}", parent.display()))
        })?;
    }
    let body = serde_json::to_string_pretty(value)
        .map_err(|err| CoreError::io(format!("failed to encode {}: {err}", path.display())))?;
    std::fs::write(path, body)
        .map_err(|err| CoreError::io(format!("failed to write {}: {err}", path.display())))?;
    info!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{read_capture, read_qa_map, write_json};
    use crate::error::CoreError;
    use std::path::PathBuf;

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "traceqa-artifacts-{label}-{}-{}.json",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("system time after unix epoch")
                .as_nanos()
        ))
    }

    #[test]
    fn written_qa_map_reads_back() {
        let path = temp_path("qa");
        let pairs = std::collections::BTreeMap::from([("q".to_string(), "a".to_string())]);
        write_json(&path, &pairs).expect("write qa map");

        let loaded = read_qa_map(&path).expect("read qa map");
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, pairs);
    }

    #[test]
    fn missing_capture_is_an_io_error() {
        let err = read_capture(temp_path("missing")).expect_err("missing file must fail");
        assert!(matches!(err, CoreError::Io(message) if message.contains("failed to read")));
    }
}
