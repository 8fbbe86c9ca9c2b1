//! Persistence of analysis results.
//!
//! Two encodings are supported: pretty JSON for inspection and a compact
//! binary form (`TTRC` magic, one version byte, bincode payload). Readers
//! detect the encoding from the leading bytes, so file extensions are free.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::trace::AnalysisResult;
use crate::{Error, Result};

/// Leading bytes of a binary result file.
pub const BINARY_MAGIC: &[u8; 4] = b"TTRC";

/// Version byte following [`BINARY_MAGIC`].
pub const BINARY_VERSION: u8 = 1;

/// Default extension for result files written by the CLI.
pub const RESULT_EXTENSION: &str = "tinytrace";

/// Encoding of a persisted result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    Json,
    #[default]
    Binary,
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "binary" | "bin" => Ok(Format::Binary),
            other => Err(Error::Other(format!("Unknown result format '{}'", other))),
        }
    }
}

/// Encode a result into bytes.
pub fn encode(result: &AnalysisResult, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Json => Ok(serde_json::to_vec_pretty(result)?),
        Format::Binary => {
            let mut bytes = Vec::with_capacity(BINARY_MAGIC.len() + 1);
            bytes.extend_from_slice(BINARY_MAGIC);
            bytes.push(BINARY_VERSION);
            bincode::serialize_into(&mut bytes, result)?;
            Ok(bytes)
        }
    }
}

/// Detect the encoding of `bytes` and decode a result from them.
pub fn decode(bytes: &[u8]) -> Result<AnalysisResult> {
    match bytes.strip_prefix(BINARY_MAGIC.as_slice()) {
        Some([version, payload @ ..]) => {
            if *version != BINARY_VERSION {
                return Err(Error::Other(format!(
                    "Unsupported result format version {} (expected {})",
                    version, BINARY_VERSION
                )));
            }
            Ok(bincode::deserialize(payload)?)
        }
        Some([]) => Err(Error::Other("Truncated result file".into())),
        None => Ok(serde_json::from_slice(bytes)?),
    }
}

/// Write a result to `path`.
pub fn write_results(path: impl AsRef<Path>, result: &AnalysisResult, format: Format) -> Result<()> {
    fs::write(path, encode(result, format)?)?;
    Ok(())
}

/// Read a result previously written with [`write_results`].
pub fn read_results(path: impl AsRef<Path>) -> Result<AnalysisResult> {
    decode(&fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{Action, CodeInfo, HistoryEntry, LineStats, Step, VariableHistoryExport};
    use crate::value::{Dict, Key, TypeTag, Value};

    fn sample_result() -> AnalysisResult {
        let dict: Dict = [(Key::Str("a".into()), Value::Int(1)), (Key::Int(2), Value::Float(0.5))]
            .into_iter()
            .collect();
        AnalysisResult {
            code_info: CodeInfo::new("sample", vec![Value::Int(3), Value::Str("x".into())])
                .with_cmd_args(vec!["--flag".into()]),
            execution_log: vec![Step {
                step: 1,
                timestamp: 1_700_000_000.25,
                line_num: 4,
                line_runtime: LineStats {
                    line_num: 4,
                    times_executed: 1,
                    total_time: 0.001,
                },
                actions: vec![
                    Action::InitVar {
                        var: "d".into(),
                        val: Value::Dict(dict.clone()),
                    },
                    Action::DictRemove {
                        var: "d".into(),
                        key: Key::Tuple(vec![Key::Int(1), Key::Bool(false)]),
                    },
                ],
            }],
            returned_value: Value::List(vec![Value::None, Value::Tuple(vec![])]),
            variable_history: vec![VariableHistoryExport {
                var: "d".into(),
                type_tag: TypeTag::Dict,
                range: None,
                val_history: vec![HistoryEntry {
                    step: 1,
                    line: 4,
                    value: Value::Dict(dict),
                }],
            }],
            line_history: vec![LineStats {
                line_num: 4,
                times_executed: 1,
                total_time: 0.001,
            }],
        }
    }

    #[test]
    fn test_json_round_trip() {
        let result = sample_result();
        let bytes = encode(&result, Format::Json).unwrap();
        assert_eq!(bytes.first(), Some(&b'{'));
        assert_eq!(decode(&bytes).unwrap(), result);
    }

    #[test]
    fn test_json_keeps_every_float_bit() {
        let mut result = sample_result();
        result.execution_log[0].timestamp = 1792413679.8763685;
        result.execution_log[0].line_runtime.total_time = 2.3965000000000002e-5;
        result.line_history[0].total_time = 1.9501000000000002e-5;
        result.returned_value = Value::Float(0.1 + 0.2);

        let decoded = decode(&encode(&result, Format::Json).unwrap()).unwrap();
        assert_eq!(decoded.execution_log[0].timestamp.to_bits(), 1792413679.8763685f64.to_bits());
        assert_eq!(decoded.line_history[0].total_time.to_bits(), 1.9501000000000002e-5f64.to_bits());
        assert_eq!(decoded, result);
    }

    #[test]
    fn test_binary_round_trip_through_file() {
        let result = sample_result();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.tinytrace");
        write_results(&path, &result, Format::Binary).unwrap();
        assert_eq!(read_results(&path).unwrap(), result);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut bytes = encode(&sample_result(), Format::Binary).unwrap();
        bytes[BINARY_MAGIC.len()] = 99;
        assert!(matches!(decode(&bytes), Err(Error::Other(_))));
        assert!(decode(BINARY_MAGIC).is_err());
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("bin".parse::<Format>().unwrap(), Format::Binary);
        assert!("yaml".parse::<Format>().is_err());
    }
}
