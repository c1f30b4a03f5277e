//! Config file persistence
//!
//! The worker is constructed from a file path, so the configuration
//! is written to disk before the worker exists. The file is rewritten
//! in full on every start.
//!
//! The worker reads the file with a YAML 1.1 parser, where plain
//! scalars such as `yes`, `on`, `1_000`, `12:30` or `2024-01-01` are
//! not strings. Every string is therefore written double-quoted; a
//! JSON string literal is a valid YAML double-quoted scalar.

use crate::config::SyncConfig;
use crate::error::Result;
use serde::ser::Error as _;
use serde_yaml::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Where the config file lives unless told otherwise.
pub const DEFAULT_CONFIG_PATH: &str = "/tmp/config.yaml";

const INDENT: &str = "  ";

/// Write `config` to `path` as block-style YAML, replacing any
/// existing file.
///
/// # Errors
///
/// Returns an error if the configuration cannot be serialized or the
/// file cannot be written.
pub fn persist(config: &SyncConfig, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let yaml = to_yaml(config)?;

    debug!("Writing config to {}", path.display());
    fs::write(path, yaml)?;
    Ok(())
}

/// Read a config file previously written by [`persist`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid
/// worker configuration.
pub fn load(path: impl AsRef<Path>) -> Result<SyncConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    Ok(serde_yaml::from_str(&contents)?)
}

fn to_yaml(config: &SyncConfig) -> Result<String> {
    let Value::Mapping(root) = serde_yaml::to_value(config)? else {
        return Err(serde_yaml::Error::custom("config must serialize to a mapping").into());
    };

    let mut out = String::new();
    write_mapping(&mut out, &root, 0)?;
    Ok(out)
}

fn write_mapping(out: &mut String, mapping: &serde_yaml::Mapping, depth: usize) -> Result<()> {
    for (key, value) in mapping {
        out.push_str(&INDENT.repeat(depth));
        out.push_str(&key_name(key)?);
        out.push(':');

        match value {
            Value::Mapping(nested) if !nested.is_empty() => {
                out.push('\n');
                write_mapping(out, nested, depth + 1)?;
            }
            Value::Mapping(_) => out.push_str(" {}\n"),
            _ => {
                out.push(' ');
                out.push_str(&scalar(value)?);
                out.push('\n');
            }
        }
    }
    Ok(())
}

/// Field names go out plain; anything else is quoted like a value.
fn key_name(key: &Value) -> Result<String> {
    match key {
        Value::String(s)
            if !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') =>
        {
            Ok(s.clone())
        }
        other => scalar(other),
    }
}

fn scalar(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => {
            let quoted = serde_json::to_string(s)
                .map_err(|e| serde_yaml::Error::custom(e.to_string()))?;
            Ok(escape_non_printable(&quoted))
        }
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => {
            Err(serde_yaml::Error::custom("unsupported value in config").into())
        }
    }
}

/// JSON leaves DEL, the C1 controls and the Unicode line separators
/// raw. A YAML 1.1 reader either refuses them or folds them as line
/// breaks.
fn escape_non_printable(quoted: &str) -> String {
    let mut out = String::with_capacity(quoted.len());
    for c in quoted.chars() {
        if matches!(c, '\u{7f}'..='\u{9f}' | '\u{2028}' | '\u{2029}' | '\u{fffe}' | '\u{ffff}') {
            out.push_str(&format!("\\u{:04x}", u32::from(c)));
        } else {
            out.push(c);
        }
    }
    out
}
