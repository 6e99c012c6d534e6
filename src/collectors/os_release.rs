use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("release info unavailable")]
    Unavailable,
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

/// Key/value pairs from an os-release file.
#[derive(Debug, Clone, Default)]
pub struct OsRelease {
    fields: HashMap<String, String>,
}

impl OsRelease {
    /// Tries each candidate in order; a missing file moves on to the next one.
    pub fn load(candidates: &[PathBuf]) -> Result<Self, ReleaseError> {
        for path in candidates {
            match fs::read_to_string(path) {
                Ok(text) => return Ok(Self::parse(&text)),
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(source) => return Err(read_error(path, source)),
            }
        }
        Err(ReleaseError::Unavailable)
    }

    pub fn parse(text: &str) -> Self {
        let fields = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_string(), unquote(value.trim()).to_string()))
            .collect();
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.get("NAME")
    }

    /// `PRETTY_NAME`, or `NAME` when the pretty form is missing or empty.
    pub fn display_name(&self) -> Option<&str> {
        self.get("PRETTY_NAME").or_else(|| self.name())
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

fn read_error(path: &Path, source: std::io::Error) -> ReleaseError {
    ReleaseError::Read {
        path: path.display().to_string(),
        source,
    }
}
