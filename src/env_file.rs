//! `KEY=value` environment files.
//!
//! Merging keeps every unrelated line (comments included) where it was, replaces assignments
//! of incoming keys in place and appends the others. Files are swapped atomically.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

static ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<export>export\s+)?(?P<key>[A-Za-z_][A-Za-z0-9_.]*)\s*=(?P<value>.*)$")
        .expect("invalid assignment regex")
});

#[derive(Error, Debug)]
pub enum EnvFileError {
    #[error("Cannot read env file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Cannot write env file `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

struct Assignment<'a> {
    exported: bool,
    key: &'a str,
    raw_value: &'a str,
}

fn parse_line(line: &str) -> Option<Assignment<'_>> {
    if line.trim_start().starts_with('#') {
        return None;
    }

    let captures = ASSIGNMENT.captures(line)?;
    Some(Assignment {
        exported: captures.name("export").is_some(),
        key: captures.name("key")?.as_str(),
        raw_value: captures.name("value")?.as_str(),
    })
}

fn needs_quotes(value: &str) -> bool {
    value.chars().any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '\\' | '`' | '$'))
        || value.starts_with('=')
        || value.ends_with('=')
}

fn quote(value: &str) -> String {
    if !needs_quotes(value) {
        return value.to_string();
    }

    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r");
    format!("\"{}\"", escaped)
}

fn unquote(raw_value: &str) -> String {
    let value = raw_value.trim();

    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        let mut unescaped = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                unescaped.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => unescaped.push('\n'),
                Some('r') => unescaped.push('\r'),
                Some(other) => unescaped.push(other),
                None => unescaped.push('\\'),
            }
        }
        return unescaped;
    }

    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].to_string();
    }

    // unquoted values may carry a trailing comment
    match value.find(" #") {
        Some(idx) => value[..idx].trim_end().to_string(),
        None => value.to_string(),
    }
}

fn format_assignment(exported: bool, key: &str, value: &str) -> String {
    format!("{}{}={}", if exported { "export " } else { "" }, key, quote(value))
}

fn read_to_string_if_exists(path: &Path) -> Result<String, EnvFileError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(EnvFileError::Read {
            path: path.to_path_buf(),
            source: err,
        }),
    }
}

/// Parses an env file into its key/values. A missing file reads as empty, the last
/// assignment of a key wins.
pub fn read<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, String>, EnvFileError> {
    let content = read_to_string_if_exists(path.as_ref())?;

    Ok(content
        .lines()
        .filter_map(parse_line)
        .map(|assignment| (assignment.key.to_string(), unquote(assignment.raw_value)))
        .collect())
}

/// Content of `existing` once `key_values` are merged into it.
pub fn merge_content(existing: &str, key_values: &BTreeMap<String, String>) -> String {
    let mut seen: Vec<&str> = vec![];
    let mut lines: Vec<String> = existing
        .lines()
        .map(|line| match parse_line(line) {
            Some(assignment) => match key_values.get(assignment.key) {
                Some(value) => {
                    seen.push(assignment.key);
                    format_assignment(assignment.exported, assignment.key, value)
                }
                None => line.to_string(),
            },
            None => line.to_string(),
        })
        .collect();

    for (key, value) in key_values {
        if !seen.contains(&key.as_str()) {
            lines.push(format_assignment(false, key, value));
        }
    }

    if lines.is_empty() {
        return String::new();
    }

    let mut content = lines.join("\n");
    content.push('\n');
    content
}

/// Merges `key_values` into the env file at `path`, creating it when missing.
/// Nothing is written when the file already holds these values.
pub fn merge<P: AsRef<Path>>(path: P, key_values: &BTreeMap<String, String>) -> Result<(), EnvFileError> {
    let path = path.as_ref();
    let existing = read_to_string_if_exists(path)?;
    let merged = merge_content(&existing, key_values);

    if merged == existing {
        debug!("env file `{}` already up to date", path.display());
        return Ok(());
    }

    let write_error = |source: std::io::Error| EnvFileError::Write {
        path: path.to_path_buf(),
        source,
    };

    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&directory).map_err(write_error)?;

    // same directory as the target, so persisting is a rename on the same filesystem
    let mut tmp_file = NamedTempFile::new_in(&directory).map_err(write_error)?;
    tmp_file.write_all(merged.as_bytes()).map_err(write_error)?;
    tmp_file.flush().map_err(write_error)?;
    tmp_file.persist(path).map_err(|err| write_error(err.error))?;

    info!("wrote {} key(s) into `{}`", key_values.len(), path.display());

    Ok(())
}
