//! Shared plumbing for the two command-line front ends: environment/`.env`
//! loading, logging setup, and the store-path resolution order both
//! binaries follow.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

/// Loads `.env` (if present) and initializes `env_logger`. Call once, first
/// thing in `main`.
pub fn init() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Resolves the store file path: an explicit `--store` flag wins, then the
/// `MESHSTORE_FILE_PATH` environment variable (including anything loaded
/// from `.env`), and otherwise this is a hard configuration error.
pub fn resolve_store_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    match std::env::var_os("MESHSTORE_FILE_PATH") {
        Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
        _ => bail!(
            "no store path given: pass --store or set MESHSTORE_FILE_PATH (a .env file is loaded automatically)"
        ),
    }
}

/// Expands a glob-free directory + filename pattern into a sorted list of
/// matching paths, for `--directory`/`--pattern` ingestion invocations.
pub fn collect_shard_files(directory: &std::path::Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory)
        .with_context(|| format!("reading directory {}", directory.display()))?
    {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if glob_match(pattern, &name) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// A minimal `*`-only glob matcher -- the pipeline only ever needs shell-style
/// shard filename patterns like `population_mesh_*.csv`.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    let mut parts = pattern.split('*').peekable();
    let mut rest = candidate;
    let mut first = true;
    while let Some(part) = parts.next() {
        if part.is_empty() {
            first = false;
            continue;
        }
        if first {
            if !rest.starts_with(part) {
                return false;
            }
            rest = &rest[part.len()..];
        } else if parts.peek().is_none() {
            return rest.ends_with(part);
        } else if let Some(pos) = rest.find(part) {
            rest = &rest[pos + part.len()..];
        } else {
            return false;
        }
        first = false;
    }
    true
}
