use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use thumbdeck_contracts::error::PipelineError;

pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const SCRAPECREATORS_API_KEY: &str = "SCRAPECREATORS_API_KEY";
pub const STYLE_GUIDE_ENV: &str = "THUMBDECK_STYLE_GUIDE";
pub const DEFAULT_STYLE_GUIDE: &str = "brand-style.md";

/// Non-empty value of `key`, if any.
pub fn env_value(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

pub fn require_env(key: &str) -> Result<String, PipelineError> {
    env_value(key).ok_or_else(|| PipelineError::Configuration {
        key: key.to_string(),
    })
}

/// A directory counts as a project root when it holds a `.git` directory or a
/// workspace `Cargo.toml`.
pub fn is_project_root(dir: &Path) -> bool {
    if dir.join(".git").is_dir() {
        return true;
    }
    fs::read_to_string(dir.join("Cargo.toml"))
        .map(|manifest| manifest.contains("[workspace]"))
        .unwrap_or(false)
}

/// Walk up from `start` to the nearest `.env`, giving up after the project root.
pub fn find_env_file(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(".env");
        if candidate.is_file() {
            return Some(candidate);
        }
        if is_project_root(dir) {
            return None;
        }
        current = dir.parent();
    }
    None
}

/// Locate a `.env` near the executable (or `start`), else in the working
/// directory, and merge it into the process environment. Variables that are
/// already set to a non-empty value win.
pub fn load_env_files(start: Option<&Path>) -> Option<PathBuf> {
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    let start = start.map(Path::to_path_buf).or(exe_dir);

    let found = start
        .as_deref()
        .and_then(find_env_file)
        .or_else(|| {
            env::current_dir()
                .ok()
                .map(|cwd| cwd.join(".env"))
                .filter(|path| path.is_file())
        })?;

    match apply_env_file(&found) {
        Ok(applied) => debug!("loaded {applied} variable(s) from {}", found.display()),
        Err(err) => warn!("ignoring unreadable {}: {err}", found.display()),
    }
    Some(found)
}

fn apply_env_file(path: &Path) -> Result<usize, dotenvy::Error> {
    let mut applied = 0;
    for item in dotenvy::from_path_iter(path)? {
        let (key, value) = item?;
        if env_value(&key).is_none() {
            env::set_var(&key, value);
            applied += 1;
        }
    }
    Ok(applied)
}

/// `--style-guide`, then `THUMBDECK_STYLE_GUIDE`, then `./brand-style.md`.
pub fn resolve_style_guide_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| env_value(STYLE_GUIDE_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STYLE_GUIDE))
}
