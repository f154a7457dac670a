//! Script registry: loads `*.rhai` files from a directory.
//!
//! A script's name is its file stem. Leading `//` comment lines may carry
//! annotations:
//!
//! ```text
//! // @every 30s
//! // @ignore
//! ```
//!
//! `@every` schedules the script on an interval, `@ignore` keeps it out of
//! the scheduler while leaving it callable over HTTP and from workflows.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use thiserror::Error;

use crate::config::parse_duration;

const SCRIPT_EXTENSION: &str = "rhai";

/// Errors that can occur while loading scripts.
#[derive(Debug, Error)]
pub enum ScriptLoadError {
    /// The scripts directory or a script file could not be read.
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A file name is not valid UTF-8 or has an empty stem.
    #[error("Invalid script file name: {0}")]
    InvalidName(PathBuf),

    /// An annotation could not be parsed.
    #[error("Invalid annotation in script '{script}': {annotation}")]
    InvalidAnnotation {
        /// Script the annotation belongs to.
        script: String,
        /// The offending line.
        annotation: String,
    },
}

/// A loaded script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    /// Unique name, taken from the file stem.
    pub name: String,
    /// Source text.
    pub body: String,
    /// Interval schedule from `@every`.
    pub every: Option<Duration>,
    /// Set by `@ignore`.
    pub ignore: bool,
}

impl Script {
    /// Builds a script from its name and source, parsing annotations.
    pub fn parse(name: impl Into<String>, body: impl Into<String>) -> Result<Self, ScriptLoadError> {
        let name = name.into();
        let body = body.into();
        let mut every = None;
        let mut ignore = false;

        for line in body.lines().map(str::trim) {
            if line.is_empty() {
                continue;
            }
            let Some(comment) = line.strip_prefix("//") else {
                break;
            };
            let comment = comment.trim();
            if let Some(value) = comment.strip_prefix("@every") {
                let parsed = parse_duration(value.trim())
                    .filter(|d| !d.is_zero())
                    .ok_or_else(|| ScriptLoadError::InvalidAnnotation {
                        script: name.clone(),
                        annotation: line.to_string(),
                    })?;
                every = Some(parsed);
            } else if comment == "@ignore" {
                ignore = true;
            }
        }

        Ok(Self { name, body, every, ignore })
    }

    /// True when the scheduler should run this script.
    pub fn is_scheduled(&self) -> bool {
        self.every.is_some() && !self.ignore
    }
}

/// Immutable set of scripts, addressed by name.
#[derive(Debug, Clone, Default)]
pub struct ScriptRegistry {
    scripts: HashMap<String, Arc<Script>>,
}

impl ScriptRegistry {
    /// Builds a registry from already loaded scripts. Later duplicates replace
    /// earlier ones.
    pub fn from_scripts(scripts: impl IntoIterator<Item = Script>) -> Self {
        let scripts = scripts.into_iter().map(|s| (s.name.clone(), Arc::new(s))).collect();
        Self { scripts }
    }

    /// Loads every `*.rhai` file directly under `dir`.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ScriptLoadError> {
        let dir = dir.as_ref();
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ScriptLoadError::Io { path, source }
        };

        let mut scripts = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err(dir))? {
            let path = entry.map_err(io_err(dir))?.path();
            if !path.is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(SCRIPT_EXTENSION)
            {
                continue;
            }

            let name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .filter(|stem| !stem.is_empty())
                .ok_or_else(|| ScriptLoadError::InvalidName(path.clone()))?
                .to_string();
            let body = fs::read_to_string(&path).map_err(io_err(&path))?;
            scripts.push(Script::parse(name, body)?);
        }

        let registry = Self::from_scripts(scripts);
        tracing::info!(dir = %dir.display(), count = registry.len(), "Scripts loaded.");
        Ok(registry)
    }

    /// Looks up a script by name.
    pub fn get(&self, name: &str) -> Option<Arc<Script>> {
        self.scripts.get(name).cloned()
    }

    /// Names of all loaded scripts, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.scripts.keys().cloned().collect()
    }

    /// Scripts the scheduler should run, sorted by name.
    pub fn scheduled(&self) -> Vec<Arc<Script>> {
        let mut scheduled: Vec<_> =
            self.scripts.values().filter(|s| s.is_scheduled()).cloned().collect();
        scheduled.sort_by(|a, b| a.name.cmp(&b.name));
        scheduled
    }

    /// Number of loaded scripts.
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    /// True if no scripts are loaded.
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_parse_annotations() {
        let script = Script::parse(
            "disk",
            "// Checks disk usage.\n// @every 5m\n// @ignore\nlet x = 1;\n// @every 1s\n",
        )
        .unwrap();
        assert_eq!(script.every, Some(Duration::from_secs(300)));
        assert!(script.ignore);
        assert!(!script.is_scheduled());
    }

    #[test]
    fn test_annotations_after_code_are_ignored() {
        let script = Script::parse("late", "let x = 1;\n// @every 1s\n").unwrap();
        assert_eq!(script.every, None);
    }

    #[test]
    fn test_invalid_every_is_rejected() {
        let err = Script::parse("bad", "// @every soon\n").unwrap_err();
        assert!(matches!(err, ScriptLoadError::InvalidAnnotation { ref script, .. } if script == "bad"));

        let err = Script::parse("zero", "// @every 0s\n").unwrap_err();
        assert!(matches!(err, ScriptLoadError::InvalidAnnotation { .. }));
    }

    #[test]
    fn test_load_dir_reads_only_rhai_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("cpu.rhai"), "// @every 30s\nlet load = 1;").unwrap();
        fs::write(dir.path().join("manual.rhai"), "let x = 2;").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a script").unwrap();
        fs::create_dir(dir.path().join("nested.rhai")).unwrap();

        let registry = ScriptRegistry::load_dir(dir.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("manual").unwrap().body, "let x = 2;");
        assert!(registry.get("notes").is_none());

        let scheduled = registry.scheduled();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].name, "cpu");
        assert_eq!(scheduled[0].every, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_load_missing_dir() {
        let err = ScriptRegistry::load_dir("/definitely/not/here").unwrap_err();
        assert!(matches!(err, ScriptLoadError::Io { .. }));
    }
}
