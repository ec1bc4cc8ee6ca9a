//! Definitions-file loading: parse `NAME=value` lines and merge them into
//! the process environment.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::EnvError;

/// File name tried when no explicit path is given.
const DEFAULT_FILE_NAME: &str = ".env";

/// What a [`EnvFileLoader::load`] call did to the environment.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    /// File actually read; `None` when none was found anywhere.
    pub path: Option<PathBuf>,
    /// Names written to the environment, in application order.
    pub set: Vec<String>,
    /// Names left alone because they were already present.
    pub skipped: Vec<String>,
}

/// Builder for merging a definitions file into the process environment.
///
/// By default the loader looks for `.env` in the current working
/// directory, walks parent directories until it finds the file, and never
/// replaces variables that are already set. A missing file is not an
/// error: the loader warns and reports that nothing happened.
///
/// Loading writes to process-global state; see the crate docs for the
/// concurrency contract.
///
/// ```no_run
/// use envcast::EnvFileLoader;
///
/// let report = EnvFileLoader::new()
///     .path("config/defaults.env")
///     .set("RUN_MODE", "dev")
///     .load()?;
/// println!("loaded {} variables", report.set.len());
/// # Ok::<(), envcast::EnvError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct EnvFileLoader {
    path: Option<PathBuf>,
    base_dir: Option<PathBuf>,
    overwrite: bool,
    overrides: Vec<(String, String)>,
}

impl EnvFileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit file to load, instead of `.env` in the base directory.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Directory whose `.env` is tried when no explicit path is set.
    /// Defaults to the current working directory.
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Replace variables that are already set. Default is to keep them.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Extra assignment applied after the file's own lines, under the
    /// same overwrite policy.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((name.into(), value.into()));
        self
    }

    /// Read the file and merge its assignments into the environment.
    ///
    /// Unparseable lines are skipped. When neither the requested path nor
    /// any ancestor directory has the file, nothing is applied (overrides
    /// included) and the report comes back empty.
    pub fn load(self) -> Result<LoadReport, EnvError> {
        let initial = self.initial_path()?;
        let mut report = LoadReport::default();

        let Some((path, content)) = read_with_ancestors(&initial)? else {
            warn!("no definitions file found for {}", initial.display());
            return Ok(report);
        };

        debug!("reading environment variables from {}", path.display());
        for line in content.lines() {
            let Some((name, value)) = parse_line(line) else {
                continue;
            };
            self.apply(&name, &value, &mut report);
        }
        for (name, value) in &self.overrides {
            self.apply(name, value, &mut report);
        }
        report.path = Some(path);
        Ok(report)
    }

    /// Absolute starting point for the lookup. Relative paths anchor at
    /// the current working directory so the parent walk can reach the
    /// filesystem root.
    fn initial_path(&self) -> Result<PathBuf, EnvError> {
        let path = match (&self.path, &self.base_dir) {
            (Some(path), _) => path.clone(),
            (None, Some(dir)) => dir.join(DEFAULT_FILE_NAME),
            (None, None) => PathBuf::from(DEFAULT_FILE_NAME),
        };
        if path.is_absolute() {
            return Ok(path);
        }
        let cwd = env::current_dir().map_err(|source| EnvError::EnvFile {
            path: path.clone(),
            source,
        })?;
        Ok(cwd.join(path))
    }

    fn apply(&self, name: &str, value: &str, report: &mut LoadReport) {
        if !self.overwrite && env::var_os(name).is_some() {
            debug!("skipping {}, already set", name);
            report.skipped.push(name.to_string());
            return;
        }
        debug!("setting {}={}", name, value);
        set_process_var(name, value);
        report.set.push(name.to_string());
    }
}

/// Load a definitions file with default settings: non-overwriting, `.env`
/// in the current directory when `path` is `None`.
pub fn read_envfile(path: Option<&Path>) -> Result<LoadReport, EnvError> {
    let mut loader = EnvFileLoader::new();
    if let Some(path) = path {
        loader = loader.path(path);
    }
    loader.load()
}

/// Read `path`, retrying with the same file name one directory up until
/// the filesystem root. `None` when nothing was found; only errors other
/// than not-found are fatal.
fn read_with_ancestors(initial: &Path) -> Result<Option<(PathBuf, String)>, EnvError> {
    let Some(file_name) = initial.file_name().map(ToOwned::to_owned) else {
        return Ok(None);
    };
    let mut path = initial.to_path_buf();
    loop {
        match fs::read_to_string(&path) {
            Ok(content) => return Ok(Some((path, content))),
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                debug!("no definitions file at {}, trying parent", path.display());
                match path.parent().and_then(Path::parent) {
                    Some(parent) => path = parent.join(&file_name),
                    None => return Ok(None),
                }
            }
            Err(source) => return Err(EnvError::EnvFile { path, source }),
        }
    }
}

/// Parse one line into a `(name, value)` assignment.
///
/// A line that does not tokenize as `NAME = value...` is skipped, as is
/// any name not matching `[A-Za-z_][A-Za-z_0-9]*`. Value tokens are joined
/// without separators, then literal `\n`/`\t` sequences (which only
/// survive tokenization inside quotes) become real newline/tab characters.
pub(crate) fn parse_line(line: &str) -> Option<(String, String)> {
    let tokens = shell_tokens(line);
    if tokens.len() < 3 || tokens[1] != "=" {
        return None;
    }
    if !is_valid_name(&tokens[0]) {
        return None;
    }
    let value = tokens[2..].concat();
    let value = value.replace(r"\n", "\n").replace(r"\t", "\t");
    Some((tokens[0].clone(), value))
}

/// Shell-style tokenizer for one line.
///
/// Whitespace separates tokens and `=` is always its own token. Single
/// quotes are fully literal, double quotes honor `\"` and `\\`, a
/// backslash escapes the next character outside quotes, and an unquoted
/// `#` starts a comment. Quoted runs splice into the surrounding token,
/// so `FOO="a b"` tokenizes as `FOO`, `=`, `a b`. An unterminated quote
/// takes the rest of the line rather than failing.
pub(crate) fn shell_tokens(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    // Distinguishes a pending empty token (from `''`) from no token.
    let mut has_current = false;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match ch {
            c if c.is_whitespace() => {
                if has_current {
                    tokens.push(std::mem::take(&mut current));
                    has_current = false;
                }
            }
            '=' => {
                if has_current {
                    tokens.push(std::mem::take(&mut current));
                    has_current = false;
                }
                tokens.push("=".to_string());
            }
            '#' => break,
            '\\' => {
                has_current = true;
                match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => current.push('\\'),
                }
            }
            '\'' => {
                has_current = true;
                loop {
                    match chars.next() {
                        Some('\'') | None => break,
                        Some(inner) => current.push(inner),
                    }
                }
            }
            '"' => {
                has_current = true;
                loop {
                    match chars.next() {
                        Some('"') | None => break,
                        Some('\\') => match chars.next() {
                            Some(quoted @ ('"' | '\\')) => current.push(quoted),
                            Some(other) => {
                                current.push('\\');
                                current.push(other);
                            }
                            None => {
                                current.push('\\');
                                break;
                            }
                        },
                        Some(inner) => current.push(inner),
                    }
                }
            }
            other => {
                has_current = true;
                current.push(other);
            }
        }
    }
    if has_current {
        tokens.push(current);
    }
    tokens
}

/// `[A-Za-z_][A-Za-z_0-9]*`
pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if first != '_' && !first.is_ascii_alphabetic() {
        return false;
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Write one variable into the process environment.
#[allow(unsafe_code)]
fn set_process_var(name: &str, value: &str) {
    // SAFETY: mutating the environment is unsound under concurrent access;
    // the crate-level contract puts serialization of loads against other
    // environment use on the caller.
    unsafe { env::set_var(name, value) };
}
