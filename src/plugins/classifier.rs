//! Plugin classification by file extension

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Interpreter a plugin script is run with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpreter {
    /// `.py`
    Python,
    /// `.rb`
    Ruby,
    /// `.sh`
    Shell,
    /// `.pl`
    Perl,
    /// `.ex`
    Elixir,
}

impl Interpreter {
    /// Every supported interpreter, in extension-table order
    pub const ALL: [Self; 5] = [
        Self::Python,
        Self::Ruby,
        Self::Shell,
        Self::Perl,
        Self::Elixir,
    ];

    /// Map a file extension (without the dot) to an interpreter
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "py" => Some(Self::Python),
            "rb" => Some(Self::Ruby),
            "sh" => Some(Self::Shell),
            "pl" => Some(Self::Perl),
            "ex" => Some(Self::Elixir),
            _ => None,
        }
    }

    /// File extension handled by this interpreter
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Python => "py",
            Self::Ruby => "rb",
            Self::Shell => "sh",
            Self::Perl => "pl",
            Self::Elixir => "ex",
        }
    }
}

impl fmt::Display for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Python => "python",
            Self::Ruby => "ruby",
            Self::Shell => "shell",
            Self::Perl => "perl",
            Self::Elixir => "elixir",
        };
        f.write_str(name)
    }
}

/// A plugin script found on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRecord {
    /// Interpreter selected from the file extension
    pub interpreter: Interpreter,
    /// File name with the extension stripped
    pub name: String,
    /// Path the plugin was discovered at
    pub path: PathBuf,
}

/// Classify a file as a plugin
///
/// Returns `None` for files whose extension is not in the interpreter
/// table. Skipped files are logged, never treated as errors.
#[must_use]
pub fn classify(path: &Path) -> Option<PluginRecord> {
    let interpreter = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(Interpreter::from_extension);

    let (Some(interpreter), Some(name)) = (interpreter, path.file_stem().and_then(|s| s.to_str()))
    else {
        tracing::info!(path = %path.display(), "unsupported plugin type, skipping");
        return None;
    };

    tracing::debug!(
        path = %path.display(),
        name,
        interpreter = %interpreter,
        "classified plugin"
    );

    Some(PluginRecord {
        interpreter,
        name: name.to_string(),
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_every_supported_extension() {
        for interpreter in Interpreter::ALL {
            let path = PathBuf::from(format!("/plugins/tool.{}", interpreter.extension()));
            let record = classify(&path).unwrap();
            assert_eq!(record.interpreter, interpreter);
            assert_eq!(record.name, "tool");
            assert_eq!(record.path, path);
        }
    }

    #[test]
    fn unsupported_extension_yields_nothing() {
        assert!(classify(Path::new("/plugins/notes.txt")).is_none());
        assert!(classify(Path::new("/plugins/script.js")).is_none());
    }

    #[test]
    fn missing_extension_yields_nothing() {
        assert!(classify(Path::new("/plugins/Makefile")).is_none());
    }

    #[test]
    fn extension_match_is_case_sensitive() {
        assert!(classify(Path::new("/plugins/shout.PY")).is_none());
    }

    #[test]
    fn only_last_extension_is_stripped() {
        let record = classify(Path::new("/plugins/backup.tar.sh")).unwrap();
        assert_eq!(record.interpreter, Interpreter::Shell);
        assert_eq!(record.name, "backup.tar");
    }

    #[test]
    fn interpreter_serializes_lowercase() {
        let json = serde_json::to_string(&Interpreter::Elixir).unwrap();
        assert_eq!(json, "\"elixir\"");
    }
}
