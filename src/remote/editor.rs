//! Locating the local editor binary that `snow remote` launches.

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};

/// Editors that can attach to a remote development service.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EditorKind {
    /// Cursor.
    Cursor,
    /// Visual Studio Code.
    Code,
}

impl EditorKind {
    /// Command name of the editor's launcher.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cursor => "cursor",
            Self::Code => "code",
        }
    }

    /// Remediation shown when the editor cannot be found.
    #[must_use]
    pub const fn install_hint(self) -> &'static str {
        match self {
            Self::Cursor => {
                "install Cursor and run \"Shell Command: Install 'cursor' command in PATH\" \
                 from its command palette"
            }
            Self::Code => {
                "install Visual Studio Code and run \"Shell Command: Install 'code' command \
                 in PATH\" from its command palette"
            }
        }
    }
}

impl fmt::Display for EditorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for EditorKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cursor" => Ok(Self::Cursor),
            "code" | "vscode" => Ok(Self::Code),
            other => Err(format!(
                "unsupported editor {other:?}; expected \"cursor\" or \"code\""
            )),
        }
    }
}

/// A located editor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EditorInstall {
    /// Which editor was found.
    pub kind: EditorKind,
    /// Full path to the launcher.
    pub binary: Utf8PathBuf,
    /// Directory to prepend to `PATH` when the launcher is not already on it.
    pub path_prefix: Option<Utf8PathBuf>,
}

/// Searches `PATH` and then well-known install directories.
#[derive(Clone, Debug, Default)]
pub struct EditorLocator {
    search_path: Option<OsString>,
    known_dirs: Vec<(EditorKind, Utf8PathBuf)>,
}

impl EditorLocator {
    /// Builds a locator over an explicit `PATH` value and fallback
    /// directories.
    #[must_use]
    pub const fn new(
        search_path: Option<OsString>,
        known_dirs: Vec<(EditorKind, Utf8PathBuf)>,
    ) -> Self {
        Self {
            search_path,
            known_dirs,
        }
    }

    /// Builds a locator from the process `PATH` and the platform's
    /// application bundle locations.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(env::var_os("PATH"), default_known_dirs())
    }

    /// Finds `kind`, preferring `PATH`.
    #[must_use]
    pub fn locate(&self, kind: EditorKind) -> Option<EditorInstall> {
        if let Some(binary) = self.on_search_path(kind) {
            return Some(EditorInstall {
                kind,
                binary,
                path_prefix: None,
            });
        }
        self.known_dirs
            .iter()
            .filter(|(candidate, _)| *candidate == kind)
            .map(|(_, dir)| dir)
            .find(|dir| is_launcher(&dir.join(kind.as_str())))
            .map(|dir| EditorInstall {
                kind,
                binary: dir.join(kind.as_str()),
                path_prefix: Some(dir.clone()),
            })
    }

    fn on_search_path(&self, kind: EditorKind) -> Option<Utf8PathBuf> {
        let search_path = self.search_path.as_ref()?;
        env::split_paths(search_path)
            .filter_map(|dir| Utf8PathBuf::from_path_buf(dir).ok())
            .map(|dir| dir.join(kind.as_str()))
            .find(|candidate| is_launcher(candidate))
    }
}

fn is_launcher(path: &Utf8Path) -> bool {
    path.is_file()
}

#[cfg(target_os = "macos")]
fn default_known_dirs() -> Vec<(EditorKind, Utf8PathBuf)> {
    vec![
        (
            EditorKind::Cursor,
            Utf8PathBuf::from("/Applications/Cursor.app/Contents/Resources/app/bin"),
        ),
        (
            EditorKind::Code,
            Utf8PathBuf::from("/Applications/Visual Studio Code.app/Contents/Resources/app/bin"),
        ),
    ]
}

#[cfg(not(target_os = "macos"))]
const fn default_known_dirs() -> Vec<(EditorKind, Utf8PathBuf)> {
    Vec::new()
}
