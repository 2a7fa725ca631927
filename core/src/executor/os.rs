//! OS-level functions
//!
//! `os.read_text(path)` and friends are the script's sandboxed system calls.
//! They need no declaration: the `os` namespace is reserved and its members
//! form a fixed set. Like external functions they are never performed by the
//! engine; the run suspends and the host answers the call.

use serde::{Deserialize, Serialize};

/// Namespace holding the OS functions
pub const NAMESPACE: &str = "os";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OsFunction {
    Getenv,
    Time,
    Exists,
    IsFile,
    IsDir,
    ReadText,
    WriteText,
    ListDir,
    Mkdir,
    Remove,
    Stat,
}

const NAMES: &[(&str, OsFunction)] = &[
    ("getenv", OsFunction::Getenv),
    ("time", OsFunction::Time),
    ("exists", OsFunction::Exists),
    ("is_file", OsFunction::IsFile),
    ("is_dir", OsFunction::IsDir),
    ("read_text", OsFunction::ReadText),
    ("write_text", OsFunction::WriteText),
    ("listdir", OsFunction::ListDir),
    ("mkdir", OsFunction::Mkdir),
    ("remove", OsFunction::Remove),
    ("stat", OsFunction::Stat),
];

impl OsFunction {
    /// Look up a member of the `os` namespace (`read_text`, not `os.read_text`)
    pub fn from_name(name: &str) -> Option<OsFunction> {
        NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, function)| *function)
    }

    /// Qualified name as reported to the host, e.g. `os.read_text`
    pub fn qualified_name(self) -> String {
        let member = NAMES
            .iter()
            .find(|(_, function)| *function == self)
            .map(|(name, _)| *name)
            .unwrap_or("unknown");
        format!("{}.{}", NAMESPACE, member)
    }
}
