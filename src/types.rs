use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Where the packed artifact gets installed.
///
/// - `Local`: into each configured project (`npm i <artifact>` in its dir).
/// - `Global`: into the global prefix (`npm i -g <artifact>`); project
///   lists are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstallScope {
    #[default]
    Local,
    Global,
}

impl FromStr for InstallScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(InstallScope::Local),
            "global" => Ok(InstallScope::Global),
            other => Err(format!(
                "invalid install.scope: {other} (expected \"local\" or \"global\")"
            )),
        }
    }
}

impl fmt::Display for InstallScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallScope::Local => f.write_str("local"),
            InstallScope::Global => f.write_str("global"),
        }
    }
}

/// Which dependency table of a project's `package.json` listed the package
/// before the session started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Dependencies,
    DevDependencies,
}

impl DependencyKind {
    /// Extra `npm i` flag needed to put the package back in this table.
    pub fn install_flag(self) -> Option<&'static str> {
        match self {
            DependencyKind::Dependencies => None,
            DependencyKind::DevDependencies => Some("-D"),
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyKind::Dependencies => f.write_str("dependencies"),
            DependencyKind::DevDependencies => f.write_str("devDependencies"),
        }
    }
}
