// src/pipeline/package.rs

//! `package.json` helpers: the package's own identity, a project's prior
//! dependency on it, and `npm ls` output parsing.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::errors::{Result, SympackError};
use crate::types::DependencyKind;

pub const PACKAGE_JSON: &str = "package.json";

/// The subset of `package.json` sympack reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageManifest {
    pub name: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    pub dev_dependencies: BTreeMap<String, String>,
}

/// Name and version of the package being developed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdentity {
    pub name: String,
    pub version: String,
}

impl PackageIdentity {
    /// File produced by `npm pack` for this package.
    pub fn artifact_file_name(&self) -> String {
        artifact_file_name(&self.name, &self.version)
    }
}

/// How a consuming project depended on the package before the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectBaseline {
    pub kind: DependencyKind,
    pub version: String,
}

impl ProjectBaseline {
    /// `name@version` spec used to restore the dependency.
    pub fn install_spec(&self, name: &str) -> String {
        format!("{name}@{}", self.version)
    }
}

impl PackageManifest {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Both `name` and `version` are required to pack.
    pub fn identity(&self) -> Result<PackageIdentity> {
        let name = non_empty(self.name.as_deref())
            .ok_or_else(|| SympackError::ConfigError(format!("{PACKAGE_JSON} has no \"name\"")))?;
        let version = non_empty(self.version.as_deref()).ok_or_else(|| {
            SympackError::ConfigError(format!("{PACKAGE_JSON} has no \"version\""))
        })?;
        Ok(PackageIdentity {
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    /// Prior dependency on `name`, runtime dependencies taking precedence.
    pub fn baseline_for(&self, name: &str) -> Option<ProjectBaseline> {
        if let Some(version) = self.dependencies.get(name) {
            return Some(ProjectBaseline {
                kind: DependencyKind::Dependencies,
                version: version.clone(),
            });
        }
        self.dev_dependencies.get(name).map(|version| ProjectBaseline {
            kind: DependencyKind::DevDependencies,
            version: version.clone(),
        })
    }
}

/// Read `<dir>/package.json`.
pub fn read_manifest(dir: &Path) -> Result<PackageManifest> {
    let path = dir.join(PACKAGE_JSON);
    let content = fs::read_to_string(&path).map_err(|err| {
        SympackError::ConfigError(format!("cannot read {}: {err}", path.display()))
    })?;
    PackageManifest::parse(&content)
}

/// `npm pack` output name: the first `@` is dropped and the first `/`
/// becomes `-`, e.g. `@scope/lib` 1.2.0 -> `scope-lib-1.2.0.tgz`.
pub fn artifact_file_name(name: &str, version: &str) -> String {
    let name = name.replacen('@', "", 1).replacen('/', "-", 1);
    format!("{name}-{version}.tgz")
}

/// Whether `npm ls <name> --json --depth=0` reports the package as
/// extraneous, i.e. present in `node_modules` without being declared.
pub fn is_extraneous(ls_json: &str, name: &str) -> Result<bool> {
    if ls_json.trim().is_empty() {
        return Ok(false);
    }
    let value: Value = serde_json::from_str(ls_json)?;
    Ok(value
        .get("dependencies")
        .and_then(|deps| deps.get(name))
        .and_then(|dep| dep.get("extraneous"))
        .and_then(Value::as_bool)
        .unwrap_or(false))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
