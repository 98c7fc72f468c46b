use crate::{MonoscopeError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "package.json";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub license: Option<LicenseField>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient")]
    pub keywords: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub author: Option<Person>,
    #[serde(default, deserialize_with = "lenient")]
    pub maintainers: Vec<Person>,
    #[serde(default, deserialize_with = "lenient")]
    pub contributors: Vec<Person>,
    pub workspaces: Option<WorkspacesField>,
    #[serde(default, deserialize_with = "lenient")]
    pub monoscope: Option<MonoscopeField>,
}

/// Informational fields fall back to their default when they have an
/// unexpected shape instead of failing the whole manifest.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

impl Manifest {
    pub fn parse(path: &Path, data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|source| MonoscopeError::ParseJson {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum WorkspacesField {
    Patterns(Vec<String>),
    Object {
        #[serde(default)]
        packages: Vec<String>,
    },
}

impl WorkspacesField {
    pub fn patterns(&self) -> &[String] {
        match self {
            WorkspacesField::Patterns(patterns) => patterns,
            WorkspacesField::Object { packages } => packages,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Person {
    Text(String),
    Object {
        name: Option<String>,
        email: Option<String>,
    },
}

impl Person {
    /// `"Jane <jane@example.com> (https://...)"` and `{name, email}` both
    /// reduce to the bare name; an email-only entry falls back to the email.
    pub fn display_name(&self) -> Option<String> {
        match self {
            Person::Text(text) => {
                let name = text.split(['<', '(']).next().unwrap_or_default().trim();
                (!name.is_empty()).then(|| name.to_string())
            }
            Person::Object { name, email } => name
                .as_deref()
                .or(email.as_deref())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LicenseField {
    Text(String),
    Object {
        #[serde(rename = "type")]
        kind: String,
    },
}

impl LicenseField {
    pub fn as_str(&self) -> &str {
        match self {
            LicenseField::Text(text) => text,
            LicenseField::Object { kind } => kind,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MonoscopeField {
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub kind: Option<PackageType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    App,
    Lib,
    Tool,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::App => "app",
            PackageType::Lib => "lib",
            PackageType::Tool => "tool",
        }
    }

    pub fn infer(manifest: &Manifest) -> Self {
        if let Some(kind) = manifest.monoscope.as_ref().and_then(|field| field.kind) {
            return kind;
        }

        if manifest.scripts.contains_key("start") {
            PackageType::App
        } else if manifest
            .keywords
            .iter()
            .any(|keyword| keyword.eq_ignore_ascii_case("tool"))
        {
            PackageType::Tool
        } else {
            PackageType::Lib
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub kind: PackageType,
    pub path: PathBuf,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
    #[serde(default)]
    pub maintainers: Vec<String>,
    pub description: Option<String>,
    pub license: Option<String>,
}

impl PackageInfo {
    pub fn from_manifest(manifest: Manifest, dir: &Path) -> Result<Self> {
        let kind = PackageType::infer(&manifest);
        let maintainers = collect_maintainers(&manifest);

        let name = manifest
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| MonoscopeError::ManifestInvalid {
                path: dir.join(MANIFEST_FILE),
                reason: "manifest has no name".into(),
            })?;

        Ok(PackageInfo {
            name,
            version: manifest.version.unwrap_or_else(|| "0.0.0".to_string()),
            kind,
            path: dir.to_path_buf(),
            dependencies: manifest.dependencies,
            dev_dependencies: manifest.dev_dependencies,
            peer_dependencies: manifest.peer_dependencies,
            scripts: manifest.scripts,
            maintainers,
            description: manifest.description,
            license: manifest.license.map(|license| license.as_str().to_string()),
        })
    }

    /// Every declared dependency name across prod, dev and peer maps.
    /// A name declared in more than one map is yielded once per map.
    pub fn all_dependency_names(&self) -> impl Iterator<Item = &String> {
        self.dependencies
            .keys()
            .chain(self.dev_dependencies.keys())
            .chain(self.peer_dependencies.keys())
    }

    pub fn dependency_count(&self) -> usize {
        self.dependencies.len() + self.dev_dependencies.len() + self.peer_dependencies.len()
    }

    pub fn declared_range(&self, name: &str) -> Option<&str> {
        self.dependencies
            .get(name)
            .or_else(|| self.dev_dependencies.get(name))
            .or_else(|| self.peer_dependencies.get(name))
            .map(String::as_str)
    }
}

fn collect_maintainers(manifest: &Manifest) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();

    let people = manifest
        .author
        .iter()
        .chain(manifest.maintainers.iter())
        .chain(manifest.contributors.iter());

    for person in people {
        if let Some(name) = person.display_name()
            && !out.contains(&name)
        {
            out.push(name);
        }
    }

    out
}

#[async_trait]
pub trait ManifestReader: Send + Sync {
    /// Reads the manifest inside `dir`. `Ok(None)` means the directory has no
    /// manifest and is not a package.
    async fn read(&self, dir: &Path) -> Result<Option<Manifest>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FsManifestReader;

#[async_trait]
impl ManifestReader for FsManifestReader {
    async fn read(&self, dir: &Path) -> Result<Option<Manifest>> {
        let path = dir.join(MANIFEST_FILE);

        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(source) if source.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(MonoscopeError::ReadFile { path, source }),
        };

        Manifest::parse(&path, &data).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(json: &str) -> Manifest {
        Manifest::parse(Path::new("package.json"), json).unwrap()
    }

    #[test]
    fn start_script_makes_an_app() {
        let m = manifest(r#"{ "name": "web", "scripts": { "start": "node ." } }"#);
        assert_eq!(PackageType::infer(&m), PackageType::App);
    }

    #[test]
    fn tool_keyword_makes_a_tool() {
        let m = manifest(r#"{ "name": "gen", "keywords": ["codegen", "Tool"] }"#);
        assert_eq!(PackageType::infer(&m), PackageType::Tool);
    }

    #[test]
    fn explicit_type_overrides_heuristic() {
        let m = manifest(
            r#"{ "name": "x", "scripts": { "start": "x" }, "monoscope": { "type": "lib" } }"#,
        );
        assert_eq!(PackageType::infer(&m), PackageType::Lib);
    }

    #[test]
    fn odd_informational_fields_fall_back_to_heuristic() {
        let m = manifest(
            r#"{
                "name": "svc",
                "keywords": "cli",
                "author": 42,
                "scripts": { "start": "node ." },
                "monoscope": { "type": "service" }
            }"#,
        );

        assert!(m.keywords.is_empty());
        assert!(m.author.is_none());
        assert!(m.monoscope.as_ref().unwrap().kind.is_none());
        assert_eq!(PackageType::infer(&m), PackageType::App);

        let m = manifest(r#"{ "name": "x", "monoscope": "tool", "keywords": ["tool"] }"#);
        assert!(m.monoscope.is_none());
        assert_eq!(PackageType::infer(&m), PackageType::Tool);
    }

    #[test]
    fn defaults_to_lib() {
        let m = manifest(r#"{ "name": "util" }"#);
        assert_eq!(PackageType::infer(&m), PackageType::Lib);
    }

    #[test]
    fn package_info_collects_people_and_license() {
        let m = manifest(
            r#"{
                "name": "core",
                "version": "1.2.3",
                "license": { "type": "MIT" },
                "author": "Ada Lovelace <ada@example.com>",
                "maintainers": [{ "name": "Grace" }, "Ada Lovelace"],
                "contributors": [{ "email": "bot@example.com" }],
                "peerDependencies": { "react": "^18" }
            }"#,
        );

        let info = PackageInfo::from_manifest(m, Path::new("/repo/packages/core")).unwrap();

        assert_eq!(info.name, "core");
        assert_eq!(info.version, "1.2.3");
        assert_eq!(info.license.as_deref(), Some("MIT"));
        assert_eq!(
            info.maintainers,
            vec!["Ada Lovelace", "Grace", "bot@example.com"]
        );
        assert_eq!(info.dependency_count(), 1);
        assert_eq!(info.declared_range("react"), Some("^18"));
    }

    #[test]
    fn nameless_manifest_is_invalid() {
        let m = manifest(r#"{ "version": "1.0.0" }"#);
        let err = PackageInfo::from_manifest(m, Path::new("/repo/x")).unwrap_err();
        assert!(matches!(err, MonoscopeError::ManifestInvalid { .. }));
    }

    #[test]
    fn missing_version_defaults() {
        let m = manifest(r#"{ "name": "a" }"#);
        let info = PackageInfo::from_manifest(m, Path::new("/repo/a")).unwrap();
        assert_eq!(info.version, "0.0.0");
    }

    #[tokio::test]
    async fn fs_reader_reports_missing_manifest_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let read = FsManifestReader.read(dir.path()).await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn fs_reader_surfaces_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "{ not json").unwrap();

        let err = FsManifestReader.read(dir.path()).await.unwrap_err();
        assert!(matches!(err, MonoscopeError::ParseJson { .. }));
    }
}
