//! Version descriptor documents and the loader overlay merge.
//!
//! The base descriptor comes from the game's version manifest, the loader
//! descriptor from the loader's metadata service. [`merge_loader`] folds the
//! second into the first: libraries are matched by `group:artifact`, argument
//! templates are appended and the loader's main class wins.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Remote index of all published game versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionManifestIndex {
    pub latest: LatestVersions,
    pub versions: Vec<VersionManifestEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

impl VersionManifestIndex {
    /// Look up a version id. `latest` and `latest-snapshot` are accepted as aliases.
    pub fn find(&self, id: &str) -> Option<&VersionManifestEntry> {
        let id = match id {
            "latest" | "latest-release" => self.latest.release.as_str(),
            "latest-snapshot" => self.latest.snapshot.as_str(),
            other => other,
        };
        self.versions.iter().find(|entry| entry.id == id)
    }
}

/// One entry of the version index, stored on the install it was chosen for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionManifestEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub release_time: String,
}

/// Platform predicate attached to libraries and conditional arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<BTreeMap<String, bool>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

/// A launch argument: either a plain template string or a rule-gated value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentToken {
    Literal(String),
    Conditional { rules: Vec<Rule>, value: ArgumentValue },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    One(String),
    Many(Vec<String>),
}

impl ArgumentValue {
    pub fn values(&self) -> &[String] {
        match self {
            ArgumentValue::One(value) => std::slice::from_ref(value),
            ArgumentValue::Many(values) => values,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<ArgumentToken>,
    #[serde(default)]
    pub jvm: Vec<ArgumentToken>,
}

/// A downloadable file. Loader libraries carry no checksum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    #[serde(default)]
    pub downloads: LibraryDownloads,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDownload {
    pub sha1: String,
    #[serde(default)]
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDownloads {
    pub client: ClientDownload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetIndexRef {
    pub id: String,
    #[serde(default)]
    pub url: String,
}

/// Per-version descriptor, possibly already merged with a loader overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDetails {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    pub main_class: String,
    #[serde(default)]
    pub arguments: Arguments,
    #[serde(default)]
    pub libraries: Vec<Library>,
    pub downloads: VersionDownloads,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndexRef>,
}

impl VersionDetails {
    /// Name of the asset index the game should load.
    pub fn assets_index_name(&self) -> &str {
        self.asset_index
            .as_ref()
            .map(|index| index.id.as_str())
            .unwrap_or(&self.id)
    }
}

/// Loader profile as served by the loader metadata endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderDetails {
    pub id: String,
    #[serde(default)]
    pub inherits_from: String,
    #[serde(default)]
    pub main_class: Option<String>,
    #[serde(default)]
    pub arguments: Arguments,
    #[serde(default)]
    pub libraries: Vec<LoaderLibrary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderLibrary {
    pub name: String,
    /// Base URL of the maven repository hosting the artifact
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Entry of the loader version listing for one game version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderVersionEntry {
    pub loader: LoaderVersion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderVersion {
    pub version: String,
    #[serde(default)]
    pub stable: bool,
}

/// Maven `group:artifact:version[:classifier]` coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryCoordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub classifier: Option<String>,
}

impl LibraryCoordinate {
    pub fn parse(name: &str) -> Result<Self> {
        let parts: Vec<&str> = name.split(':').collect();
        if parts.len() < 3 || parts.len() > 4 || parts.iter().any(|p| p.is_empty()) {
            bail!("Invalid library coordinate: {}", name);
        }
        Ok(Self {
            group: parts[0].to_string(),
            artifact: parts[1].to_string(),
            version: parts[2].to_string(),
            classifier: parts.get(3).map(|c| c.to_string()),
        })
    }

    /// Repository-relative jar path, always `/`-separated.
    pub fn path(&self) -> String {
        let file = match &self.classifier {
            Some(classifier) => format!("{}-{}-{}.jar", self.artifact, self.version, classifier),
            None => format!("{}-{}.jar", self.artifact, self.version),
        };
        format!(
            "{}/{}/{}/{}",
            self.group.replace('.', "/"),
            self.artifact,
            self.version,
            file
        )
    }

    fn same_library(&self, other: &LibraryCoordinate) -> bool {
        self.group == other.group && self.artifact == other.artifact
    }
}

fn loader_library(library: &LoaderLibrary, coordinate: &LibraryCoordinate) -> Library {
    let path = coordinate.path();
    let base = if library.url.ends_with('/') {
        library.url.clone()
    } else {
        format!("{}/", library.url)
    };
    Library {
        name: library.name.clone(),
        downloads: LibraryDownloads {
            artifact: Some(Artifact {
                url: format!("{base}{path}"),
                path,
                sha1: None,
                size: library.size,
            }),
        },
        rules: None,
    }
}

/// Overlay `loader` onto `base`.
pub fn merge_loader(base: &mut VersionDetails, loader: &LoaderDetails) {
    for library in &loader.libraries {
        let coordinate = match LibraryCoordinate::parse(&library.name) {
            Ok(coordinate) => coordinate,
            Err(e) => {
                warn!(library = %library.name, error = %e, "Skipping loader library");
                continue;
            }
        };
        let merged = loader_library(library, &coordinate);

        let existing = base.libraries.iter().position(|candidate| {
            LibraryCoordinate::parse(&candidate.name)
                .map(|c| c.same_library(&coordinate))
                .unwrap_or(false)
        });
        match existing {
            Some(index) => base.libraries[index] = merged,
            None => base.libraries.push(merged),
        }
    }

    base.arguments.jvm.extend(loader.arguments.jvm.iter().cloned());
    base.arguments.game.extend(loader.arguments.game.iter().cloned());

    if let Some(main_class) = &loader.main_class {
        base.main_class = main_class.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_library(name: &str) -> Library {
        let coordinate = LibraryCoordinate::parse(name).unwrap();
        Library {
            name: name.to_string(),
            downloads: LibraryDownloads {
                artifact: Some(Artifact {
                    path: coordinate.path(),
                    sha1: Some("abc".to_string()),
                    size: Some(1),
                    url: format!("https://libraries.example.net/{}", coordinate.path()),
                }),
            },
            rules: None,
        }
    }

    #[test]
    fn test_coordinate_path() {
        let coordinate = LibraryCoordinate::parse("net.fabricmc:fabric-loader:0.15.0").unwrap();
        assert_eq!(
            coordinate.path(),
            "net/fabricmc/fabric-loader/0.15.0/fabric-loader-0.15.0.jar"
        );

        let natives = LibraryCoordinate::parse("org.lwjgl:lwjgl:3.3.3:natives-linux").unwrap();
        assert_eq!(
            natives.path(),
            "org/lwjgl/lwjgl/3.3.3/lwjgl-3.3.3-natives-linux.jar"
        );

        assert!(LibraryCoordinate::parse("just-a-name").is_err());
        assert!(LibraryCoordinate::parse("a::1").is_err());
    }

    #[test]
    fn test_argument_tokens_deserialize() {
        let tokens: Vec<ArgumentToken> = serde_json::from_str(
            r#"[
                "--username",
                {"rules":[{"action":"allow","features":{"is_demo_user":true}}],"value":"--demo"},
                {"rules":[{"action":"allow","os":{"name":"osx"}}],"value":["-XstartOnFirstThread"]}
            ]"#,
        )
        .unwrap();
        assert_eq!(tokens[0], ArgumentToken::Literal("--username".to_string()));
        match &tokens[2] {
            ArgumentToken::Conditional { value, .. } => {
                assert_eq!(value.values(), ["-XstartOnFirstThread".to_string()]);
            }
            other => panic!("unexpected token {other:?}"),
        }
    }

    #[test]
    fn test_index_aliases() {
        let index: VersionManifestIndex = serde_json::from_str(
            r#"{"latest":{"release":"1.21","snapshot":"24w10a"},
                "versions":[
                  {"id":"24w10a","type":"snapshot","url":"u1","time":"t","releaseTime":"t"},
                  {"id":"1.21","type":"release","url":"u2","time":"t","releaseTime":"t"}
                ]}"#,
        )
        .unwrap();
        assert_eq!(index.find("latest").map(|e| e.url.as_str()), Some("u2"));
        assert_eq!(index.find("latest-snapshot").map(|e| e.kind.as_str()), Some("snapshot"));
        assert!(index.find("0.0.1").is_none());
    }

    #[test]
    fn test_merge_replaces_in_place_and_appends() {
        let mut base = VersionDetails {
            id: "1.21".to_string(),
            kind: "release".to_string(),
            main_class: "net.minecraft.client.main.Main".to_string(),
            arguments: Arguments {
                game: vec![ArgumentToken::Literal("--base".to_string())],
                jvm: vec![],
            },
            libraries: vec![
                base_library("com.example:first:1.0"),
                base_library("org.example:foo:1.0"),
                base_library("com.example:last:1.0"),
            ],
            downloads: VersionDownloads {
                client: ClientDownload {
                    sha1: "c".to_string(),
                    size: 0,
                    url: "client".to_string(),
                },
            },
            asset_index: None,
        };
        let loader = LoaderDetails {
            id: "fabric-loader-0.15.0-1.21".to_string(),
            inherits_from: "1.21".to_string(),
            main_class: Some("net.fabricmc.loader.impl.launch.knot.KnotClient".to_string()),
            arguments: Arguments {
                game: vec![ArgumentToken::Literal("--loader".to_string())],
                jvm: vec![ArgumentToken::Literal("-DFabricMcEmu=x".to_string())],
            },
            libraries: vec![
                LoaderLibrary {
                    name: "org.example:foo:2.0".to_string(),
                    url: "https://maven.example.net".to_string(),
                    sha1: None,
                    size: None,
                },
                LoaderLibrary {
                    name: "net.fabricmc:fabric-loader:0.15.0".to_string(),
                    url: "https://maven.example.net/".to_string(),
                    sha1: None,
                    size: None,
                },
            ],
        };

        merge_loader(&mut base, &loader);

        let names: Vec<_> = base.libraries.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "com.example:first:1.0",
                "org.example:foo:2.0",
                "com.example:last:1.0",
                "net.fabricmc:fabric-loader:0.15.0",
            ]
        );
        let foo = base.libraries[1].downloads.artifact.as_ref().unwrap();
        assert_eq!(foo.url, "https://maven.example.net/org/example/foo/2.0/foo-2.0.jar");
        assert_eq!(foo.sha1, None);

        assert_eq!(
            base.arguments.game,
            vec![
                ArgumentToken::Literal("--base".to_string()),
                ArgumentToken::Literal("--loader".to_string()),
            ]
        );
        assert_eq!(base.arguments.jvm.len(), 1);
        assert_eq!(base.main_class, "net.fabricmc.loader.impl.launch.knot.KnotClient");
    }
}
