use std::path::PathBuf;

/// Failures of the install/launch pipeline that callers may want to match on.
///
/// Everything else in the crate is reported through `anyhow`.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// The install has no name.
    #[error("Install name is required")]
    MissingInstallName,

    /// The install does not reference a game version.
    #[error("Install version manifest is required")]
    MissingVersionManifest,

    /// A file the launch depends on is not on disk after resolving.
    #[error("Required artifact is missing: {0}")]
    MissingArtifact(PathBuf),

    /// The loader metadata endpoint returned no loader for this game version.
    #[error("No loader versions available for game version {0}")]
    NoLoaderVersions(String),

    /// The game process could not be started.
    #[error("Failed to start {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
