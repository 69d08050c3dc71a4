use thiserror::Error;

#[derive(Error, Debug)]
pub enum PkgupError {
    #[error("Could not find a package.json. Are you in a Node project?")]
    ManifestMissing,

    #[error("package.json could not be parsed: {0}")]
    ManifestUnparsable(String),

    #[error("Package {0:?} was not found on the registry. Cannot continue as this may be an error.")]
    PackageNotFound(String),

    #[error("Package {0:?} was not found in package.json.")]
    PackageNotInManifest(String),

    #[error("Package {name:?} has no version matching {spec:?}.")]
    VersionNotFound { name: String, spec: String },

    #[error("Incompatible peer dependencies found ({0} conflict(s)). See above.")]
    PeerCompatibility(usize),

    #[error("{0} package(s) could not be resolved. See above.")]
    ResolutionFailed(usize),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PkgupError>;
