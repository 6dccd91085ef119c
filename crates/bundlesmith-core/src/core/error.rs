use thiserror::Error;

pub type BundleResult<T> = Result<T, BundleError>;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WalkDir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// A manifest line could not be parsed. `line` is 1-based.
    #[error("Unable to parse manifest at line {line}: {content}")]
    Parse { line: usize, content: String },

    #[error("Invalid manifest, missing {0}")]
    MissingSection(String),

    /// Wraps a codec failure with the name of the manifest being decoded.
    #[error("Invalid manifest {name}: {source}")]
    InvalidManifest {
        name: String,
        #[source]
        source: Box<BundleError>,
    },

    #[error("Unable to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("{}", unresolved_message(.name, .included_by))]
    UnresolvedInclude {
        name: String,
        included_by: Option<String>,
    },

    #[error("Failed to hash {path}: {reason}")]
    Hash { path: String, reason: String },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Signing error: {0}")]
    Sign(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Path error: {0}")]
    Path(String),
}

fn unresolved_message(name: &str, included_by: &Option<String>) -> String {
    match included_by {
        Some(parent) => format!(
            "Bundle {}, included by {}, not found in upstream MoM",
            name, parent
        ),
        None => format!("Included bundle {} not found in upstream MoM", name),
    }
}

impl BundleError {
    /// Suggestion printed under the error message, when one applies
    pub fn help(&self) -> Option<&'static str> {
        match self {
            BundleError::UnresolvedInclude { .. } => Some(
                "Check [bundle] includes against the bundles published in the upstream release",
            ),
            BundleError::Fetch { .. } | BundleError::Http(_) => {
                Some("Check [upstream] url and version, and that the server is reachable")
            }
            BundleError::Sign(_) => {
                Some("Check [signing] certificate and private_key, and that openssl is installed")
            }
            BundleError::Config(_) => Some("See the [upstream], [bundle] and [signing] sections"),
            _ => None,
        }
    }

    /// True for errors raised while decoding manifest text.
    pub fn is_codec_error(&self) -> bool {
        match self {
            BundleError::Parse { .. } | BundleError::MissingSection(_) => true,
            BundleError::InvalidManifest { source, .. } => source.is_codec_error(),
            _ => false,
        }
    }
}

/// Render an error with its cause chain and help line for the terminal
pub fn format_error(error: &BundleError) -> String {
    let mut out = format!("Error: {}", error);
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(&format!("\n  caused by: {}", text));
        }
        source = std::error::Error::source(cause);
    }
    if let Some(help) = error.help() {
        out.push_str(&format!("\n  help: {}", help));
    }
    out
}
