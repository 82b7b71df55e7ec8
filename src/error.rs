use thiserror::Error;

/// Every failure a generation run can hit. All of them are fatal to the
/// artifact (or input file) being processed; batch drivers catch them at the
/// file boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// A pointer segment names a key that does not exist.
    #[error("unresolved pointer `{pointer}`: no `{segment}` segment")]
    UnresolvedPointer { pointer: String, segment: String },
    /// Only in-document (`#/...`) pointers are followed.
    #[error("unsupported reference `{0}`: only local `#/...` pointers are supported")]
    UnsupportedReference(String),
    /// A pointer chain that comes back to a pointer it already followed.
    #[error("cyclic reference: `{0}` was already followed")]
    CyclicReference(String),
    /// A required sub-schema is missing or has the wrong shape.
    #[error("malformed schema at `{path}`: {message}")]
    MalformedSchema { path: String, message: String },
    /// A sheet grid that could not be read.
    #[error("tabular parse error in `{sheet}`: {message}")]
    TabularParse { sheet: String, message: String },
    /// A JSON document that does not deserialize; `path` is where it broke.
    #[error("invalid document at `{path}`: {message}")]
    Document { path: String, message: String },
    /// The input or output root of a batch run is unusable.
    #[error("batch root `{path}`: {message}")]
    BatchRoot { path: String, message: String },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("jq error: {0}")]
    Jq(String),
}

impl Error {
    pub fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedSchema {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
