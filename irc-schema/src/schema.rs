//! Schema compilation and document validation.
//!
//! A schema is loaded exactly once, from an `http(s)://` URL, a `file://` URL
//! or a plain filesystem path, and compiled with the `jsonschema` crate. The
//! draft is taken from the document's `$schema` keyword. Compilation failures
//! are fatal for the validator that needed the schema; there is no retry.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use irc_core::IrcError;

/// Time allowed for downloading a remote schema.
const SCHEMA_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// A schema could not be loaded or compiled.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The document could not be retrieved.
    #[error("cannot fetch schema '{location}': {reason}")]
    Fetch {
        /// Schema location.
        location: String,
        /// Reason the download or read failed.
        reason: String,
    },

    /// The document is not valid JSON.
    #[error("schema '{location}' is not valid JSON: {reason}")]
    Parse {
        /// Schema location.
        location: String,
        /// Parser message.
        reason: String,
    },

    /// The document is JSON but not a usable schema.
    #[error("schema '{location}' does not compile: {reason}")]
    Compile {
        /// Schema location.
        location: String,
        /// Compiler message.
        reason: String,
    },

    /// The location uses a scheme other than http, https or file.
    #[error("unsupported schema location: {0}")]
    UnsupportedLocation(String),
}

impl SchemaError {
    /// Location of the schema that failed.
    pub fn location(&self) -> &str {
        match self {
            SchemaError::Fetch { location, .. }
            | SchemaError::Parse { location, .. }
            | SchemaError::Compile { location, .. } => location,
            SchemaError::UnsupportedLocation(location) => location,
        }
    }
}

impl From<SchemaError> for IrcError {
    fn from(err: SchemaError) -> Self {
        IrcError::Schema {
            location: err.location().to_string(),
            reason: err.to_string(),
        }
    }
}

/// A single validation violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON Pointer to the violating value in the document.
    pub instance_path: String,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

/// A document did not conform to the schema.
#[derive(Debug, Clone, Error)]
#[error("document violates schema '{location}': {}", join_violations(.violations))]
pub struct SchemaViolation {
    /// Location of the schema validated against.
    pub location: String,
    /// Every violation found.
    pub violations: Vec<Violation>,
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A compiled JSON Schema.
///
/// `Send + Sync`; validation borrows immutably and has no side effects, so
/// one instance serves any number of concurrent callers.
pub struct SchemaValidator {
    location: String,
    validator: Validator,
}

impl SchemaValidator {
    /// Loads and compiles the schema at `location`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if the document is unreachable, not JSON, or
    /// not a valid schema.
    #[instrument]
    pub async fn compile(location: &str) -> Result<Self, SchemaError> {
        let document = load(location).await?;
        let schema = Self::from_value(location, &document)?;
        info!(location, "Compiled schema");
        Ok(schema)
    }

    /// Compiles an already parsed schema document.
    pub fn from_value(location: impl Into<String>, schema: &Value) -> Result<Self, SchemaError> {
        let location = location.into();
        let validator = jsonschema::validator_for(schema).map_err(|e| SchemaError::Compile {
            location: location.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            location,
            validator,
        })
    }

    /// Where the schema was loaded from.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Validates `document`, collecting every violation on failure.
    pub fn validate(&self, document: &Value) -> Result<(), SchemaViolation> {
        let violations: Vec<Violation> = self
            .validator
            .iter_errors(document)
            .map(|e| Violation {
                instance_path: e.instance_path.to_string(),
                message: e.to_string(),
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaViolation {
                location: self.location.clone(),
                violations,
            })
        }
    }
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Reads the raw schema document from wherever `location` points.
async fn load(location: &str) -> Result<Value, SchemaError> {
    let raw = match Url::parse(location) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => fetch_remote(location, url).await?,
        Ok(url) if url.scheme() == "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| SchemaError::UnsupportedLocation(location.to_string()))?;
            read_file(location, path).await?
        }
        Ok(_) => return Err(SchemaError::UnsupportedLocation(location.to_string())),
        Err(_) => read_file(location, PathBuf::from(location)).await?,
    };

    serde_json::from_slice(&raw).map_err(|e| SchemaError::Parse {
        location: location.to_string(),
        reason: e.to_string(),
    })
}

async fn fetch_remote(location: &str, url: Url) -> Result<Vec<u8>, SchemaError> {
    let fetch_error = |reason: String| SchemaError::Fetch {
        location: location.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(SCHEMA_FETCH_TIMEOUT)
        .build()
        .map_err(|e| fetch_error(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;

    if !response.status().is_success() {
        return Err(fetch_error(format!("HTTP {}", response.status())));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| fetch_error(e.to_string()))?;

    debug!(location, size = body.len(), "Downloaded schema");
    Ok(body.to_vec())
}

async fn read_file(location: &str, path: PathBuf) -> Result<Vec<u8>, SchemaError> {
    tokio::fs::read(&path).await.map_err(|e| SchemaError::Fetch {
        location: location.to_string(),
        reason: e.to_string(),
    })
}
