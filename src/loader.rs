//! Loading documents from disk into the engine.
//!
//! The loader reads a YAML or JSON file, runs the sanitizer, installs the
//! result into a [`MockEngine`], and reports the outcome of every attempt to
//! a [`LoadObserver`] exactly once.

use crate::document::ApiDocument;
use crate::engine::MockEngine;
use crate::error::LoadError;
use crate::sanitizer::sanitize;
use serde_yaml::Value as RawValue;
use std::net::SocketAddr;
use std::path::Path;
use tracing::{debug, error, info};

/// Text format of a document file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Yaml,
    Json,
}

impl SourceFormat {
    /// `.yaml` and `.yml` are YAML; anything else is read as JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                SourceFormat::Yaml
            }
            _ => SourceFormat::Json,
        }
    }
}

/// Receives the outcome of each load attempt.
pub trait LoadObserver {
    /// Called once with the installed document.
    fn document_loaded(&self, document: &ApiDocument);

    /// Called once when an attempt fails; nothing was installed.
    fn load_failed(&self, error: &LoadError);
}

/// Observer that reports through the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl LoadObserver for LogObserver {
    fn document_loaded(&self, document: &ApiDocument) {
        info!(
            version = document.version().unwrap_or_default(),
            has_swagger = document.swagger().is_some(),
            has_openapi = document.openapi().is_some(),
            paths = document.path_count(),
            "Valid document loaded"
        );
        match serde_json::to_string(document) {
            Ok(text) => debug!(document = %text, "Installed document"),
            Err(e) => debug!(error = %e, "Installed document is not printable"),
        }
    }

    fn load_failed(&self, error: &LoadError) {
        error!(error = %error, "Failed to load document");
    }
}

/// Decode document text without validating it.
pub fn decode_str(text: &str, format: SourceFormat, origin: &str) -> Result<RawValue, LoadError> {
    let decoded = match format {
        // Resolve `<<: *anchor` merge keys so shared fragments are expanded.
        SourceFormat::Yaml => serde_yaml::from_str::<RawValue>(text)
            .and_then(|mut value| value.apply_merge().map(|()| value))
            .map_err(|e| e.to_string()),
        SourceFormat::Json => serde_json::from_str::<RawValue>(text).map_err(|e| e.to_string()),
    };
    decoded.map_err(|message| LoadError::Decode {
        path: origin.to_string(),
        message,
    })
}

/// Read and decode a document file without validating it.
pub fn decode_file(path: &Path) -> Result<RawValue, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let format = SourceFormat::from_path(path);
    debug!(path = %path.display(), bytes = text.len(), format = ?format, "Decoding document");
    decode_str(&text, format, &path.display().to_string())
}

/// Read, decode and sanitize a document file.
pub fn load_document(path: &Path) -> Result<ApiDocument, LoadError> {
    let raw = decode_file(path)?;
    Ok(sanitize(&raw)?)
}

/// Load a document file and (re)start the engine with it.
///
/// When decoding or validation fails the engine keeps serving the
/// previous document. A bind failure happens after the old listener is
/// stopped, so in that case nothing is serving.
pub async fn load_into(
    engine: &mut MockEngine,
    path: &Path,
    observer: &dyn LoadObserver,
) -> Result<SocketAddr, LoadError> {
    info!(path = %path.display(), "Processing document");

    let outcome = match load_document(path) {
        Ok(document) => engine.start(document).await.map_err(LoadError::from),
        Err(e) => Err(e),
    };

    match &outcome {
        Ok(_) => {
            if let Some(document) = engine.document() {
                observer.document_loaded(document);
            }
        }
        Err(e) => observer.load_failed(e),
    }
    outcome
}
