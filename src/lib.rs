//! OpenAPI Mock Server
//!
//! Serves mock responses for the operations described in an OpenAPI or
//! Swagger document. Requests are matched against the document's path
//! templates and answered with the examples declared for the operation.
//!
//! # Features
//!
//! - **Sanitization**: Decoded documents are rebuilt as pure data and their
//!   version field checked before anything trusts them
//! - **Path Templates**: `/users/{id}` style templates with parameter capture
//! - **Example Responses**: `example` or `examples.default.value` from the
//!   `application/json` content of the chosen response
//! - **Hot Reload**: Installing a new document replaces the running listener
//!
//! # Example Document
//!
//! ```yaml
//! openapi: 3.0.0
//! paths:
//!   /users/{id}:
//!     get:
//!       responses:
//!         "200":
//!           content:
//!             application/json:
//!               example:
//!                 id: 1
//!                 name: "Ada"
//! ```

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod loader;
pub mod matcher;
pub mod response;
pub mod sanitizer;

pub use config::Settings;
pub use document::ApiDocument;
pub use engine::MockEngine;
pub use error::{EngineError, LoadError, SanitizeError};
pub use sanitizer::sanitize;
