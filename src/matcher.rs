//! Request matching logic.
//!
//! Matches incoming requests against the path templates of a document.
//! Every template is compiled to an anchored regex once, when the document is
//! installed. Templates are tried in document order and the last one that
//! matches wins; there is no specificity ranking.

use crate::document::{is_truthy, ApiDocument, Operation};
use regex::Regex;
use std::collections::HashMap;
use tracing::warn;

/// Path parameters captured from a template match.
pub type ParamMap = HashMap<String, String>;

/// Result of matching a request against the document.
#[derive(Debug)]
pub struct MatchResult<'a> {
    /// The path template that matched
    pub template: &'a str,
    /// The operation for the request method
    pub operation: Operation<'a>,
    /// Parameters extracted from the path
    pub params: ParamMap,
}

/// A compiled path template such as `/users/{id}`.
#[derive(Debug)]
pub struct PathTemplate {
    template: String,
    regex: Regex,
    /// Placeholder names in the order they appear
    params: Vec<String>,
}

impl PathTemplate {
    /// Compile a template.
    ///
    /// Each `{name}` becomes a non-greedy capture over a single path segment,
    /// literal text is escaped, and the whole pattern is anchored to the full
    /// path.
    pub fn compile(template: &str) -> Result<Self, regex::Error> {
        let mut pattern = String::from("^");
        let mut params = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open + 1..].find('}') else {
                break;
            };
            pattern.push_str(&regex::escape(&rest[..open]));
            pattern.push_str("([^/]*?)");
            params.push(rest[open + 1..open + 1 + close].to_string());
            rest = &rest[open + 1 + close + 1..];
        }
        pattern.push_str(&regex::escape(rest));
        pattern.push('$');

        Ok(Self {
            template: template.to_string(),
            regex: Regex::new(&pattern)?,
            params,
        })
    }

    /// The source template string.
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Placeholder names in template order.
    pub fn param_names(&self) -> &[String] {
        &self.params
    }

    /// Match a concrete path, returning the extracted parameters.
    ///
    /// Empty or missing captures are left out of the map.
    pub fn matches(&self, path: &str) -> Option<ParamMap> {
        let captures = self.regex.captures(path)?;
        let params = self
            .params
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                captures
                    .get(i + 1)
                    .map(|m| m.as_str())
                    .filter(|v| !v.is_empty())
                    .map(|v| (name.clone(), v.to_string()))
            })
            .collect();
        Some(params)
    }
}

/// Request matcher engine.
#[derive(Debug)]
pub struct Matcher {
    templates: Vec<PathTemplate>,
}

impl Matcher {
    /// Compile every path template of a document.
    ///
    /// A template that cannot be compiled is skipped and logged.
    pub fn new(document: &ApiDocument) -> Self {
        let templates = document
            .paths()
            .filter_map(|(template, _)| match PathTemplate::compile(template) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    warn!(template = %template, error = %e, "Skipping path template");
                    None
                }
            })
            .collect();

        Self { templates }
    }

    /// Number of compiled templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether no templates were compiled.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Find the operation for a request.
    ///
    /// The last template in document order that matches the path wins. The
    /// method is looked up lowercased in that template's path item.
    pub fn find_match<'a>(
        &self,
        document: &'a ApiDocument,
        method: &str,
        path: &str,
    ) -> Option<MatchResult<'a>> {
        let (template, params) = self
            .templates
            .iter()
            .filter_map(|t| t.matches(path).map(|params| (t, params)))
            .last()?;

        let (template, path_item) = document
            .paths()
            .find(|(key, _)| *key == template.as_str())?;

        let operation = path_item
            .get(method.to_lowercase())
            .filter(|op| is_truthy(op))?;

        Some(MatchResult {
            template,
            operation: Operation::new(operation),
            params,
        })
    }
}
