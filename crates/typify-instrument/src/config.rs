//! Instrumenter configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Dotted path of the runtime checker binding
    pub checker: String,
    /// Member of `checker` that wraps functions; the binding itself is
    /// called when unset
    pub check_method: Option<String>,
    /// Property of a wrapped declaration that caches its checked
    /// replacement
    pub cache_property: String,
    /// Fail the file on a malformed directive instead of skipping it
    pub strict_directives: bool,
    /// Render a Source Map v3 document with the output
    pub source_map: bool,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            checker: "global.__typify".to_string(),
            check_method: None,
            cache_property: "__typify__".to_string(),
            strict_directives: false,
            source_map: false,
        }
    }
}
