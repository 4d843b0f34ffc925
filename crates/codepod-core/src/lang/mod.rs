//! Language adapters.
//!
//! Each supported language ships a startup script that defines namespace
//! helpers inside the engine, and an adapter that rewrites user intents
//! (evaluate, import, delete) into source text calling those helpers.

mod javascript;
mod julia;
mod python;
mod racket;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use javascript::JavaScriptAdapter;
pub use julia::JuliaAdapter;
pub use python::PythonAdapter;
pub use racket::RacketAdapter;

use crate::error::{Error, Result};

/// A language with an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Julia,
    Racket,
    #[serde(alias = "js")]
    JavaScript,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::Python,
        Language::Julia,
        Language::Racket,
        Language::JavaScript,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Julia => "julia",
            Language::Racket => "racket",
            Language::JavaScript => "javascript",
        }
    }

    /// File extension of the startup script.
    pub fn script_extension(&self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::Julia => "jl",
            Language::Racket => "rkt",
            Language::JavaScript => "js",
        }
    }

    /// The adapter for this language.
    pub fn adapter(&self) -> &'static dyn LanguageAdapter {
        static PYTHON: PythonAdapter = PythonAdapter;
        static JULIA: JuliaAdapter = JuliaAdapter;
        static RACKET: RacketAdapter = RacketAdapter;
        static JAVASCRIPT: JavaScriptAdapter = JavaScriptAdapter;

        match self {
            Language::Python => &PYTHON,
            Language::Julia => &JULIA,
            Language::Racket => &RACKET,
            Language::JavaScript => &JAVASCRIPT,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "python" => Ok(Language::Python),
            "julia" => Ok(Language::Julia),
            "racket" => Ok(Language::Racket),
            "javascript" | "js" => Ok(Language::JavaScript),
            _ => Err(Error::UnsupportedLanguage(s.to_string())),
        }
    }
}

/// Rewrites user intents into engine source text.
///
/// All builders are pure. They reject an empty code body, an empty name, or
/// an empty namespace list with [`Error::InvalidAdapterInput`]; an empty
/// namespace string is the root namespace and is allowed.
pub trait LanguageAdapter: Send + Sync {
    fn language(&self) -> Language;

    /// Source of the script that defines the namespace helpers.
    fn startup_script(&self) -> &'static str;

    /// Evaluate `code` inside `namespace`.
    fn build_evaluate(&self, code: &str, namespace: &str) -> Result<String>;

    /// Evaluate `code` inside `namespace`, exporting `exports` from it.
    ///
    /// Only languages whose helpers track exports use the list.
    fn build_evaluate_with_exports(
        &self,
        code: &str,
        namespace: &str,
        exports: &[String],
    ) -> Result<String> {
        let _ = exports;
        self.build_evaluate(code, namespace)
    }

    /// Bind `name` from namespace `from` into namespace `to`.
    fn build_add_import(&self, from: &str, to: &str, name: &str) -> Result<String>;

    /// Make every name of each namespace in `namespaces` visible in `to`.
    fn build_add_import_namespace(&self, namespaces: &[String], to: &str) -> Result<String>;

    /// Remove `name` from `namespace`.
    fn build_delete_import(&self, namespace: &str, name: &str) -> Result<String>;

    /// Drop `name` from the exports of `namespace`.
    ///
    /// Only languages whose helpers track exports support this.
    fn build_delete_export(&self, namespace: &str, name: &str) -> Result<String> {
        let _ = (namespace, name);
        Err(Error::InvalidAdapterInput(format!(
            "{} does not track exported names",
            self.language()
        )))
    }

    /// Bind `name` from `from` into `to` if it is not already bound.
    fn build_ensure_import(&self, from: &str, to: &str, name: &str) -> Result<String> {
        self.build_add_import(from, to, name)
    }
}

pub(crate) fn require_code(code: &str) -> Result<()> {
    if code.is_empty() {
        return Err(Error::InvalidAdapterInput("code must not be empty".to_string()));
    }
    Ok(())
}

pub(crate) fn require_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidAdapterInput("name must not be empty".to_string()));
    }
    Ok(())
}

pub(crate) fn require_namespaces(namespaces: &[String]) -> Result<()> {
    if namespaces.is_empty() {
        return Err(Error::InvalidAdapterInput(
            "namespace list must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Double-quoted string literal with `\` and `"` escaped.
pub(crate) fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}
