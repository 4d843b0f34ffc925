use super::{Language, LanguageAdapter, quoted, require_code, require_name, require_namespaces};
use crate::error::Result;

const STARTUP_SCRIPT: &str = include_str!("../../kernels/racket/codepod.rkt");

/// Every request first leaves whatever module the REPL was left in.
const PRELUDE: &str = "(enter! #f)";

/// Racket (iracket).
#[derive(Debug, Default, Clone, Copy)]
pub struct RacketAdapter;

impl LanguageAdapter for RacketAdapter {
    fn language(&self) -> Language {
        Language::Racket
    }

    fn startup_script(&self) -> &'static str {
        STARTUP_SCRIPT
    }

    fn build_evaluate(&self, code: &str, namespace: &str) -> Result<String> {
        require_code(code)?;
        Ok(format!(
            "{PRELUDE} (CODEPOD-EVAL {} {})",
            quoted(code),
            quoted(namespace)
        ))
    }

    fn build_add_import(&self, from: &str, to: &str, name: &str) -> Result<String> {
        require_name(name)?;
        Ok(format!(
            "{PRELUDE} (CODEPOD-ADD-IMPORT {} {} {})",
            quoted(from),
            quoted(to),
            quoted(name)
        ))
    }

    fn build_add_import_namespace(&self, namespaces: &[String], to: &str) -> Result<String> {
        require_namespaces(namespaces)?;
        Ok(format!(
            "{PRELUDE} (CODEPOD-ADD-IMPORT-NS {} {})",
            quoted(to),
            quoted(&namespaces.join(" "))
        ))
    }

    fn build_delete_import(&self, namespace: &str, name: &str) -> Result<String> {
        require_name(name)?;
        Ok(format!(
            "{PRELUDE} (CODEPOD-DELETE-IMPORT {} {})",
            quoted(namespace),
            quoted(name)
        ))
    }
}
