use super::{Language, LanguageAdapter, quoted, require_code, require_name, require_namespaces};
use crate::error::Result;

const STARTUP_SCRIPT: &str = include_str!("../../kernels/python/codepod.py");

/// Python (ipykernel).
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonAdapter;

/// Escape code for a `"""` literal.
fn escape(code: &str) -> String {
    code.replace('\\', "\\\\").replace('"', "\\\"")
}

impl LanguageAdapter for PythonAdapter {
    fn language(&self) -> Language {
        Language::Python
    }

    fn startup_script(&self) -> &'static str {
        STARTUP_SCRIPT
    }

    fn build_evaluate(&self, code: &str, namespace: &str) -> Result<String> {
        require_code(code)?;
        Ok(format!(
            "CODEPOD_EVAL(\"\"\"{}\"\"\", {})",
            escape(code),
            quoted(namespace)
        ))
    }

    fn build_add_import(&self, from: &str, to: &str, name: &str) -> Result<String> {
        require_name(name)?;
        // The trailing `0` keeps the evaluation from echoing the bound value.
        let body = format!(
            "{name} = CODEPOD_GETMOD({}).__dict__[{}]\n0",
            quoted(from),
            quoted(name)
        );
        self.build_evaluate(&body, to)
    }

    fn build_add_import_namespace(&self, namespaces: &[String], to: &str) -> Result<String> {
        require_namespaces(namespaces)?;
        let list = namespaces
            .iter()
            .map(|ns| quoted(ns))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("CODEPOD_ADD_IMPORT_NS([{list}], {})", quoted(to)))
    }

    fn build_delete_import(&self, namespace: &str, name: &str) -> Result<String> {
        require_name(name)?;
        self.build_evaluate(&format!("del {name}"), namespace)
    }
}
