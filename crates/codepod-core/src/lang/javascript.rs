use super::{Language, LanguageAdapter, quoted, require_code, require_name, require_namespaces};
use crate::error::Result;

const STARTUP_SCRIPT: &str = include_str!("../../kernels/javascript/codepod.js");

/// JavaScript (ijavascript / tslab).
#[derive(Debug, Default, Clone, Copy)]
pub struct JavaScriptAdapter;

/// Escape for a template literal.
fn escape(code: &str) -> String {
    code.replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${")
}

fn quoted_list(values: &[String]) -> String {
    values.iter().map(|v| quoted(v)).collect::<Vec<_>>().join(", ")
}

impl LanguageAdapter for JavaScriptAdapter {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn startup_script(&self) -> &'static str {
        STARTUP_SCRIPT
    }

    fn build_evaluate(&self, code: &str, namespace: &str) -> Result<String> {
        self.build_evaluate_with_exports(code, namespace, &[])
    }

    fn build_evaluate_with_exports(
        &self,
        code: &str,
        namespace: &str,
        exports: &[String],
    ) -> Result<String> {
        require_code(code)?;
        Ok(format!(
            "CODEPOD_EVAL(`{}`, {}, [{}])",
            escape(code),
            quoted(namespace),
            quoted_list(exports)
        ))
    }

    fn build_add_import(&self, from: &str, to: &str, name: &str) -> Result<String> {
        require_name(name)?;
        Ok(format!(
            "CODEPOD_ADD_IMPORT({}, {}, {})",
            quoted(from),
            quoted(to),
            quoted(name)
        ))
    }

    fn build_add_import_namespace(&self, namespaces: &[String], to: &str) -> Result<String> {
        require_namespaces(namespaces)?;
        Ok(format!(
            "CODEPOD_ADD_IMPORT_NS([{}], {})",
            quoted_list(namespaces),
            quoted(to)
        ))
    }

    fn build_delete_import(&self, namespace: &str, name: &str) -> Result<String> {
        require_name(name)?;
        Ok(format!(
            "CODEPOD_DELETE_IMPORT({}, {})",
            quoted(namespace),
            quoted(name)
        ))
    }

    fn build_delete_export(&self, namespace: &str, name: &str) -> Result<String> {
        require_name(name)?;
        Ok(format!(
            "CODEPOD_DELETE_NAMES({}, [{}])",
            quoted(namespace),
            quoted(name)
        ))
    }
}
