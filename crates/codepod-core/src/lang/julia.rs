use super::{Language, LanguageAdapter, require_code, require_name, require_namespaces};
use crate::error::Result;

const STARTUP_SCRIPT: &str = include_str!("../../kernels/julia/codepod.jl");

/// Julia (IJulia).
#[derive(Debug, Default, Clone, Copy)]
pub struct JuliaAdapter;

/// Escape for Julia string literals, which interpolate `$`.
fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('$', "\\$")
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", escape(value))
}

impl LanguageAdapter for JuliaAdapter {
    fn language(&self) -> Language {
        Language::Julia
    }

    fn startup_script(&self) -> &'static str {
        STARTUP_SCRIPT
    }

    fn build_evaluate(&self, code: &str, namespace: &str) -> Result<String> {
        require_code(code)?;
        Ok(format!(
            "CODEPOD_EVAL(\"\"\"\n{}\n\"\"\", {})",
            escape(code),
            quoted(namespace)
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
        let list = namespaces
            .iter()
            .map(|ns| quoted(ns))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("CODEPOD_ADD_IMPORT_NS({}, [{list}])", quoted(to)))
    }

    fn build_delete_import(&self, namespace: &str, name: &str) -> Result<String> {
        require_name(name)?;
        Ok(format!(
            "CODEPOD_DELETE_IMPORT({}, {})",
            quoted(namespace),
            quoted(name)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_escapes_interpolation() {
        let code = JuliaAdapter.build_evaluate("println(\"$x\")", "m").unwrap();
        assert_eq!(code, "CODEPOD_EVAL(\"\"\"\nprintln(\\\"\\$x\\\")\n\"\"\", \"m\")");
    }

    #[test]
    fn test_add_import() {
        assert_eq!(
            JuliaAdapter.build_add_import("lib", "app", "f").unwrap(),
            r#"CODEPOD_ADD_IMPORT("lib", "app", "f")"#
        );
    }

    #[test]
    fn test_add_import_namespace() {
        assert_eq!(
            JuliaAdapter
                .build_add_import_namespace(&["a".to_string()], "app")
                .unwrap(),
            r#"CODEPOD_ADD_IMPORT_NS("app", ["a"])"#
        );
    }

    #[test]
    fn test_delete_import() {
        assert_eq!(
            JuliaAdapter.build_delete_import("app", "f").unwrap(),
            r#"CODEPOD_DELETE_IMPORT("app", "f")"#
        );
    }
}
