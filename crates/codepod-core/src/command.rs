//! Client commands.
//!
//! Inbound requests from the UI, serialized as `{"type": ..., "payload": {...}}`.

use serde::{Deserialize, Serialize};

use crate::lang::Language;

/// Identifies one kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelTarget {
    pub session_id: String,
    #[serde(alias = "lang")]
    pub language: Language,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCode {
    pub session_id: String,
    #[serde(alias = "lang")]
    pub language: Language,
    pub code: String,
    #[serde(alias = "podId")]
    pub element_id: String,
    #[serde(default)]
    pub namespace: String,
    /// Send the code as-is, without wrapping it in a namespace evaluation.
    #[serde(default)]
    pub raw: bool,
    /// Names the evaluation exports from its namespace.
    #[serde(default, alias = "midports")]
    pub exports: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddImport {
    pub session_id: String,
    #[serde(alias = "lang")]
    pub language: Language,
    #[serde(alias = "id", alias = "podId")]
    pub element_id: String,
    pub from: String,
    pub to: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddImportNs {
    pub session_id: String,
    #[serde(alias = "lang")]
    pub language: Language,
    #[serde(alias = "id", alias = "podId")]
    pub element_id: String,
    #[serde(alias = "nses")]
    pub namespaces: Vec<String>,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteImport {
    pub session_id: String,
    #[serde(alias = "lang")]
    pub language: Language,
    #[serde(alias = "id", alias = "podId")]
    pub element_id: String,
    #[serde(alias = "ns")]
    pub namespace: String,
    pub name: String,
}

/// Drops a name from the exports of a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteExport {
    pub session_id: String,
    #[serde(alias = "lang")]
    pub language: Language,
    #[serde(alias = "id", alias = "podId")]
    pub element_id: String,
    #[serde(alias = "ns")]
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureImports {
    pub session_id: String,
    #[serde(alias = "lang")]
    pub language: Language,
    #[serde(alias = "id", alias = "podId")]
    pub element_id: String,
    pub from: String,
    pub to: String,
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ClientCommand {
    RunCode(RunCode),
    RequestKernelStatus(KernelTarget),
    InterruptKernel(KernelTarget),
    AddImport(AddImport),
    #[serde(rename = "addImportNS")]
    AddImportNs(AddImportNs),
    DeleteImport(DeleteImport),
    DeleteMidport(DeleteExport),
    EnsureImports(EnsureImports),
    KillKernel(KernelTarget),
    /// Keep-alive; ignored.
    Ping,
}

impl ClientCommand {
    /// The kernel the command is addressed to.
    pub fn target(&self) -> Option<(&str, Language)> {
        match self {
            ClientCommand::RunCode(c) => Some((&c.session_id, c.language)),
            ClientCommand::RequestKernelStatus(t)
            | ClientCommand::InterruptKernel(t)
            | ClientCommand::KillKernel(t) => Some((&t.session_id, t.language)),
            ClientCommand::AddImport(c) => Some((&c.session_id, c.language)),
            ClientCommand::AddImportNs(c) => Some((&c.session_id, c.language)),
            ClientCommand::DeleteImport(c) => Some((&c.session_id, c.language)),
            ClientCommand::DeleteMidport(c) => Some((&c.session_id, c.language)),
            ClientCommand::EnsureImports(c) => Some((&c.session_id, c.language)),
            ClientCommand::Ping => None,
        }
    }

    /// The element whose output the command affects.
    pub fn element_id(&self) -> Option<&str> {
        match self {
            ClientCommand::RunCode(c) => Some(&c.element_id),
            ClientCommand::AddImport(c) => Some(&c.element_id),
            ClientCommand::AddImportNs(c) => Some(&c.element_id),
            ClientCommand::DeleteImport(c) => Some(&c.element_id),
            ClientCommand::DeleteMidport(c) => Some(&c.element_id),
            ClientCommand::EnsureImports(c) => Some(&c.element_id),
            ClientCommand::RequestKernelStatus(_)
            | ClientCommand::InterruptKernel(_)
            | ClientCommand::KillKernel(_)
            | ClientCommand::Ping => None,
        }
    }

    /// The wire `type` tag.
    pub fn command_type(&self) -> &'static str {
        match self {
            ClientCommand::RunCode(_) => "runCode",
            ClientCommand::RequestKernelStatus(_) => "requestKernelStatus",
            ClientCommand::InterruptKernel(_) => "interruptKernel",
            ClientCommand::AddImport(_) => "addImport",
            ClientCommand::AddImportNs(_) => "addImportNS",
            ClientCommand::DeleteImport(_) => "deleteImport",
            ClientCommand::DeleteMidport(_) => "deleteMidport",
            ClientCommand::EnsureImports(_) => "ensureImports",
            ClientCommand::KillKernel(_) => "killKernel",
            ClientCommand::Ping => "ping",
        }
    }
}
