use crate::error::{JobError, Result};
use uuid::Uuid;

pub type JobId = Uuid;
pub type OutputBlob = bytes::Bytes;
pub type Artifact = bytes::Bytes;

/// A single HDL source file as submitted by a client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub body: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }
}

/// A decoded synthesis request. Immutable once constructed.
///
/// File names are checked when they are written into a workspace, not here, so that an
/// unsafe name fails the job the same way any other write failure does.
#[derive(Clone, Debug)]
pub struct JobRequest {
    top_module: String,
    files: Vec<SourceFile>,
}

impl JobRequest {
    pub fn new(top_module: impl Into<String>, files: Vec<SourceFile>) -> Result<Self> {
        let top_module = top_module.into();
        if !is_safe_module_name(&top_module) {
            return Err(JobError::InvalidRequest(format!(
                "top module {:?} is not a plain identifier",
                top_module
            )));
        }
        if files.is_empty() {
            return Err(JobError::InvalidRequest("no source files".into()));
        }
        Ok(Self { top_module, files })
    }

    pub fn top_module(&self) -> &str {
        &self.top_module
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }
}

// the name ends up as a make variable, where `$` would be expanded
fn is_safe_module_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 256
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
