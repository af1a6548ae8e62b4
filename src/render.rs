//! Renders a file describing the current buddy, e.g. a vCard that phones or
//! an on-call forwarding service can pick up.
//!
//! Templates use two placeholders, `{{name}}` and `{{contact}}`.

use crate::buddy::Buddy;
use log::debug;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRef {
    pub template: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to read template {path}: {source}")]
    ReadTemplate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write artifact {path}: {source}")]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait Renderer: Send + Sync {
    fn render(&self, buddy: &Buddy, template: &TemplateRef) -> Result<(), RenderError>;
}

/// Placeholder substitution renderer. The output is replaced atomically so
/// readers never see a half-written file.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateRenderer;

pub fn fill_template(template: &str, buddy: &Buddy) -> String {
    template.replace("{{name}}", &buddy.name).replace("{{contact}}", &buddy.contact)
}

impl Renderer for TemplateRenderer {
    fn render(&self, buddy: &Buddy, template: &TemplateRef) -> Result<(), RenderError> {
        let source = fs::read_to_string(&template.template).map_err(|source| {
            RenderError::ReadTemplate { path: template.template.clone(), source }
        })?;
        let rendered = fill_template(&source, buddy);

        let write_err =
            |source| RenderError::WriteOutput { path: template.output.clone(), source };
        let parent = template
            .output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        fs::create_dir_all(parent).map_err(write_err)?;

        // Staged next to the output so the final rename stays on one filesystem.
        let mut staging = NamedTempFile::new_in(parent).map_err(write_err)?;
        staging.write_all(rendered.as_bytes()).map_err(write_err)?;
        staging.persist(&template.output).map_err(|e| write_err(e.error))?;

        debug!("Rendered {} for {}", template.output.display(), buddy);
        Ok(())
    }
}
