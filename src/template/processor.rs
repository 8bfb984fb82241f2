// ABOUTME: Per-file template pipeline: scan, resolve, expand and render
// ABOUTME: Produces a RenderedTemplateFile carrying deployed path, id-safe name and secret flag

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::context::TemplateContext;
use super::engine::TemplateEngine;
use super::error::{Result, TemplateError};
use super::expander::{VariableExpander, DEFAULT_MAX_ROUNDS};
use super::paths::{build_sanitized_name_for_id, remove_template_extensions};
use crate::config::ConfigStore;

#[derive(Clone)]
pub struct RenderedTemplateFile {
    pub template_path: PathBuf,
    pub deployed_path: PathBuf,
    pub id_safe_name: String,
    pub content: String,
    /// Set when the template referenced any secret value.
    pub secret: bool,
}

impl fmt::Debug for RenderedTemplateFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let content: &dyn fmt::Debug = if self.secret {
            &"[REDACTED]"
        } else {
            &self.content
        };
        f.debug_struct("RenderedTemplateFile")
            .field("template_path", &self.template_path)
            .field("deployed_path", &self.deployed_path)
            .field("id_safe_name", &self.id_safe_name)
            .field("content", content)
            .field("secret", &self.secret)
            .finish()
    }
}

/// Output of rendering one piece of template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    pub content: String,
    pub secret: bool,
}

/// Runs templates through the full pipeline for one configuration namespace.
pub struct TemplateProcessor {
    engine: Arc<TemplateEngine>,
    store: Arc<ConfigStore>,
    namespace: String,
    max_rounds: usize,
}

impl TemplateProcessor {
    pub fn new(engine: Arc<TemplateEngine>, store: Arc<ConfigStore>) -> Self {
        let namespace = store.default_namespace().to_string();
        Self {
            engine,
            store,
            namespace,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Render template text. Text with no expressions is returned unchanged.
    pub fn render_content(
        &self,
        content: &str,
        data: Option<&TemplateContext>,
    ) -> Result<RenderedContent> {
        let compiled = self.engine.compile(content)?;
        let tree = compiled.tree();
        if tree.is_static() {
            return Ok(RenderedContent {
                content: content.to_string(),
                secret: false,
            });
        }

        let names = tree.variable_names();
        debug!("Template references {} names", names.len());

        let expansion = VariableExpander::new(&self.engine, &self.store, &self.namespace)
            .with_max_rounds(self.max_rounds)
            .resolve(&names, data)?;
        debug!(
            "Resolved {} variables in {} rounds",
            expansion.variables.len(),
            expansion.depth
        );

        let rendered = self
            .engine
            .render_compiled(&compiled, &expansion.variables, data)?;
        Ok(RenderedContent {
            content: rendered,
            secret: expansion.has_secrets(),
        })
    }

    /// Read and render one template file.
    ///
    /// `template_path` is relative and resolved against `base_dir` for reading;
    /// the result is keyed by the relative path.
    #[instrument(skip(self, base_dir, data), fields(namespace = %self.namespace))]
    pub async fn process_template(
        &self,
        base_dir: &Path,
        template_path: &Path,
        data: Option<&TemplateContext>,
    ) -> Result<RenderedTemplateFile> {
        let full_path = base_dir.join(template_path);
        let content = tokio::fs::read_to_string(&full_path)
            .await
            .map_err(|source| TemplateError::ReadError {
                path: template_path.to_path_buf(),
                source,
            })?;

        let rendered = self.render_content(&content, data)?;

        Ok(RenderedTemplateFile {
            template_path: template_path.to_path_buf(),
            deployed_path: remove_template_extensions(template_path),
            id_safe_name: build_sanitized_name_for_id(template_path),
            content: rendered.content,
            secret: rendered.secret,
        })
    }
}
