// ABOUTME: Renders every template file discovered under a directory
// ABOUTME: One bounded tokio task per file; failures are collected per path without affecting siblings

use futures::future::join_all;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use super::context::TemplateContext;
use super::error::{Result, TemplateError};
use super::paths::{discover_template_files, TemplatePredicate};
use super::processor::{RenderedTemplateFile, TemplateProcessor};

pub const DEFAULT_MAX_CONCURRENT_RENDERS: usize = 4;

#[derive(Clone)]
pub struct DirectoryOptions {
    pub recursive: bool,
    /// Relative template paths are resolved against this directory for I/O.
    pub base_dir: PathBuf,
    pub template_predicate: Option<TemplatePredicate>,
    pub data: Option<TemplateContext>,
}

impl Default for DirectoryOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            base_dir: PathBuf::from("."),
            template_predicate: None,
            data: None,
        }
    }
}

impl std::fmt::Debug for DirectoryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryOptions")
            .field("recursive", &self.recursive)
            .field("base_dir", &self.base_dir)
            .field("template_predicate", &self.template_predicate.is_some())
            .field("data", &self.data)
            .finish()
    }
}

/// Rendered files and per-file failures, keyed by template path.
#[derive(Debug, Default)]
pub struct TemplateCollection {
    pub files: BTreeMap<PathBuf, RenderedTemplateFile>,
    pub failures: BTreeMap<PathBuf, TemplateError>,
}

impl TemplateCollection {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, template_path: &Path) -> Option<&RenderedTemplateFile> {
        self.files.get(template_path)
    }

    /// All rendered files, or the first failure.
    pub fn into_result(mut self) -> Result<BTreeMap<PathBuf, RenderedTemplateFile>> {
        match self.failures.pop_first() {
            Some((_, err)) => Err(err),
            None => Ok(self.files),
        }
    }

    /// Write each rendered file to `out_dir/<deployed path>`.
    pub async fn write_to(&self, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.files.len());
        for file in self.files.values() {
            let target = out_dir.join(&file.deployed_path);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, &file.content).await?;
            debug!("Wrote {}", target.display());
            written.push(target);
        }
        Ok(written)
    }
}

/// Directory-level orchestration over a shared processor.
pub struct TemplateDirectory {
    processor: Arc<TemplateProcessor>,
    semaphore: Arc<Semaphore>,
}

impl TemplateDirectory {
    pub fn new(processor: Arc<TemplateProcessor>) -> Self {
        Self::with_max_concurrent(processor, DEFAULT_MAX_CONCURRENT_RENDERS)
    }

    pub fn with_max_concurrent(processor: Arc<TemplateProcessor>, max_concurrent: usize) -> Self {
        Self {
            processor,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Discover and render all templates under `dir`.
    ///
    /// Only discovery errors (absolute `dir`, unreadable tree) fail the call;
    /// per-file errors land in `TemplateCollection::failures`.
    pub async fn render(&self, dir: &Path, options: &DirectoryOptions) -> Result<TemplateCollection> {
        let paths = discover_template_files(
            &options.base_dir,
            dir,
            options.recursive,
            options.template_predicate.as_ref(),
        )?;
        info!("Rendering {} templates from {}", paths.len(), dir.display());

        let data = Arc::new(options.data.clone());
        let handles = paths.iter().cloned().map(|template_path| {
            let processor = Arc::clone(&self.processor);
            let semaphore = Arc::clone(&self.semaphore);
            let base_dir = options.base_dir.clone();
            let data = Arc::clone(&data);

            tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| TemplateError::RenderError("Render pool closed".to_string()))?;
                processor
                    .process_template(&base_dir, &template_path, (*data).as_ref())
                    .await
            })
        });

        let results = join_all(handles).await;

        let mut collection = TemplateCollection::default();
        for (template_path, result) in paths.into_iter().zip(results) {
            match result.map_err(TemplateError::from).and_then(|r| r) {
                Ok(file) => {
                    debug!("Rendered {}", template_path.display());
                    collection.files.insert(template_path, file);
                }
                Err(err) => {
                    error!("Failed to render {}: {}", template_path.display(), err);
                    collection.failures.insert(template_path, err);
                }
            }
        }

        info!(
            "Rendered {} templates, {} failed",
            collection.files.len(),
            collection.failures.len()
        );
        Ok(collection)
    }
}
