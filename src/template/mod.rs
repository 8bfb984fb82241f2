// ABOUTME: Template discovery, variable scanning, recursive resolution and rendering
// ABOUTME: Turns a directory of Handlebars templates into deployable files using the config store

pub mod context;
pub mod directory;
pub mod engine;
pub mod error;
pub mod expander;
pub mod helpers;
pub mod paths;
pub mod processor;
pub mod scanner;

pub use context::{RunInfo, TemplateContext};
pub use directory::{DirectoryOptions, TemplateCollection, TemplateDirectory};
pub use engine::{CompiledTemplate, HelperScope, TemplateEngine};
pub use error::{Result, TemplateError};
pub use expander::{Expansion, VariableExpander};
pub use paths::{
    build_sanitized_name_for_id, discover_template_files, is_template_file,
    remove_template_extensions, TemplatePredicate,
};
pub use processor::{RenderedContent, RenderedTemplateFile, TemplateProcessor};
pub use scanner::{discover_variables, SyntaxTree};
