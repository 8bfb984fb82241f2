// ABOUTME: Template file discovery and path naming rules
// ABOUTME: Matches marker-in-the-middle filenames, strips template extensions and derives id-safe names

use regex::Regex;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::{Arc, OnceLock};
use tracing::debug;
use walkdir::WalkDir;

use super::error::{Result, TemplateError};

/// Override for template detection: `(path, file_name) -> is_template`.
pub type TemplatePredicate = Arc<dyn Fn(&Path, &str) -> bool + Send + Sync>;

fn template_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^.*\.(hbs|handlebars)\..+(\.(hbs|handlebars))?$").expect("valid template pattern")
    })
}

fn extension_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\.(hbs|handlebars)").expect("valid extension pattern"))
}

fn id_unsafe_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_-]").expect("valid id pattern"))
}

/// `config.hbs.yaml` is a template, `template.hbs` and `plain.yaml` are not.
pub fn is_template_file(file_name: &str) -> bool {
    template_pattern().is_match(file_name)
}

/// Deployed path for a template: every `.hbs`/`.handlebars` segment removed.
pub fn remove_template_extensions(template_path: &Path) -> PathBuf {
    let text = template_path.to_string_lossy();
    PathBuf::from(extension_pattern().replace_all(&text, "").into_owned())
}

/// Identifier derived from a path: `[a-zA-Z0-9_-]` only, leading-dot files become `dot-...`.
pub fn build_sanitized_name_for_id(template_path: &Path) -> String {
    let mut path = template_path.to_path_buf();
    if let Some(file_name) = template_path.file_name().and_then(|n| n.to_str()) {
        if let Some(rest) = file_name.strip_prefix('.') {
            path = template_path.with_file_name(format!("dot-{}", rest));
        }
    }

    let replaced = path
        .to_string_lossy()
        .replace('.', "-")
        .replace(MAIN_SEPARATOR, "-");
    id_unsafe_pattern().replace_all(&replaced, "").into_owned()
}

/// Depth-first scan of `dir` (resolved against `base_dir`) for template files.
///
/// Returned paths are relative to `base_dir`, i.e. they start with `dir`. Absolute
/// directories are rejected.
pub fn discover_template_files(
    base_dir: &Path,
    dir: &Path,
    recursive: bool,
    predicate: Option<&TemplatePredicate>,
) -> Result<Vec<PathBuf>> {
    if dir.is_absolute() {
        return Err(TemplateError::AbsolutePath(dir.to_path_buf()));
    }

    let root = base_dir.join(dir);
    let mut walker = WalkDir::new(&root).follow_links(false);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut templates = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            TemplateError::IoError(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = match entry.path().strip_prefix(base_dir) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => entry.path().to_path_buf(),
        };
        let file_name = entry.file_name().to_string_lossy();
        let matched = match predicate {
            Some(predicate) => predicate(&relative, &file_name),
            None => is_template_file(&file_name),
        };
        if matched {
            debug!("Discovered template file: {}", relative.display());
            templates.push(relative);
        }
    }

    Ok(templates)
}
