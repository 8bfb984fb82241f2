// ABOUTME: Handlebars rendering engine owning the helper registry and ignored-name set
// ABOUTME: Renders templates against resolved variables and supports scoped helper registration

use handlebars::{
    Context, Handlebars, Helper, HelperDef, Output, RenderContext, RenderError, Renderable,
    ScopedJson, StringOutput, Template,
};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

use super::context::TemplateContext;
use super::error::{Result, TemplateError};
use super::helpers::{self, RESOLVED_VARIABLES_KEY};
use super::scanner::{self, SyntaxTree};
use crate::config::{config_variable_key, variables_to_json, VariableMap};

type SharedHelperDef = Arc<dyn HelperDef + Send + Sync>;

/// Registry entry that lets one helper definition be installed more than once.
#[derive(Clone)]
struct SharedHelper(SharedHelperDef);

impl HelperDef for SharedHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
    ) -> std::result::Result<ScopedJson<'reg, 'rc>, RenderError> {
        self.0.call_inner(h, r, ctx, rc)
    }

    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> std::result::Result<(), RenderError> {
        self.0.call(h, r, ctx, rc, out)
    }
}

#[derive(Clone)]
pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
    helpers: BTreeMap<String, SharedHelperDef>,
    ignored: BTreeSet<String>,
}

impl TemplateEngine {
    /// Create a new template engine with the built-in helpers installed
    pub fn new() -> Self {
        let mut engine = Self {
            handlebars: Self::base_registry(),
            helpers: BTreeMap::new(),
            ignored: BTreeSet::new(),
        };
        for (name, helper) in helpers::builtin_helpers() {
            engine.install(name, Arc::from(helper));
        }
        engine
    }

    fn base_registry() -> Handlebars<'static> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.set_dev_mode(false);

        // Output is config files and shell scripts, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
    }

    fn install(&mut self, name: &str, helper: SharedHelperDef) -> Option<SharedHelperDef> {
        self.handlebars
            .register_helper(name, Box::new(SharedHelper(helper.clone())));
        self.ignored.insert(name.to_string());
        self.helpers.insert(name.to_string(), helper)
    }

    fn rebuild_registry(&mut self) {
        let mut handlebars = Self::base_registry();
        for (name, helper) in &self.helpers {
            handlebars.register_helper(name, Box::new(SharedHelper(helper.clone())));
        }
        self.handlebars = handlebars;
    }

    /// Register a helper. Its name is no longer treated as a variable reference.
    pub fn register_helper<H>(&mut self, name: &str, helper: H)
    where
        H: HelperDef + Send + Sync + 'static,
    {
        debug!("Registering template helper '{}'", name);
        self.install(name, Arc::new(helper));
    }

    /// Remove a helper and its ignored-name entry. Returns false if it was not registered.
    pub fn unregister_helper(&mut self, name: &str) -> bool {
        if self.helpers.remove(name).is_none() {
            return false;
        }
        debug!("Unregistering template helper '{}'", name);
        self.ignored.remove(name);
        self.rebuild_registry();
        true
    }

    /// Register a helper for the lifetime of the returned guard.
    ///
    /// Dropping the guard removes the helper again, restoring any helper the
    /// name shadowed.
    pub fn scoped_helper<H>(&mut self, name: &str, helper: H) -> HelperScope<'_>
    where
        H: HelperDef + Send + Sync + 'static,
    {
        let previous = self.install(name, Arc::new(helper));
        HelperScope {
            engine: self,
            name: name.to_string(),
            previous,
        }
    }

    pub fn has_helper(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    /// Names that are never resolved as configuration variables.
    pub fn ignored_names(&self) -> &BTreeSet<String> {
        &self.ignored
    }

    /// Compile template text once for scanning and rendering.
    pub fn compile(&self, source: &str) -> Result<CompiledTemplate> {
        let template = scanner::compile(source)?;
        let tree = SyntaxTree::from_template(&template);
        Ok(CompiledTemplate { template, tree })
    }

    /// Render a template against resolved variables and optional extra data.
    ///
    /// Every configuration-shaped name the template references must be bound,
    /// otherwise the render fails with `TemplateError::MissingVariable`.
    pub fn render(
        &self,
        template: &str,
        variables: &VariableMap,
        data: Option<&TemplateContext>,
    ) -> Result<String> {
        let compiled = self.compile(template)?;
        self.render_compiled(&compiled, variables, data)
    }

    /// Render an already compiled template. See [`TemplateEngine::render`].
    pub fn render_compiled(
        &self,
        compiled: &CompiledTemplate,
        variables: &VariableMap,
        data: Option<&TemplateContext>,
    ) -> Result<String> {
        self.check_bound(&compiled.tree, variables, data)?;

        let context = Context::wraps(render_data(variables, data))?;
        let mut render_context = RenderContext::new(None);
        let mut output = StringOutput::new();
        compiled
            .template
            .render(&self.handlebars, &context, &mut render_context, &mut output)?;
        Ok(output.into_string().map_err(RenderError::from)?)
    }

    fn check_bound(
        &self,
        tree: &SyntaxTree,
        variables: &VariableMap,
        data: Option<&TemplateContext>,
    ) -> Result<()> {
        for name in tree.variable_names() {
            if config_variable_key(&name, &self.ignored).is_none() {
                continue;
            }
            let in_data = data.map(|d| d.contains_key(&name)).unwrap_or(false);
            if !variables.contains_key(&name) && !in_data {
                return Err(TemplateError::MissingVariable(name));
            }
        }
        Ok(())
    }

    /// Check if a string contains template expressions
    pub fn has_templates(&self, text: &str) -> bool {
        text.contains("{{") && text.contains("}}")
    }
}

/// Render-time JSON: extra data overlaid with the bindings, plus the bindings
/// alone under [`RESOLVED_VARIABLES_KEY`] for the comparison helpers.
fn render_data(variables: &VariableMap, data: Option<&TemplateContext>) -> JsonValue {
    let mut json = match data {
        Some(data) => data.merged_with(variables),
        None => TemplateContext::new().merged_with(variables),
    };
    if let JsonValue::Object(map) = &mut json {
        map.insert(RESOLVED_VARIABLES_KEY.to_string(), variables_to_json(variables));
    }
    json
}

/// Template text compiled by [`TemplateEngine::compile`].
pub struct CompiledTemplate {
    template: Template,
    tree: SyntaxTree,
}

impl CompiledTemplate {
    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard returned by [`TemplateEngine::scoped_helper`].
pub struct HelperScope<'a> {
    engine: &'a mut TemplateEngine,
    name: String,
    previous: Option<SharedHelperDef>,
}

impl Deref for HelperScope<'_> {
    type Target = TemplateEngine;

    fn deref(&self) -> &TemplateEngine {
        self.engine
    }
}

impl Drop for HelperScope<'_> {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(previous) => {
                self.engine.install(&self.name, previous);
            }
            None => {
                self.engine.unregister_helper(&self.name);
            }
        }
    }
}
