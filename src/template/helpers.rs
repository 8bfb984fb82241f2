// ABOUTME: Built-in Handlebars helpers installed on every template engine
// ABOUTME: raw blocks, ifeq/ifnoteq branching, render-time partials and the missing-helper marker

use handlebars::{
    BlockContext, Context, Handlebars, Helper, HelperDef, JsonRender, Output, RenderContext,
    RenderError, Renderable,
};
use serde_json::{json, Value as JsonValue};
use tracing::warn;

/// Root key under which the engine places the resolved bindings alone,
/// without any extra render data. Not addressable from template paths.
pub const RESOLVED_VARIABLES_KEY: &str = "@resolved_variables";

/// Name and definition of every built-in helper.
pub fn builtin_helpers() -> Vec<(&'static str, Box<dyn HelperDef + Send + Sync>)> {
    vec![
        ("raw", Box::new(RawHelper)),
        ("ifeq", Box::new(CompareHelper { equal: true })),
        ("ifnoteq", Box::new(CompareHelper { equal: false })),
        ("partial", Box::new(PartialHelper)),
        ("helperMissing", Box::new(MissingHelper)),
        ("blockHelperMissing", Box::new(MissingHelper)),
    ]
}

/// Renders its block against an empty context.
///
/// With the `{{{{raw}}}}...{{{{/raw}}}}` form the block is never parsed and is
/// emitted verbatim.
pub struct RawHelper;

impl HelperDef for RawHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> Result<(), RenderError> {
        let Some(template) = h.template() else {
            return Ok(());
        };

        let mut block = BlockContext::new();
        block.set_base_value(json!({}));
        rc.push_block(block);
        let result = template.render(r, ctx, rc, out);
        rc.pop_block();
        result
    }
}

/// `{{#ifeq a b}}..{{else}}..{{/ifeq}}` and its negation.
///
/// The chosen branch renders from the root of the resolved variables, so it
/// sees every binding even when used inside an `each` or `with` block. Extra
/// render data is not visible inside the branch.
pub struct CompareHelper {
    pub equal: bool,
}

impl HelperDef for CompareHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> Result<(), RenderError> {
        let (a, b) = match (h.param(0), h.param(1)) {
            (Some(a), Some(b)) => (a.value(), b.value()),
            _ => {
                return Err(RenderError::new(format!(
                    "{} requires two parameters",
                    h.name()
                )))
            }
        };

        let resolved = ctx
            .data()
            .get(RESOLVED_VARIABLES_KEY)
            .unwrap_or_else(|| ctx.data());
        match resolved {
            JsonValue::Object(map) if map.is_empty() => {
                warn!("{} rendered with an empty set of resolved variables", h.name());
            }
            JsonValue::Object(_) => {}
            _ => {
                return Err(RenderError::new(format!(
                    "{} expected resolved variables in the render context",
                    h.name()
                )))
            }
        }

        let branch = if (a == b) == self.equal {
            h.template()
        } else {
            h.inverse()
        };

        match branch {
            Some(template) => {
                let mut block = BlockContext::new();
                block.set_base_value(resolved.clone());
                rc.push_block(block);
                let result = template.render(r, ctx, rc, out);
                rc.pop_block();
                result
            }
            None => Ok(()),
        }
    }
}

/// `{{#partial "name"}}..{{/partial}}` registers the block as a partial for
/// the rest of the render and writes nothing.
pub struct PartialHelper;

impl HelperDef for PartialHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        _: &mut dyn Output,
    ) -> Result<(), RenderError> {
        let name = h
            .param(0)
            .and_then(|p| p.value().as_str())
            .ok_or_else(|| {
                RenderError::new("partial helper requires a string name as the first argument")
            })?;

        if let Some(template) = h.template() {
            rc.set_partial(name.to_owned(), template);
        }
        Ok(())
    }
}

/// Catch-all for unknown helpers: writes a visible marker instead of failing.
pub struct MissingHelper;

impl HelperDef for MissingHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> Result<(), RenderError> {
        let args = h
            .params()
            .iter()
            .map(|p| p.value().render())
            .collect::<Vec<_>>()
            .join(",");
        out.write(&format!("helperMissing: {}({})", h.name(), args))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_handlebars() -> Handlebars<'static> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        for (name, helper) in builtin_helpers() {
            handlebars.register_helper(name, helper);
        }
        handlebars
    }

    #[test]
    fn test_unknown_helper_renders_marker() {
        let handlebars = create_test_handlebars();
        let result = handlebars
            .render_template("{{foo bar}}", &json!({"bar": "baz"}))
            .unwrap();
        assert!(result.contains("helperMissing"));
        assert!(result.contains("foo"));
        assert_eq!(result, "helperMissing: foo(baz)");
    }

    #[test]
    fn test_ifeq_branches() {
        let handlebars = create_test_handlebars();
        let data = json!({"MODE": "prod", "DOMAIN": "example.com"});

        let result = handlebars
            .render_template(
                r#"{{#ifeq MODE "prod"}}{{DOMAIN}}{{else}}dev{{/ifeq}}"#,
                &data,
            )
            .unwrap();
        assert_eq!(result, "example.com");

        let result = handlebars
            .render_template(
                r#"{{#ifeq MODE "staging"}}{{DOMAIN}}{{else}}dev{{/ifeq}}"#,
                &data,
            )
            .unwrap();
        assert_eq!(result, "dev");
    }

    #[test]
    fn test_ifnoteq_branches() {
        let handlebars = create_test_handlebars();
        let data = json!({"MODE": "prod"});
        let result = handlebars
            .render_template(r#"{{#ifnoteq MODE "dev"}}live{{else}}local{{/ifnoteq}}"#, &data)
            .unwrap();
        assert_eq!(result, "live");
    }

    #[test]
    fn test_ifeq_with_empty_context_still_renders() {
        let handlebars = create_test_handlebars();
        let result = handlebars
            .render_template(r#"{{#ifeq "a" "a"}}same{{/ifeq}}"#, &json!({}))
            .unwrap();
        assert_eq!(result, "same");
    }

    #[test]
    fn test_ifeq_branch_sees_only_resolved_variables() {
        let handlebars = create_test_handlebars();
        let data = json!({
            "tier": "prod",
            "DOMAIN": "example.com",
            RESOLVED_VARIABLES_KEY: {"DOMAIN": "example.com"},
        });
        let result = handlebars
            .render_template(r#"{{#ifeq tier "prod"}}{{DOMAIN}}[{{tier}}]{{/ifeq}}"#, &data)
            .unwrap();
        assert_eq!(result, "example.com[]");
    }

    #[test]
    fn test_ifeq_requires_two_params() {
        let handlebars = create_test_handlebars();
        let err = handlebars
            .render_template(r#"{{#ifeq "a"}}x{{/ifeq}}"#, &json!({"A": "1"}))
            .unwrap_err();
        assert!(err.to_string().contains("requires two parameters"));
    }

    #[test]
    fn test_raw_block_is_verbatim() {
        let handlebars = create_test_handlebars();
        let result = handlebars
            .render_template("{{{{raw}}}}${{HOME}}{{{{/raw}}}}", &json!({"HOME": "x"}))
            .unwrap();
        assert_eq!(result, "${{HOME}}");
    }

    #[test]
    fn test_partial_registers_block() {
        let handlebars = create_test_handlebars();
        let result = handlebars
            .render_template(
                r#"{{#partial "greeting"}}hi {{NAME}}{{/partial}}[{{> greeting}}]"#,
                &json!({"NAME": "ops"}),
            )
            .unwrap();
        assert_eq!(result, "[hi ops]");
    }
}
