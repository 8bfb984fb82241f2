// ABOUTME: Variable reference scanner built on a crate-owned Handlebars syntax tree
// ABOUTME: Lowers the handlebars AST into tagged variants and walks them to collect referenced names

use handlebars::template::{DecoratorTemplate, HelperTemplate, Parameter, TemplateElement};
use handlebars::Template;
use serde_json::Value as JsonValue;
use std::collections::{BTreeSet, HashMap};

use super::error::{Result, TemplateError};

/// A parsed template, reduced to the node kinds that matter for variable discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxTree {
    pub body: Vec<Node>,
}

/// Statement-level nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text or a comment.
    Content,
    /// `{{path params.. key=value}}`
    Mustache {
        path: Expr,
        params: Vec<Expr>,
        hash: Hash,
    },
    /// `{{#path params..}}program{{else}}inverse{{/path}}`
    Block {
        path: Expr,
        params: Vec<Expr>,
        hash: Hash,
        program: Vec<Node>,
        inverse: Vec<Node>,
    },
    /// `{{> name params..}}`
    Partial {
        name: Expr,
        params: Vec<Expr>,
        hash: Hash,
    },
    /// `{{#> name}}program{{/name}}` and inline partial definitions
    PartialBlock {
        name: Expr,
        params: Vec<Expr>,
        hash: Hash,
        program: Vec<Node>,
    },
}

/// Expression-level nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Path(String),
    SubExpression {
        path: Box<Expr>,
        params: Vec<Expr>,
        hash: Hash,
    },
    Literal(JsonValue),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hash {
    pub pairs: Vec<HashPair>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: String,
    pub value: Expr,
}

impl SyntaxTree {
    /// Parse template text. Malformed syntax is reported as `TemplateError::SyntaxError`.
    pub fn parse(source: &str) -> Result<Self> {
        Ok(Self::from_template(&compile(source)?))
    }

    pub fn from_template(template: &Template) -> Self {
        Self {
            body: lower_elements(&template.elements),
        }
    }

    /// True when the template contains nothing but literal text and comments.
    pub fn is_static(&self) -> bool {
        self.body.iter().all(|node| matches!(node, Node::Content))
    }

    /// Distinct candidate variable names referenced anywhere in the tree.
    pub fn variable_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        walk_nodes(&self.body, &mut names);
        names
    }
}

/// Compile template text into the handlebars representation.
pub fn compile(source: &str) -> Result<Template> {
    Template::compile(source).map_err(|e| TemplateError::SyntaxError(e.to_string()))
}

/// Parse `source` and return the distinct names it references.
pub fn discover_variables(source: &str) -> Result<BTreeSet<String>> {
    Ok(SyntaxTree::parse(source)?.variable_names())
}

fn walk_nodes(nodes: &[Node], names: &mut BTreeSet<String>) {
    for node in nodes {
        walk_node(node, names);
    }
}

fn walk_node(node: &Node, names: &mut BTreeSet<String>) {
    match node {
        Node::Content => {}
        Node::Mustache { path, params, hash } => {
            walk_call(path, params, hash, names);
        }
        Node::Block {
            path,
            params,
            hash,
            program,
            inverse,
        } => {
            walk_call(path, params, hash, names);
            walk_nodes(program, names);
            walk_nodes(inverse, names);
        }
        Node::Partial { name, params, hash } => {
            walk_expr(name, names);
            walk_exprs(params, names);
            walk_hash(hash, names);
        }
        Node::PartialBlock {
            name,
            params,
            hash,
            program,
        } => {
            walk_expr(name, names);
            walk_exprs(params, names);
            walk_hash(hash, names);
            walk_nodes(program, names);
        }
    }
}

// The head of a call is a value reference only when nothing is passed to it;
// otherwise it names a helper.
fn walk_call(path: &Expr, params: &[Expr], hash: &Hash, names: &mut BTreeSet<String>) {
    if (params.is_empty() && hash.pairs.is_empty()) || !matches!(path, Expr::Path(_)) {
        walk_expr(path, names);
    }
    walk_exprs(params, names);
    walk_hash(hash, names);
}

fn walk_exprs(exprs: &[Expr], names: &mut BTreeSet<String>) {
    for expr in exprs {
        walk_expr(expr, names);
    }
}

fn walk_expr(expr: &Expr, names: &mut BTreeSet<String>) {
    match expr {
        Expr::Path(name) => {
            if !name.is_empty() {
                names.insert(name.clone());
            }
        }
        Expr::SubExpression { path, params, hash } => walk_call(path, params, hash, names),
        Expr::Literal(_) => {}
    }
}

fn walk_hash(hash: &Hash, names: &mut BTreeSet<String>) {
    for pair in &hash.pairs {
        walk_expr(&pair.value, names);
    }
}

fn lower_elements(elements: &[TemplateElement]) -> Vec<Node> {
    elements.iter().map(lower_element).collect()
}

fn lower_element(element: &TemplateElement) -> Node {
    match element {
        TemplateElement::RawString(_) | TemplateElement::Comment(_) => Node::Content,
        TemplateElement::Expression(ht) | TemplateElement::HtmlExpression(ht) => Node::Mustache {
            path: lower_param(&ht.name),
            params: lower_params(&ht.params),
            hash: lower_hash(&ht.hash),
        },
        TemplateElement::HelperBlock(ht) => lower_block(ht),
        TemplateElement::PartialExpression(dt) | TemplateElement::DecoratorExpression(dt) => {
            Node::Partial {
                name: lower_param(&dt.name),
                params: lower_params(&dt.params),
                hash: lower_hash(&dt.hash),
            }
        }
        TemplateElement::PartialBlock(dt) | TemplateElement::DecoratorBlock(dt) => {
            lower_partial_block(dt)
        }
    }
}

fn lower_block(ht: &HelperTemplate) -> Node {
    Node::Block {
        path: lower_param(&ht.name),
        params: lower_params(&ht.params),
        hash: lower_hash(&ht.hash),
        program: ht
            .template
            .as_ref()
            .map(|t| lower_elements(&t.elements))
            .unwrap_or_default(),
        inverse: ht
            .inverse
            .as_ref()
            .map(|t| lower_elements(&t.elements))
            .unwrap_or_default(),
    }
}

fn lower_partial_block(dt: &DecoratorTemplate) -> Node {
    Node::PartialBlock {
        name: lower_param(&dt.name),
        params: lower_params(&dt.params),
        hash: lower_hash(&dt.hash),
        program: dt
            .template
            .as_ref()
            .map(|t| lower_elements(&t.elements))
            .unwrap_or_default(),
    }
}

fn lower_params(params: &[Parameter]) -> Vec<Expr> {
    params.iter().map(lower_param).collect()
}

fn lower_hash(hash: &HashMap<String, Parameter>) -> Hash {
    let mut pairs: Vec<HashPair> = hash
        .iter()
        .map(|(key, value)| HashPair {
            key: key.clone(),
            value: lower_param(value),
        })
        .collect();
    pairs.sort_by(|a, b| a.key.cmp(&b.key));
    Hash { pairs }
}

fn lower_param(param: &Parameter) -> Expr {
    match param {
        Parameter::Name(_) | Parameter::Path(_) => {
            Expr::Path(normalize_path(param.as_name().unwrap_or_default()))
        }
        Parameter::Literal(value) => Expr::Literal(value.clone()),
        Parameter::Subexpression(sub) => Expr::SubExpression {
            path: Box::new(Expr::Path(normalize_path(sub.name()))),
            params: sub.params().map(|p| lower_params(p)).unwrap_or_default(),
            hash: sub.hash().map(lower_hash).unwrap_or_default(),
        },
    }
}

/// `[parent:KEY]` is the segment-literal spelling of a namespaced reference.
fn normalize_path(raw: &str) -> String {
    match raw.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        Some(inner) if !inner.contains(']') => inner.to_string(),
        _ => raw.to_string(),
    }
}
