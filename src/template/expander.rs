// ABOUTME: Recursive expansion of variables whose configured values reference other variables
// ABOUTME: Discovers second-order references round by round, then renders values against each other

use std::collections::BTreeSet;
use tracing::debug;

use super::context::TemplateContext;
use super::engine::TemplateEngine;
use super::error::{Result, TemplateError};
use super::scanner::discover_variables;
use crate::config::{ConfigStore, VariableMap, VariableResolver};

pub const DEFAULT_MAX_ROUNDS: usize = 16;

/// Result of expanding a template's variables.
#[derive(Debug, Clone)]
pub struct Expansion {
    pub variables: VariableMap,
    /// Number of discovery rounds, counting the template's own references as round 1.
    pub depth: usize,
}

impl Expansion {
    pub fn has_secrets(&self) -> bool {
        self.variables.values().any(|v| v.is_secret())
    }
}

pub struct VariableExpander<'a> {
    engine: &'a TemplateEngine,
    resolver: VariableResolver<'a>,
    max_rounds: usize,
}

impl<'a> VariableExpander<'a> {
    pub fn new(engine: &'a TemplateEngine, store: &'a ConfigStore, namespace: &str) -> Self {
        Self {
            engine,
            resolver: VariableResolver::new(store, namespace, engine.ignored_names()),
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Resolve names scanned from a template and expand them fully.
    pub fn resolve(
        &self,
        names: &BTreeSet<String>,
        data: Option<&TemplateContext>,
    ) -> Result<Expansion> {
        let initial = self.resolver.resolve_all(names)?;
        self.expand(initial, data)
    }

    /// Expand an initial map of bindings.
    ///
    /// Shallower bindings win over deeper ones on collision, and the initial
    /// map wins over everything discovered later.
    pub fn expand(&self, initial: VariableMap, data: Option<&TemplateContext>) -> Result<Expansion> {
        let mut depth = 1;
        let mut deeper = VariableMap::new();
        let mut frontier: Vec<String> = initial.values().map(|v| v.expose().to_string()).collect();

        loop {
            let discovered = discover_variables(&frontier.join("\n"))?;
            let pending: BTreeSet<String> = discovered
                .into_iter()
                .filter(|name| self.resolver.applicable(name).is_some())
                .collect();

            if pending.is_empty() {
                break;
            }
            if depth >= self.max_rounds {
                return Err(TemplateError::ExpansionDepthExceeded {
                    limit: self.max_rounds,
                    pending: pending.into_iter().collect(),
                });
            }

            depth += 1;
            debug!("Expansion round {} resolving {:?}", depth, pending);

            let round = self.resolver.resolve_all(&pending)?;
            frontier = round.values().map(|v| v.expose().to_string()).collect();
            for (name, value) in round {
                deeper.entry(name).or_insert(value);
            }
        }

        let mut merged = deeper;
        merged.extend(initial);

        let variables = self.substitute(&merged, depth, data)?;
        Ok(Expansion { variables, depth })
    }

    // depth - 1 passes: each renders the merged value of every binding against
    // the current map, so a value picks up the text of the bindings it names.
    fn substitute(
        &self,
        merged: &VariableMap,
        depth: usize,
        data: Option<&TemplateContext>,
    ) -> Result<VariableMap> {
        let mut result = merged.clone();

        for _ in 1..depth {
            for (name, original) in merged {
                if !self.engine.has_templates(original.expose()) {
                    continue;
                }

                let referenced = discover_variables(original.expose())?;
                let tainted = referenced
                    .iter()
                    .any(|r| result.get(r).map(|v| v.is_secret()).unwrap_or(false));

                let rendered = self.engine.render(original.expose(), &result, data)?;
                let updated = original.with_value(rendered, tainted);
                result.insert(name.clone(), updated);
            }
        }

        Ok(result)
    }
}
