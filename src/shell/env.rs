// ABOUTME: Bash environment assignment formatting with secret propagation
// ABOUTME: Escapes values for double-quoted bash strings and extracts ${name} references

use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

use crate::config::ResolvedValue;

/// Ordered name -> value map of environment variables.
pub type EnvMap = IndexMap<String, ResolvedValue>;

/// Escape a value for use inside a double-quoted bash string.
///
/// `\`, `"`, backtick and `!` are always escaped; `$` only when variable
/// expansion is not wanted.
pub fn escape_bash_env_value(value: &str, allow_variable_expansion: bool) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' | '"' | '`' | '!' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '$' if !allow_variable_expansion => escaped.push_str("\\$"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn stringify(env: &EnvMap, format: impl Fn(&str, &str) -> String, separator: &str) -> ResolvedValue {
    let secret = env.values().any(ResolvedValue::is_secret);
    let joined = env
        .iter()
        .map(|(name, value)| format(name, &escape_bash_env_value(value.expose(), false)))
        .collect::<Vec<_>>()
        .join(separator);
    ResolvedValue::new(joined, secret)
}

/// `NAME="value" OTHER="value"`, for prefixing a single command.
pub fn stringify_env_for_command(env: &EnvMap) -> ResolvedValue {
    stringify(env, |name, value| format!("{}=\"{}\"", name, value), " ")
}

/// One `export NAME="value"` statement per line, for sourcing in a script.
pub fn stringify_env_for_script(env: &EnvMap) -> ResolvedValue {
    stringify(env, |name, value| format!("export {}=\"{}\"", name, value), "\n")
}

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid variable pattern"))
}

/// Distinct `${name}` references in first-seen order.
pub fn extract_variable_names(content: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for captures in variable_pattern().captures_iter(content) {
        let name = &captures[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_without_expansion() {
        assert_eq!(escape_bash_env_value(r#"a"b$c"#, false), r#"a\"b\$c"#);
    }

    #[test]
    fn test_escape_with_expansion() {
        assert_eq!(escape_bash_env_value(r#"a"b$c"#, true), r#"a\"b$c"#);
    }

    #[test]
    fn test_escape_backslash_backtick_bang() {
        assert_eq!(escape_bash_env_value(r"a\b`c!d", false), r"a\\b\`c\!d");
    }

    #[test]
    fn test_stringify_for_command() {
        let mut env = EnvMap::new();
        env.insert("DOMAIN".into(), ResolvedValue::plain("example.com"));
        env.insert("GREETING".into(), ResolvedValue::plain("say \"hi\""));

        let result = stringify_env_for_command(&env);
        assert_eq!(
            result.expose(),
            r#"DOMAIN="example.com" GREETING="say \"hi\"""#
        );
        assert!(!result.is_secret());
    }

    #[test]
    fn test_stringify_for_script_keeps_secrets() {
        let mut env = EnvMap::new();
        env.insert("DOMAIN".into(), ResolvedValue::plain("example.com"));
        env.insert("SECRET_KEY".into(), ResolvedValue::secret("p$ss"));

        let result = stringify_env_for_script(&env);
        assert_eq!(
            result.expose(),
            "export DOMAIN=\"example.com\"\nexport SECRET_KEY=\"p\\$ss\""
        );
        assert!(result.is_secret());
    }

    #[test]
    fn test_extract_variable_names() {
        let names = extract_variable_names("${A}:${B_C} ${A} $D ${}");
        assert_eq!(names, vec!["A", "B_C"]);
    }
}
