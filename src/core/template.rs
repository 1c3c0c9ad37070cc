//! Command templates with `{name}` placeholders.
//!
//! Resolution is two passes: literal placeholder substitution, then
//! environment expansion of the substituted text. `${NAME}` is environment
//! syntax and is never treated as a placeholder.

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::environment::Environment;
use crate::pipeline::CommandStep;

/// Immutable command line with `{name}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    label: &'static str,
    text: Cow<'static, str>,
}

impl CommandTemplate {
    pub const fn new(label: &'static str, text: &'static str) -> Self {
        Self {
            label,
            text: Cow::Borrowed(text),
        }
    }

    pub fn owned(label: &'static str, text: String) -> Self {
        Self {
            label,
            text: Cow::Owned(text),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Placeholder names declared by this template, in order of first use.
    pub fn placeholders(&self) -> Vec<String> {
        placeholders(&self.text)
    }

    /// Declared placeholders with no value in `substitutions`.
    pub fn missing(&self, substitutions: &Substitutions) -> Vec<String> {
        self.placeholders()
            .into_iter()
            .filter(|name| substitutions.get(name).is_none())
            .collect()
    }

    /// Substitute placeholders, then expand environment references.
    ///
    /// Every placeholder must have a value; an unfilled placeholder is a
    /// bug in the caller's template table.
    pub fn resolve(&self, substitutions: &Substitutions, env: &Environment) -> CommandStep {
        debug_assert!(
            self.missing(substitutions).is_empty(),
            "template '{}' has unfilled placeholders: {:?}",
            self.label,
            self.missing(substitutions)
        );

        let rendered = render(&self.text, substitutions);
        CommandStep::new(self.label, env.expand(&rendered))
    }
}

/// Per-invocation placeholder values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitutions {
    values: BTreeMap<String, String>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Resolve `template` against `substitutions` and `env`.
pub fn resolve(
    template: &CommandTemplate,
    substitutions: &Substitutions,
    env: &Environment,
) -> CommandStep {
    template.resolve(substitutions, env)
}

/// Replace every `{key}` token with its value.
pub fn render(template: &str, substitutions: &Substitutions) -> String {
    let mut result = template.to_string();

    for (key, value) in substitutions.iter() {
        let placeholder = format!("{{{}}}", key);
        result = result.replace(&placeholder, value);
    }

    result
}

pub fn is_present(template: &str, key: &str) -> bool {
    placeholders(template).iter().any(|name| name == key)
}

/// Collect `{name}` tokens, skipping `${name}` environment references.
pub fn placeholders(template: &str) -> Vec<String> {
    let bytes = template.as_bytes();
    let mut names: Vec<String> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'{' || (i > 0 && bytes[i - 1] == b'$') {
            i += 1;
            continue;
        }

        let start = i + 1;
        let mut end = start;
        while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
            end += 1;
        }

        let is_name = end > start && !bytes[start].is_ascii_digit();
        if is_name && end < bytes.len() && bytes[end] == b'}' {
            let name = &template[start..end];
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
            i = end + 1;
        } else {
            i += 1;
        }
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPLOY: CommandTemplate = CommandTemplate::new(
        "deploy",
        "cd {dir} \nmvn deploy:deploy-file -Durl={repoUrl} -Dfile={artifactId}-{version}.{ext}",
    );

    fn subs() -> Substitutions {
        Substitutions::new()
            .with("dir", "${WORKSPACE}\\target")
            .with("repoUrl", "http://nexus/releases")
            .with("artifactId", "portal")
            .with("version", "2.3.1")
            .with("ext", "war")
    }

    #[test]
    fn placeholders_lists_each_name_once() {
        let names = placeholders("{a} {b} {a}");
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn placeholders_skips_environment_references() {
        let names = placeholders("xcopy \"${WORKSPACE}\\{configFilePath}\" {0} { spaced }");
        assert_eq!(names, vec!["configFilePath".to_string()]);
    }

    #[test]
    fn render_replaces_every_occurrence() {
        let rendered = render("{x}-{x}", &Substitutions::new().with("x", "1"));
        assert_eq!(rendered, "1-1");
    }

    #[test]
    fn resolve_substitutes_then_expands_environment() {
        let env = Environment::new().with("WORKSPACE", "/build/42");
        let step = DEPLOY.resolve(&subs(), &env);

        assert_eq!(step.label(), "deploy");
        assert_eq!(
            step.command(),
            "cd /build/42\\target \nmvn deploy:deploy-file -Durl=http://nexus/releases -Dfile=portal-2.3.1.war"
        );
    }

    #[test]
    fn resolved_step_has_no_substituted_placeholders() {
        let step = resolve(&DEPLOY, &subs(), &Environment::new());
        for (key, _) in subs().iter() {
            assert!(!step.command().contains(&format!("{{{}}}", key)));
        }
    }

    #[test]
    fn resolve_passes_through_undefined_environment_references() {
        let step = DEPLOY.resolve(&subs(), &Environment::new());
        assert!(step.command().starts_with("cd ${WORKSPACE}\\target"));
    }

    #[test]
    fn missing_reports_unfilled_placeholders() {
        let partial = Substitutions::new().with("dir", "x");
        let missing = DEPLOY.missing(&partial);
        assert!(missing.contains(&"version".to_string()));
        assert!(!missing.contains(&"dir".to_string()));
    }

    #[test]
    fn is_present_matches_declared_names_only() {
        assert!(is_present("sc {server} query", "server"));
        assert!(!is_present("echo ${server}", "server"));
    }
}
