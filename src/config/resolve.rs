//! Placeholder resolution for configuration values.
//!
//! Supports `${path.to.field}` references to other properties and
//! `${path.to.field:default}` fallbacks. References are resolved against the
//! same [`PropertySources`] the value is bound from, when it is bound.
//! Use `$${...}` to escape and produce a literal `${...}`.

use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

use super::name::PropertyName;
use super::source::PropertySources;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum PlaceholderError {
    #[error("Could not resolve placeholder '{placeholder}' in value \"{value}\"")]
    Unresolvable { placeholder: String, value: String },

    #[error("Circular placeholder reference '{placeholder}' in property definitions")]
    Circular { placeholder: String },

    #[error("Unclosed placeholder in value \"{value}\" (missing '}}')")]
    Unclosed { value: String },
}

/// Resolves `${...}` placeholders against a set of property sources.
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderResolver<'a> {
    sources: &'a PropertySources,
}

impl<'a> PlaceholderResolver<'a> {
    pub fn new(sources: &'a PropertySources) -> Self {
        Self { sources }
    }

    /// Resolves every placeholder in `value`, recursively resolving the
    /// values they refer to.
    pub fn resolve(&self, value: &str) -> Result<String, PlaceholderError> {
        self.resolve_with(value, &mut Vec::new())
    }

    fn resolve_with(&self, value: &str, visiting: &mut Vec<String>) -> Result<String, PlaceholderError> {
        if !value.contains('$') {
            return Ok(value.to_string());
        }

        let mut result = String::with_capacity(value.len());
        let mut chars = value.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch != '$' {
                result.push(ch);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    // Escape sequence: $$ -> $
                    chars.next();
                    result.push('$');
                }
                Some('{') => {
                    chars.next();
                    let inner = consume_placeholder(&mut chars).ok_or_else(|| {
                        PlaceholderError::Unclosed {
                            value: value.to_string(),
                        }
                    })?;
                    let resolved = self.resolve_placeholder(&inner, value, visiting)?;
                    result.push_str(&resolved);
                }
                _ => result.push('$'),
            }
        }

        Ok(result)
    }

    fn resolve_placeholder(
        &self,
        inner: &str,
        value: &str,
        visiting: &mut Vec<String>,
    ) -> Result<String, PlaceholderError> {
        let (key, default) = split_default(inner);
        let key = self.resolve_with(key, visiting)?;

        if visiting.contains(&key) {
            return Err(PlaceholderError::Circular { placeholder: key });
        }

        match self.lookup(&key) {
            Some(raw) => {
                visiting.push(key);
                let resolved = self.resolve_with(raw, visiting);
                visiting.pop();
                resolved
            }
            None => match default {
                Some(default) => self.resolve_with(default, visiting),
                None => Err(PlaceholderError::Unresolvable {
                    placeholder: key,
                    value: value.to_string(),
                }),
            },
        }
    }

    fn lookup(&self, key: &str) -> Option<&'a str> {
        let name = PropertyName::of(key.trim()).ok()?;
        if name.is_empty() {
            return None;
        }
        self.sources.get(&name).map(|property| property.value.as_str())
    }
}

/// Consumes the body of a placeholder up to its matching `}`.
fn consume_placeholder(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    let mut result = String::new();
    let mut depth = 1;
    for ch in chars.by_ref() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(result);
                }
            }
            _ => {}
        }
        result.push(ch);
    }
    None
}

/// Splits `key:default` on the first `:` outside nested placeholders.
fn split_default(inner: &str) -> (&str, Option<&str>) {
    let mut depth = 0;
    for (index, ch) in inner.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth -= 1,
            ':' if depth == 0 => return (&inner[..index], Some(&inner[index + 1..])),
            _ => {}
        }
    }
    (inner, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::source::{ConfigurationProperty, Origin};

    fn sources(pairs: &[(&str, &str)]) -> PropertySources {
        let mut sources = PropertySources::new();
        sources.push(
            "test",
            pairs.iter().map(|(key, value)| {
                ConfigurationProperty::new(
                    PropertyName::of(key).unwrap(),
                    *value,
                    Origin::new("test", *key),
                )
            }),
        );
        sources
    }

    #[test]
    fn test_simple_reference() {
        let sources = sources(&[("host", "localhost")]);
        let resolver = PlaceholderResolver::new(&sources);
        assert_eq!(resolver.resolve("http://${host}/api").unwrap(), "http://localhost/api");
    }

    #[test]
    fn test_relaxed_reference_names() {
        let sources = sources(&[("server.hostName", "example.com")]);
        let resolver = PlaceholderResolver::new(&sources);
        assert_eq!(resolver.resolve("${SERVER.HOST-NAME}").unwrap(), "example.com");
    }

    #[test]
    fn test_chained_references() {
        let sources = sources(&[("a", "hello"), ("b", "${a} world")]);
        let resolver = PlaceholderResolver::new(&sources);
        assert_eq!(resolver.resolve("${b}!").unwrap(), "hello world!");
    }

    #[test]
    fn test_default_value() {
        let sources = sources(&[("port", "3000")]);
        let resolver = PlaceholderResolver::new(&sources);
        assert_eq!(resolver.resolve("${missing:8080}").unwrap(), "8080");
        assert_eq!(resolver.resolve("${port:8080}").unwrap(), "3000");
        assert_eq!(resolver.resolve("${missing:${port}}").unwrap(), "3000");
        assert_eq!(resolver.resolve("${missing:}").unwrap(), "");
    }

    #[test]
    fn test_nested_key() {
        let sources = sources(&[("env", "prod"), ("url.prod", "https://prod")]);
        let resolver = PlaceholderResolver::new(&sources);
        assert_eq!(resolver.resolve("${url.${env}}").unwrap(), "https://prod");
    }

    #[test]
    fn test_escape_sequence() {
        let sources = sources(&[]);
        let resolver = PlaceholderResolver::new(&sources);
        assert_eq!(
            resolver.resolve("use $${VAR} for env vars").unwrap(),
            "use ${VAR} for env vars"
        );
        assert_eq!(resolver.resolve("costs $5").unwrap(), "costs $5");
    }

    #[test]
    fn test_unresolvable_placeholder() {
        let sources = sources(&[]);
        let resolver = PlaceholderResolver::new(&sources);
        let error = resolver.resolve("${BAR}").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Could not resolve placeholder 'BAR' in value \"${BAR}\""
        );
    }

    #[test]
    fn test_unresolvable_reports_innermost_value() {
        let sources = sources(&[("a", "x-${b}")]);
        let resolver = PlaceholderResolver::new(&sources);
        assert_eq!(
            resolver.resolve("${a}").unwrap_err(),
            PlaceholderError::Unresolvable {
                placeholder: "b".to_string(),
                value: "x-${b}".to_string(),
            }
        );
    }

    #[test]
    fn test_circular_reference() {
        let sources = sources(&[("a", "${b}"), ("b", "${a}")]);
        let resolver = PlaceholderResolver::new(&sources);
        assert!(matches!(
            resolver.resolve("${a}"),
            Err(PlaceholderError::Circular { .. })
        ));
    }

    #[test]
    fn test_unclosed_placeholder() {
        let sources = sources(&[]);
        let resolver = PlaceholderResolver::new(&sources);
        assert!(matches!(
            resolver.resolve("${oops"),
            Err(PlaceholderError::Unclosed { .. })
        ));
    }
}
