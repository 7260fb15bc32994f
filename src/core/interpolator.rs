// src/core/interpolator.rs

use crate::core::properties::PropertyStore;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::path::Path;

lazy_static! {
    static ref PROPERTY_TOKEN_RE: Regex = Regex::new(r"\$\{([^{}]+)\}").unwrap();
}

/// The result of expanding a string, with the placeholders that had no property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub text: String,
    pub unresolved: Vec<String>,
}

/// Resolves `${Name}` placeholders against a property store.
#[derive(Debug, Clone, Copy)]
pub struct Interpolator<'a> {
    properties: &'a PropertyStore,
}

impl<'a> Interpolator<'a> {
    pub fn new(properties: &'a PropertyStore) -> Self {
        Self { properties }
    }

    /// Replaces every `${Name}` with the value of property `Name`.
    ///
    /// Unknown placeholders are left verbatim. Substituted values are not expanded again,
    /// so a property whose value contains `${...}` can never cause a cycle.
    pub fn expand(&self, template: &str) -> String {
        self.expand_tracked(template).text
    }

    /// Like `expand`, but also reports the unresolved placeholder names so the caller
    /// can log them.
    pub fn expand_tracked(&self, template: &str) -> Expansion {
        if !template.contains("${") {
            return Expansion {
                text: template.to_string(),
                unresolved: Vec::new(),
            };
        }

        let mut unresolved = Vec::new();
        let text = PROPERTY_TOKEN_RE
            .replace_all(template, |caps: &Captures<'_>| {
                let full_match = caps.get(0).map_or("", |m| m.as_str());
                let name = caps.get(1).map_or("", |m| m.as_str()).trim();
                match self.properties.get(name) {
                    Some(value) => value.to_string(),
                    None => {
                        log::debug!(
                            "Property '{}' is not defined; leaving {} as is.",
                            name,
                            full_match
                        );
                        unresolved.push(name.to_string());
                        full_match.to_string()
                    }
                }
            })
            .into_owned();

        Expansion { text, unresolved }
    }
}

/// Expands the filename formatter codes of `format` against `path`:
///
/// - `%f` the full path as given
/// - `%F` the file name without extension
/// - `%E` the extension, without the dot
/// - `%P` the parent directory path
/// - `%p` the parent directory name
///
/// Any other `%` sequence is copied through unchanged.
pub fn expand_formatter(path: &str, format: &str) -> String {
    let p = Path::new(path);
    let parent = p.parent();
    let lossy = |s: Option<&std::ffi::OsStr>| {
        s.map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default()
    };

    let mut result = String::with_capacity(format.len() + path.len());
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            result.push(c);
            continue;
        }
        let expansion = match chars.peek() {
            Some('f') => Some(path.to_string()),
            Some('F') => Some(lossy(p.file_stem())),
            Some('E') => Some(lossy(p.extension())),
            Some('P') => Some(parent.map(|d| d.to_string_lossy().to_string()).unwrap_or_default()),
            Some('p') => Some(lossy(parent.and_then(Path::file_name))),
            _ => None,
        };
        match expansion {
            Some(value) => {
                result.push_str(&value);
                chars.next();
            }
            None => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(pairs: &[(&str, &str)]) -> PropertyStore {
        let mut store = PropertyStore::new();
        for (k, v) in pairs {
            store.set(*k, *v);
        }
        store
    }

    #[test]
    fn test_expand_known_property() {
        let props = store(&[("WorkingDir", "/data")]);
        let interpolator = Interpolator::new(&props);
        assert_eq!(interpolator.expand("${WorkingDir}/out.csv"), "/data/out.csv");
    }

    #[test]
    fn test_expand_multiple_and_repeated_placeholders() {
        let props = store(&[("A", "1"), ("B", "two")]);
        let interpolator = Interpolator::new(&props);
        assert_eq!(interpolator.expand("${A}-${B}-${A}"), "1-two-1");
    }

    #[test]
    fn test_unresolved_placeholder_is_left_verbatim() {
        let props = store(&[("A", "1")]);
        let expansion = Interpolator::new(&props).expand_tracked("${A}/${Missing}/x");
        assert_eq!(expansion.text, "1/${Missing}/x");
        assert_eq!(expansion.unresolved, vec!["Missing".to_string()]);
    }

    #[test]
    fn test_substituted_values_are_not_reexpanded() {
        let props = store(&[("Loop", "${Loop}"), ("Other", "${A}")]);
        let interpolator = Interpolator::new(&props);
        assert_eq!(interpolator.expand("${Loop}"), "${Loop}");
        assert_eq!(interpolator.expand("${Other}"), "${A}");
    }

    #[test]
    fn test_expand_is_idempotent_without_placeholders() {
        let props = store(&[("A", "1")]);
        let interpolator = Interpolator::new(&props);
        for text in ["plain", "$A", "{A}", "$ {A}", "", "100% done", "${}"] {
            let once = interpolator.expand(text);
            assert_eq!(interpolator.expand(&once), once);
            assert_eq!(once, text);
        }
    }

    #[test]
    fn test_formatter_codes() {
        let path = "/data/in/roads.geojson";
        assert_eq!(expand_formatter(path, "%f"), path);
        assert_eq!(expand_formatter(path, "%F"), "roads");
        assert_eq!(expand_formatter(path, "%E"), "geojson");
        assert_eq!(expand_formatter(path, "%P"), "/data/in");
        assert_eq!(expand_formatter(path, "%p"), "in");
        assert_eq!(expand_formatter(path, "%p_%F.%E"), "in_roads.geojson");
    }

    #[test]
    fn test_formatter_unknown_codes_unchanged() {
        assert_eq!(expand_formatter("/a/b.txt", "%x"), "%x");
        assert_eq!(expand_formatter("/a/b.txt", "100%"), "100%");
        assert_eq!(expand_formatter("/a/b.txt", "%%F"), "%b");
    }

    #[test]
    fn test_formatter_on_bare_file_name() {
        assert_eq!(expand_formatter("roads", "%F"), "roads");
        assert_eq!(expand_formatter("roads", "%E"), "");
        assert_eq!(expand_formatter("roads", "%p"), "");
    }
}
