//! In-memory message catalog.

use crate::services::MessageLookup;
use ahash::AHashMap;

/// Display strings keyed by message ID.
///
/// Missing keys resolve to the key itself. Formatting replaces each `{}` with
/// the next argument and turns `%%` into `%`.
#[derive(Debug, Clone, Default)]
pub struct MessageCatalog {
    strings: AHashMap<String, String>,
}

impl MessageCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a translation.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.strings.insert(key.into(), value.into());
    }

    /// Adds a translation, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }
}

impl MessageLookup for MessageCatalog {
    fn get(&self, key: &str) -> String {
        self.strings
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
            .replace("%%", "%")
    }

    fn format(&self, key: &str, args: &[&str]) -> String {
        let template = self.strings.get(key).map_or(key, String::as_str);
        let mut out = String::with_capacity(template.len());
        let mut args = args.iter();
        let mut rest = template;
        while let Some(at) = rest.find("{}") {
            out.push_str(&rest[..at]);
            out.push_str(args.next().copied().unwrap_or(""));
            rest = &rest[at + 2..];
        }
        out.push_str(rest);
        out.replace("%%", "%")
    }
}
