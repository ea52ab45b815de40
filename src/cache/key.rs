//! Cache keys and invalidation tags

use std::collections::BTreeMap;
use std::fmt;

/// Group label shared by entries that must be invalidated together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    Books,
    Borrows,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Books => "books",
            Tag::Borrows => "borrows",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one cached read: an operation name plus its parameters.
///
/// Parameters are kept sorted so that insertion order never produces two
/// keys for the same request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    operation: &'static str,
    params: BTreeMap<&'static str, String>,
}

impl CacheKey {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: &'static str, value: impl ToString) -> Self {
        self.params.insert(name, value.to_string());
        self
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operation)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            write!(f, "{{{}}}", params.join(","))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_order_does_not_matter() {
        let a = CacheKey::new("list-books").with_param("page", 2).with_param("limit", 10);
        let b = CacheKey::new("list-books").with_param("limit", 10).with_param("page", 2);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "list-books{limit=10,page=2}");
    }

    #[test]
    fn test_distinct_params_are_distinct_keys() {
        let a = CacheKey::new("get-book").with_param("id", "x");
        let b = CacheKey::new("get-book").with_param("id", "y");
        assert_ne!(a, b);
        assert_eq!(a.param("id"), Some("x"));
    }
}
