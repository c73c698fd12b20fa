//! Named user-defined filter expressions: a map from name to expression string.
//! Names are not required to be unique (matching `define-filter` semantics).

use crate::matcher::{Matcher, ParseError};

#[derive(Debug, Clone)]
pub struct NamedFilter {
    pub name: String,
    pub expression: String,
}

#[derive(Default)]
pub struct FilterContainer {
    filters: Vec<NamedFilter>,
}

impl FilterContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, expression: impl Into<String>) {
        self.filters.push(NamedFilter {
            name: name.into(),
            expression: expression.into(),
        });
    }

    pub fn filters(&self) -> &[NamedFilter] {
        &self.filters
    }

    pub fn by_name(&self, name: &str) -> Option<&NamedFilter> {
        self.filters.iter().find(|f| f.name == name)
    }

    pub fn parse_by_name(&self, name: &str) -> Option<Result<Matcher, ParseError>> {
        self.by_name(name).map(|f| Matcher::parse(&f.expression))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_need_not_be_unique() {
        let mut c = FilterContainer::new();
        c.add("dup", "title = \"a\"");
        c.add("dup", "title = \"b\"");
        assert_eq!(c.filters().len(), 2);
    }

    #[test]
    fn by_name_returns_first_match() {
        let mut c = FilterContainer::new();
        c.add("spam", "author = \"Spam\"");
        assert_eq!(c.by_name("spam").unwrap().expression, "author = \"Spam\"");
        assert!(c.by_name("missing").is_none());
    }
}
