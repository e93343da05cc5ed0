//! Query predicates
//!
//! A `Query` records conditions, ordering and a limit. No collection
//! evaluates one yet: `find_by_query` answers `NotImplemented`.

use std::fmt;

use crate::value::Value;

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl Comparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "<>",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Like => "LIKE",
        }
    }
}

/// `attribute <op> value`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub attribute: String,
    pub comparison: Comparison,
    pub value: Value,
}

/// Conjunction of conditions over one type's attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    conditions: Vec<Condition>,
    order_by: Option<(String, bool)>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition; all conditions must hold
    pub fn filter(mut self, attribute: &str, comparison: Comparison, value: Value) -> Self {
        self.conditions.push(Condition {
            attribute: attribute.to_string(),
            comparison,
            value,
        });
        self
    }

    pub fn order_by(mut self, attribute: &str, ascending: bool) -> Self {
        self.order_by = Some((attribute.to_string(), ascending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.order_by.is_none() && self.limit.is_none()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            write!(f, "all")?;
        }
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(
                f,
                "{} {} <{}>",
                condition.attribute,
                condition.comparison.as_str(),
                condition.value.type_label()
            )?;
        }
        if let Some((attribute, ascending)) = &self.order_by {
            write!(f, " ORDER BY {} {}", attribute, if *ascending { "ASC" } else { "DESC" })?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_display() {
        let query = Query::new()
            .filter("title", Comparison::Like, Value::Text("Du%".into()))
            .filter("pages", Comparison::Gt, Value::Long(100))
            .order_by("title", true)
            .limit(5);

        assert_eq!(query.conditions().len(), 2);
        assert_eq!(
            query.to_string(),
            "title LIKE <text> AND pages > <long> ORDER BY title ASC LIMIT 5"
        );
        assert!(Query::new().is_empty());
        assert_eq!(Query::new().to_string(), "all");
    }
}
