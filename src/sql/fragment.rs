//! Composable SQL text plus an ordered parameter list.
//!
//! Placeholders (`?`) and parameter slots are tracked structurally: appending
//! a nested fragment inlines both its text and its parameters in order, so no
//! manual re-indexing is ever needed. A fragment is mutable while it is being
//! built and frozen once it is handed to execution.

use std::collections::HashMap;

use crate::sql::lex;
use crate::types::Value;

/// A named placeholder whose value is supplied at bind time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One bound parameter slot: either a literal value fixed at build time or a
/// named placeholder resolved at bind time.
#[derive(Debug, Clone)]
pub enum ParamSlot {
    Value(Value),
    Named(Parameter),
}

#[derive(Debug, Clone, Default)]
pub struct SqlFragment {
    sql: String,
    params: Vec<ParamSlot>,
    frozen: bool,
}

impl SqlFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            frozen: false,
        }
    }

    /// Append raw SQL text.
    pub fn append(&mut self, sql: impl AsRef<str>) -> &mut Self {
        self.assert_unfrozen();
        self.sql.push_str(sql.as_ref());
        self
    }

    /// Append a `?` placeholder and bind `value` to it.
    pub fn append_param(&mut self, value: impl Into<Value>) -> &mut Self {
        self.assert_unfrozen();
        self.sql.push('?');
        self.params.push(ParamSlot::Value(value.into()));
        self
    }

    /// Append a `?` placeholder bound to a named parameter.
    pub fn append_named(&mut self, param: Parameter) -> &mut Self {
        self.assert_unfrozen();
        self.sql.push('?');
        self.params.push(ParamSlot::Named(param));
        self
    }

    /// Bind a value without emitting a placeholder, for text that already
    /// contains its `?`.
    pub fn add_value(&mut self, value: impl Into<Value>) -> &mut Self {
        self.assert_unfrozen();
        self.params.push(ParamSlot::Value(value.into()));
        self
    }

    /// Inline another fragment: its text and its parameters, in order.
    pub fn append_fragment(&mut self, other: &SqlFragment) -> &mut Self {
        self.assert_unfrozen();
        self.sql.push_str(&other.sql);
        self.params.extend(other.params.iter().cloned());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[ParamSlot] {
        &self.params
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Number of `?` placeholders outside literals and comments. Equals
    /// `params().len()` for any well-formed fragment.
    pub fn placeholder_count(&self) -> usize {
        lex::placeholder_positions(&self.sql).len()
    }

    /// Mark the fragment immutable. Called when it is handed to execution;
    /// any later mutation is a programming error and panics.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Resolve the ordered parameter values for execution. Named parameters
    /// missing from `named` bind as SQL NULL rather than being left unbound.
    pub fn resolved_params(&self, named: &HashMap<String, Value>) -> Vec<Value> {
        self.params
            .iter()
            .map(|slot| match slot {
                ParamSlot::Value(v) => v.clone(),
                ParamSlot::Named(p) => named.get(p.name()).cloned().unwrap_or(Value::Null),
            })
            .collect()
    }

    /// Text with parameters inlined, for log output only. Named parameters
    /// render as `:name`.
    pub fn debug_string(&self) -> String {
        let mut slots = self.params.iter();
        lex::replace_placeholders(&self.sql, |_| match slots.next() {
            Some(ParamSlot::Value(v)) => v.to_sql_literal(),
            Some(ParamSlot::Named(p)) => format!(":{}", p.name()),
            None => "?".to_string(),
        })
    }

    fn assert_unfrozen(&self) {
        assert!(!self.frozen, "sql fragment is frozen and cannot be modified");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_params_in_order() {
        let mut frag = SqlFragment::from("SELECT * FROM t WHERE a = ");
        frag.append_param(1).append(" AND b = ").append_param("x");
        assert_eq!(frag.sql(), "SELECT * FROM t WHERE a = ? AND b = ?");
        assert_eq!(frag.params().len(), 2);
        assert_eq!(frag.placeholder_count(), 2);
    }

    #[test]
    fn test_append_fragment_inlines_parameters() {
        let mut inner = SqlFragment::from("b = ");
        inner.append_param(2);

        let mut outer = SqlFragment::from("a = ");
        outer.append_param(1).append(" AND (").append_fragment(&inner).append(")");

        assert_eq!(outer.sql(), "a = ? AND (b = ?)");
        let resolved = outer.resolved_params(&HashMap::new());
        assert_eq!(resolved, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_placeholder_count_ignores_literal_question_marks() {
        let mut frag = SqlFragment::from("SELECT 'what?' WHERE a = ");
        frag.append_param(1);
        assert_eq!(frag.placeholder_count(), 1);
        assert_eq!(frag.params().len(), 1);
    }

    #[test]
    fn test_named_parameter_defaults_to_null() {
        let mut frag = SqlFragment::from("a = ");
        frag.append_named(Parameter::new("userid"));
        let resolved = frag.resolved_params(&HashMap::new());
        assert_eq!(resolved, vec![Value::Null]);

        let mut named = HashMap::new();
        named.insert("userid".to_string(), Value::Int(42));
        assert_eq!(frag.resolved_params(&named), vec![Value::Int(42)]);
    }

    #[test]
    fn test_debug_string_inlines_values() {
        let mut frag = SqlFragment::from("a = ");
        frag.append_param("o'neil")
            .append(" AND b = ")
            .append_named(Parameter::new("n"));
        assert_eq!(frag.debug_string(), "a = 'o''neil' AND b = :n");
    }

    #[test]
    #[should_panic(expected = "frozen")]
    fn test_frozen_fragment_rejects_mutation() {
        let mut frag = SqlFragment::from("SELECT 1");
        frag.freeze();
        frag.append(" WHERE x = 1");
    }

    #[test]
    fn test_frozen_fragment_still_reads() {
        let mut frag = SqlFragment::from("SELECT ");
        frag.append_param(5);
        frag.freeze();
        assert!(frag.is_frozen());
        assert_eq!(frag.sql(), "SELECT ?");
        assert_eq!(frag.resolved_params(&HashMap::new()), vec![Value::Int(5)]);
    }
}
