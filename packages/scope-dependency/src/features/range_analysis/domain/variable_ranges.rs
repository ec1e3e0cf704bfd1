//! Variable → range map

use rustc_hash::FxHashMap;

use super::range_value::RangeValue;
use crate::shared::models::Variable;

/// Per-program-point range environment. Missing variables are bottom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableRangeDomain {
    ranges: FxHashMap<Variable, RangeValue>,
}

impl VariableRangeDomain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, variable: &Variable) -> RangeValue {
        self.ranges.get(variable).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, variable: &Variable, value: RangeValue) {
        self.ranges.insert(variable.clone(), value);
    }

    /// Join `value` into the current range of `variable`
    pub fn add(&mut self, variable: &Variable, value: RangeValue) {
        let joined = match self.ranges.get(variable) {
            Some(current) => current.join(&value),
            None => value,
        };
        self.ranges.insert(variable.clone(), joined);
    }

    pub fn contains(&self, variable: &Variable) -> bool {
        self.ranges.contains_key(variable)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &RangeValue)> {
        self.ranges.iter()
    }

    /// Pointwise join; keys present on one side only are kept
    pub fn join(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for (variable, value) in &other.ranges {
            result.add(variable, value.clone());
        }
        result
    }

    /// Pointwise widening of `self` against `previous`
    pub fn widen(&self, previous: &Self) -> Self {
        let mut result = previous.clone();
        for (variable, value) in &self.ranges {
            let widened = match previous.ranges.get(variable) {
                Some(prev) => value.widen(prev),
                None => value.clone(),
            };
            result.ranges.insert(variable.clone(), widened);
        }
        result
    }

    /// Every binding of `self` exists in `other` and is contained in it
    pub fn less_equal(&self, other: &Self) -> bool {
        self.ranges.iter().all(|(variable, value)| {
            other
                .ranges
                .get(variable)
                .map_or(false, |o| value.less_equal(o))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::TypeRef;

    fn var(name: &str) -> Variable {
        Variable::local(name, TypeRef::int32())
    }

    #[test]
    fn test_missing_is_bottom() {
        let domain = VariableRangeDomain::new();
        assert!(domain.get(&var("x")).is_bottom());
    }

    #[test]
    fn test_join_keeps_one_sided_keys() {
        let mut left = VariableRangeDomain::new();
        left.set(&var("x"), RangeValue::singleton(1));
        let mut right = VariableRangeDomain::new();
        right.set(&var("x"), RangeValue::singleton(3));
        right.set(&var("y"), RangeValue::literal("a"));

        let joined = left.join(&right);
        assert_eq!(joined.get(&var("x")), RangeValue::interval(1, 3));
        assert_eq!(joined.get(&var("y")), RangeValue::literal("a"));
        assert!(left.less_equal(&joined));
        assert!(right.less_equal(&joined));
        assert!(!joined.less_equal(&left));
    }

    #[test]
    fn test_widen_pointwise() {
        let mut prev = VariableRangeDomain::new();
        prev.set(&var("i"), RangeValue::interval(0, 1));
        let mut next = VariableRangeDomain::new();
        next.set(&var("i"), RangeValue::interval(0, 2));
        let widened = next.widen(&prev);
        assert_eq!(widened.get(&var("i")).upper_bound(), Some(RangeValue::MAX));
    }
}
