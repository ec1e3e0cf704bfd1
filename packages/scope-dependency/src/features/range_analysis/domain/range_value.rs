//! Interval / string-literal abstract value
//!
//! Integers are abstracted by closed intervals, strings by a single
//! literal. `join` is the least upper bound; `widen` is kept separate and
//! pushes bounds that grew since the previous iteration to infinity.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const STRING_TOP: &str = "_STRING_TOP_";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RangeValue {
    /// Empty interval / unknown string
    Bottom,
    /// Closed integer interval, `lo <= hi`
    Interval { lo: i64, hi: i64 },
    /// Exactly one string literal
    Literal(String),
    /// Some string
    StringTop,
}

impl Default for RangeValue {
    fn default() -> Self {
        RangeValue::Bottom
    }
}

impl RangeValue {
    pub const MIN: i64 = i64::MIN;
    pub const MAX: i64 = i64::MAX;

    pub fn top() -> Self {
        RangeValue::Interval {
            lo: Self::MIN,
            hi: Self::MAX,
        }
    }

    pub fn bottom() -> Self {
        RangeValue::Bottom
    }

    pub fn singleton(value: i64) -> Self {
        RangeValue::Interval { lo: value, hi: value }
    }

    /// Interval `[lo, hi]`; an inverted pair is empty
    pub fn interval(lo: i64, hi: i64) -> Self {
        if lo > hi {
            RangeValue::Bottom
        } else {
            RangeValue::Interval { lo, hi }
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        RangeValue::Literal(value.into())
    }

    pub fn is_top(&self) -> bool {
        matches!(self, RangeValue::Interval { lo, hi } if *lo == Self::MIN && *hi == Self::MAX)
            || matches!(self, RangeValue::StringTop)
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, RangeValue::Bottom)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, RangeValue::Literal(_) | RangeValue::StringTop)
    }

    pub fn lower_bound(&self) -> Option<i64> {
        match self {
            RangeValue::Interval { lo, .. } => Some(*lo),
            _ => None,
        }
    }

    pub fn upper_bound(&self) -> Option<i64> {
        match self {
            RangeValue::Interval { hi, .. } => Some(*hi),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            RangeValue::Literal(s) => Some(s),
            _ => None,
        }
    }

    /// Least upper bound
    pub fn join(&self, other: &RangeValue) -> RangeValue {
        use RangeValue::*;
        match (self, other) {
            (Bottom, x) | (x, Bottom) => x.clone(),
            (Interval { lo: a, hi: b }, Interval { lo: c, hi: d }) => Interval {
                lo: (*a).min(*c),
                hi: (*b).max(*d),
            },
            (Literal(a), Literal(b)) if a == b => Literal(a.clone()),
            (Literal(_) | StringTop, Literal(_) | StringTop) => StringTop,
            // mixing numbers and strings loses everything
            _ => Self::top(),
        }
    }

    /// Widen `self` (the new value) against the previous iteration
    pub fn widen(&self, previous: &RangeValue) -> RangeValue {
        use RangeValue::*;
        match (self, previous) {
            (Bottom, prev) => prev.clone(),
            (next, Bottom) => next.clone(),
            (Interval { lo, hi }, Interval { lo: plo, hi: phi }) => Interval {
                lo: if lo < plo { Self::MIN } else { *plo },
                hi: if hi > phi { Self::MAX } else { *phi },
            },
            (Literal(a), Literal(b)) if a == b => Literal(a.clone()),
            (Literal(_) | StringTop, Literal(_) | StringTop) => StringTop,
            _ => Self::top(),
        }
    }

    /// Containment order
    pub fn less_equal(&self, other: &RangeValue) -> bool {
        use RangeValue::*;
        match (self, other) {
            (Bottom, _) => true,
            (_, Bottom) => false,
            (_, other) if other.is_top() && !matches!(other, StringTop) => true,
            (Interval { lo, hi }, Interval { lo: olo, hi: ohi }) => lo >= olo && hi <= ohi,
            (Literal(a), Literal(b)) => a == b,
            (Literal(_) | StringTop, StringTop) => true,
            _ => false,
        }
    }

    /// Interval addition; strings are left unchanged
    pub fn add(&self, other: &RangeValue) -> RangeValue {
        self.arithmetic(other, |lo, hi, olo, ohi| {
            (lo.saturating_add(olo), hi.saturating_add(ohi))
        })
    }

    /// Interval subtraction `[a - d, b - c]`
    pub fn sub(&self, other: &RangeValue) -> RangeValue {
        self.arithmetic(other, |lo, hi, olo, ohi| {
            (lo.saturating_sub(ohi), hi.saturating_sub(olo))
        })
    }

    fn arithmetic(&self, other: &RangeValue, op: impl Fn(i64, i64, i64, i64) -> (i64, i64)) -> RangeValue {
        use RangeValue::*;
        if self.is_string() {
            return self.clone();
        }
        match (self, other) {
            (Bottom, _) | (_, Bottom) => Bottom,
            (a, b) if a.is_top() || b.is_top() => Self::top(),
            (Interval { lo, hi }, Interval { lo: olo, hi: ohi }) => {
                let (l, h) = op(*lo, *hi, *olo, *ohi);
                Self::interval(l, h)
            }
            _ => Self::top(),
        }
    }
}

impl fmt::Display for RangeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeValue::Bottom => write!(f, "_BOTTOM_"),
            _ if self.is_top() && !self.is_string() => write!(f, "_TOP_"),
            RangeValue::Interval { lo, hi } if lo == hi => write!(f, "{}", lo),
            RangeValue::Interval { lo, hi } => write!(f, "[{}..{}]", lo, hi),
            RangeValue::Literal(s) => write!(f, "'{}", s),
            RangeValue::StringTop => write!(f, "'{}", STRING_TOP),
        }
    }
}
