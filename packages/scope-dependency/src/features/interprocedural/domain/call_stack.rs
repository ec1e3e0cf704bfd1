//! Stack of methods under analysis

use crate::shared::models::MethodRef;

#[derive(Debug, Clone, Default)]
pub struct CallStack {
    frames: Vec<MethodRef>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, method: MethodRef) {
        self.frames.push(method);
    }

    pub fn pop(&mut self) -> Option<MethodRef> {
        self.frames.pop()
    }

    /// `method` is already being analyzed further up
    pub fn contains(&self, method: &MethodRef) -> bool {
        let signature = method.signature();
        self.frames.iter().any(|m| m.signature() == signature)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::TypeRef;

    #[test]
    fn test_recursion_detection() {
        let a = MethodRef::new(TypeRef::class("Demo", "A"), "Run", TypeRef::void());
        let b = MethodRef::new(TypeRef::class("Demo", "B"), "Run", TypeRef::void());
        let mut stack = CallStack::new();
        stack.push(a.clone());

        assert!(stack.contains(&a));
        assert!(!stack.contains(&b));
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.pop(), Some(a));
        assert!(stack.is_empty());
    }
}
