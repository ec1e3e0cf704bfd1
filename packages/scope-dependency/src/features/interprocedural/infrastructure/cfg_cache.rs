/*
 * Callee body cache
 *
 * LRU cache of analyzable method bodies keyed by signature. Misses go to
 * the ProgramRepository; methods without a body are not cached so a later
 * repository update can still supply them.
 */

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::shared::models::{MethodBody, MethodRef};
use crate::shared::ports::ProgramRepository;

pub struct CfgCache {
    cache: LruCache<String, Arc<MethodBody>>,
    hits: usize,
    misses: usize,
}

impl CfgCache {
    /// A zero capacity is raised to one entry
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Cached body of `method`, loading it from `program` on a miss
    pub fn get_or_load(&mut self, method: &MethodRef, program: &dyn ProgramRepository) -> Option<Arc<MethodBody>> {
        let key = method.signature();
        if let Some(body) = self.cache.get(&key) {
            self.hits += 1;
            return Some(Arc::clone(body));
        }
        self.misses += 1;
        let body = program.method_body(method)?;
        self.cache.put(key, Arc::clone(&body));
        Some(body)
    }

    pub fn contains(&self, method: &MethodRef) -> bool {
        self.cache.contains(&method.signature())
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }
}

impl std::fmt::Debug for CfgCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CfgCache")
            .field("len", &self.cache.len())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::{Cfg, Instruction, TypeRef, Variable};
    use crate::shared::ports::InMemoryProgram;

    fn method(name: &str) -> MethodRef {
        MethodRef::new(TypeRef::class("Demo", "Helper"), name, TypeRef::void())
    }

    fn program() -> InMemoryProgram {
        let x = Variable::local("x", TypeRef::int32());
        let body = MethodBody::new(method("A"), Vec::new(), Cfg::linear(vec![Instruction::ret(0, Some(&x))]));
        InMemoryProgram::new().with_method(body)
    }

    #[test]
    fn test_hits_and_misses() {
        let program = program();
        let mut cache = CfgCache::new(4);

        assert!(cache.get_or_load(&method("A"), &program).is_some());
        assert!(cache.get_or_load(&method("A"), &program).is_some());
        assert!(cache.get_or_load(&method("Missing"), &program).is_none());

        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.len(), 1);
        assert!((cache.hit_rate() - 1.0 / 3.0).abs() < f32::EPSILON);
        assert!(!cache.contains(&method("Missing")));
    }

    #[test]
    fn test_zero_capacity_still_caches() {
        let program = program();
        let mut cache = CfgCache::new(0);
        cache.get_or_load(&method("A"), &program);
        assert!(cache.contains(&method("A")));
    }
}
