//! Transfer functions of runtime and framework calls
//!
//! Each handler returns true when it recognised the call. Unrecognised
//! calls fall through to the generic pure/escalation path in `calls.rs`.

mod collection;
mod json;
mod row;
mod schema;

use super::visitor::{BlockVisitor, CallSite};
use crate::features::dependency::domain::TraceableSet;

impl BlockVisitor<'_, '_> {
    /// Runtime calls return objects that only lead back to their arguments
    pub(crate) fn update_pta_for_scope_method(&mut self, site: &CallSite<'_>) {
        self.update_pta_for_pure(site, true);
    }

    /// A runtime call whose result must carry tokens produced none
    pub(crate) fn check_failure(&mut self, site: &CallSite<'_>, tokens: &TraceableSet) {
        if tokens.is_empty() {
            self.fail_or_retry(site.instruction, "We are expecting a traceable and there isn't any");
        }
    }
}
