//! Framework collections, enumerators and LINQ
//!
//! Elements live behind the summary `$item` field of the collection
//! object; an enumerator reaches its collection through `$collection`.

use crate::features::dependency::application::visitor::{BlockVisitor, CallSite};
use crate::features::dependency::domain::{Traceable, TraceableSet};
use crate::shared::models::Variable;

const PURE_COLLECTION_METHODS: &[&str] = &["Contains", "ContainsKey", "Count", "get_Count", "First"];
const PURE_ENUMERATION_METHODS: &[&str] = &["Select", "Where", "Any", "Count", "GroupBy", "Max", "Min", "First", "ToList"];

impl BlockVisitor<'_, '_> {
    pub(crate) fn handle_collection_call(&mut self, site: &CallSite<'_>) -> bool {
        let ty = site.declaring_type().clone();
        let name = site.name().to_string();
        let offset = site.instruction.offset;

        let types = self.scope_types();
        let container = types.is_container(&ty);
        let dictionary = types.is_dictionary(&ty);
        let enumerable = types.is_ienumerable(&ty) || types.is_enumerable(&ty);
        let enumerator = types.is_ienumerator(&ty) || types.is_enumerator(&ty);
        let linq = types.is_enumerable(&ty);

        let (Some(receiver), result) = (site.argument(0), site.result) else {
            return false;
        };

        if site.method.is_constructor() && types.is_collection(&ty) {
            self.analysis
                .transfer
                .create_collection_summary(&mut self.state.ptg, offset, receiver);
        } else if name == "GetEnumerator" && enumerable {
            let tokens = self.state.get_traceables(receiver);
            if let Some(result) = result {
                self.analysis
                    .transfer
                    .process_get_enumerator(&mut self.state.ptg, offset, receiver, result);
                self.state.assign_traceables(result, tokens);
            }
        } else if name == "get_Current" && enumerator {
            let tokens: TraceableSet = self
                .state
                .get_traceables(receiver)
                .into_iter()
                .map(|t| match t {
                    Traceable::Json(column) => Traceable::JsonCollectionElement(column),
                    other => other,
                })
                .collect();
            if let Some(result) = result {
                let (_, created) = self
                    .analysis
                    .transfer
                    .process_get_current(&mut self.state.ptg, offset, receiver, result);
                if created {
                    self.state.assign_traceables(result, tokens);
                } else {
                    self.state.add_traceables(result, &tokens);
                }
            }
        } else if name == "set_Item" && container {
            if let Some(item) = site.argument(2) {
                self.propagate_arguments(site, receiver);
                self.store_item(offset, receiver, item);
            }
        } else if matches!(name.as_str(), "get_Values" | "get_Keys") && dictionary {
            let tokens = self.state.get_traceables(receiver);
            if let Some(result) = result {
                self.analysis
                    .transfer
                    .process_copy(&mut self.state.ptg, result, std::slice::from_ref(receiver));
                self.state.assign_traceables(result, tokens);
            }
        } else if name.starts_with("Add") && container {
            self.propagate_arguments(site, receiver);
            let item = if dictionary { site.argument(2) } else { site.argument(1) };
            if let Some(item) = item {
                self.store_item(offset, receiver, item);
            }
        } else if name == "get_Item" && container {
            if dictionary {
                self.dictionary_item(site, receiver);
            } else {
                self.update_call(site);
            }
        } else if name == "MoveNext" && enumerator {
            let tokens = self.state.get_traceables(receiver);
            self.update_call(site);
            if let Some(result) = result {
                self.state.assign_traceables(result, tokens);
            }
        } else if name == "Any"
            || (PURE_COLLECTION_METHODS.contains(&name.as_str()) && container)
            || (PURE_ENUMERATION_METHODS.contains(&name.as_str()) && linq)
        {
            self.update_call(site);
        } else {
            return false;
        }
        true
    }

    /// `receiver.Add(item)` / `receiver[k] = item`
    fn store_item(&mut self, offset: u32, receiver: &Variable, item: &Variable) {
        let tokens = self.state.get_traceables(item);
        let field = self
            .analysis
            .transfer
            .add_item(&mut self.state.ptg, offset, receiver, item);
        self.state.add_heap_traceables(receiver, &field, &tokens);
        self.state.add_traceables(receiver, &tokens);
    }

    /// `result = dictionary[key]`
    fn dictionary_item(&mut self, site: &CallSite<'_>, receiver: &Variable) {
        let Some(result) = site.result else {
            return;
        };
        let holds_json = self.state.get_traceables(receiver).iter().any(Traceable::is_json);
        if holds_json {
            let literal = site.argument(1).and_then(|key| {
                let range = self.analysis.range_at(self.node, key);
                range.as_literal().filter(|_| !range.is_top()).map(str::to_string)
            });
            if let Some(literal) = literal {
                let key = format!("[{}]", literal);
                let tokens: TraceableSet = self
                    .state
                    .get_traceables(receiver)
                    .iter()
                    .filter_map(Traceable::as_json)
                    .map(|json| Traceable::JsonField { json, key: key.clone() })
                    .collect();
                self.update_pta_for_scope_method(site);
                self.state.assign_traceables(result, tokens.clone());
                self.check_failure(site, &tokens);
            }
        }

        let field = self
            .analysis
            .transfer
            .get_item(&mut self.state.ptg, site.instruction.offset, receiver, result);
        let tokens = self.state.get_heap_traceables(receiver, &field);
        self.state.add_traceables(result, &tokens);
    }
}
