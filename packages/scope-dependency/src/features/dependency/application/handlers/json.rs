//! Newtonsoft.Json parsing and navigation over column values

use crate::features::dependency::application::visitor::{BlockVisitor, CallSite};
use crate::features::dependency::domain::{Traceable, TraceableSet};
use crate::shared::models::Variable;

const JSON_CONVERT: &str = "Newtonsoft.Json.JsonConvert";
const JSON_TAG: &str = "Microsoft.DataMap.Common.Tag";
const NO_KEY: &str = "We are expecting a string for a columns but get null";

fn json_tokens_of_columns(tokens: &TraceableSet) -> TraceableSet {
    tokens
        .iter()
        .filter_map(|t| match t {
            Traceable::Column(column) => Some(Traceable::Json(column.clone())),
            _ => None,
        })
        .collect()
}

impl BlockVisitor<'_, '_> {
    pub(crate) fn handle_json_call(&mut self, site: &CallSite<'_>) -> bool {
        let ty = site.declaring_type().clone();
        let full_name = ty.full_name();
        let name = site.name().to_string();
        let Some(source) = site.argument(0) else {
            return false;
        };
        let types = self.scope_types();
        let string_column = format!("{}.StringColumnData", types.namespace());
        let parse = name == "Parse"
            && ["JObject", "JArray", "JToken"]
                .iter()
                .any(|linq| types.is_json_linq(&ty, linq));
        let keyed_lookup = (name == "get_Item" && types.is_json_linq(&ty, "JObject"))
            || (name == "SelectToken" && types.is_json_linq(&ty, "JToken"));
        let token_like = types.is_json_linq(&ty, "JToken") || full_name == string_column;

        if name == "ToString" && source.ty.as_ref().map_or(false, |t| t.full_name().contains("Newtonsoft.Json")) {
            if let Some(result) = site.result {
                self.state.copy_traceables(result, source);
            }
            self.update_pta_for_scope_method(site);
        } else if full_name == JSON_CONVERT {
            match name.as_str() {
                "DeserializeObject" => {
                    // the points-to step already allocated the JSON node
                    let tokens = json_tokens_of_columns(&self.state.get_traceables(source));
                    if let Some(result) = site.result {
                        self.state.assign_traceables(result, tokens);
                    }
                }
                "SerializeObject" => self.add_json_field(site, source, "*"),
                _ => return false,
            }
        } else if parse {
            let tokens = json_tokens_of_columns(&self.state.get_traceables(source));
            if let Some(result) = site.result {
                self.state.assign_traceables(result, tokens);
            }
        } else if keyed_lookup {
            match site.argument(1).and_then(|key| self.literal_of(key)) {
                Some(key) => self.add_json_field(site, source, &key),
                None => self.set_top(site.instruction, NO_KEY),
            }
        } else if token_like {
            match name.as_str() {
                "op_Explicit" | "op_Implicit" => {
                    if let Some(result) = site.result {
                        self.state.copy_traceables(result, source);
                    }
                    self.update_pta_for_scope_method(site);
                }
                "get_Item" => {
                    if let Some(key) = site.argument(1).and_then(|key| self.literal_of(key)) {
                        self.add_json_field(site, source, &key);
                    }
                }
                _ => return false,
            }
        } else if full_name == JSON_TAG {
            let Some(property) = name.strip_prefix("get_") else {
                return false;
            };
            let property = property.to_string();
            self.add_json_field(site, source, &property);
        } else {
            return false;
        }
        true
    }

    /// String value of `key`, from constant propagation or its range
    fn literal_of(&self, key: &Variable) -> Option<String> {
        if let Some(constant) = self.analysis.equalities().and_then(|e| e.string_constant(key)) {
            return Some(constant.to_string());
        }
        let range = self.analysis.range_at(self.node, key);
        if range.is_top() || range.is_bottom() {
            return None;
        }
        range.as_literal().map(str::to_string)
    }

    /// `result = source[key]` on a JSON value
    fn add_json_field(&mut self, site: &CallSite<'_>, source: &Variable, key: &str) {
        let tokens: TraceableSet = self
            .state
            .get_traceables(source)
            .iter()
            .filter_map(Traceable::as_json)
            .map(|json| Traceable::JsonField {
                json,
                key: key.to_string(),
            })
            .collect();
        self.update_pta_for_scope_method(site);
        if let Some(result) = site.result {
            self.state.assign_traceables(result, tokens.clone());
        }
        self.check_failure(site, &tokens);
    }
}
