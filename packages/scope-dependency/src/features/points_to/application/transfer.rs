//! Points-to transfer functions
//!
//! One [`PointsToTransfer`] per analyzed method. It builds the initial
//! graph, applies single instructions, and exposes the collection
//! summaries the dependency analysis uses for `Add`/`get_Item`/
//! `GetEnumerator`/`get_Current`.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::features::points_to::domain::{
    array_field, collection_field, item_field, NodeKind, NodeSet, PointsToGraph, PtgId, PtgNode,
};
use crate::shared::models::{
    Cfg, FieldRef, Instruction, InstructionKind, MethodBody, MethodRef, Operand, Place, TypeRef, Variable,
};

/// Secondary slot of the collection node created by `GetEnumerator`
const COLLECTION_SLOT: u32 = 1;

pub struct PointsToTransfer {
    method: MethodRef,
    parameters: Vec<Variable>,
    return_variable: Variable,
    analyze_next_delegate_ctor: bool,
    /// Address loads (`t = &x`, `t = &o.f`) awaiting an `initobj t`
    address_map: FxHashMap<Variable, Operand>,
}

impl PointsToTransfer {
    pub fn new(body: &MethodBody) -> Self {
        Self {
            method: body.method.clone(),
            parameters: body.parameters.clone(),
            return_variable: Variable::return_value(&body.method.name),
            analyze_next_delegate_ctor: false,
            address_map: FxHashMap::default(),
        }
    }

    pub fn method(&self) -> &MethodRef {
        &self.method
    }

    pub fn parameters(&self) -> &[Variable] {
        &self.parameters
    }

    pub fn return_variable(&self) -> &Variable {
        &self.return_variable
    }

    /// Forget per-block state before visiting a new block
    pub fn reset(&mut self) {
        self.analyze_next_delegate_ctor = false;
        self.address_map.clear();
    }

    fn site(&self, offset: u32) -> PtgId {
        PtgId::at(&self.method, i64::from(offset))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Initial graph
    // ═══════════════════════════════════════════════════════════════════

    /// Entry graph of the method. Without a `base` graph every reference
    /// parameter gets its own parameter node; with one (callee frames) the
    /// parameters are already bound by the caller.
    pub fn initial_graph(&self, cfg: &Cfg, base: Option<&PointsToGraph>) -> PointsToGraph {
        let create_parameter_nodes = base.is_none();
        let mut ptg = base.cloned().unwrap_or_default();

        let parameter_names: FxHashSet<&str> = self.parameters.iter().map(|p| p.name.as_str()).collect();
        let mut counter: i64 = -1;

        for parameter in &self.parameters {
            let Some(ty) = parameter.ty.as_ref() else {
                continue;
            };
            if !ty.is_class_or_struct() {
                continue;
            }
            if create_parameter_nodes {
                let id = PtgId::at(&self.method, counter);
                counter -= 1;
                ptg.points_to_node(parameter, PtgNode::parameter(id, &parameter.name, ty.clone()));
            }
            ptg.add_root(parameter);
        }

        for variable in cfg.variables() {
            if parameter_names.contains(variable.name.as_str()) {
                continue;
            }
            let Some(ty) = variable.ty.as_ref() else {
                continue;
            };
            if !ty.is_class_or_struct() {
                continue;
            }
            ptg.points_to(&variable, &PtgId::null());
        }

        ptg.add_root(&self.return_variable);
        let global = ptg.add_node(PtgNode::global());
        ptg.points_to(&Variable::global(), &global);
        ptg
    }

    // ═══════════════════════════════════════════════════════════════════
    // Instructions
    // ═══════════════════════════════════════════════════════════════════

    pub fn apply(&mut self, ptg: &mut PointsToGraph, instruction: &Instruction) {
        let offset = instruction.offset;
        match &instruction.kind {
            InstructionKind::Load { result, operand } => {
                self.load_operand(ptg, offset, result, operand);
                match operand {
                    Operand::Reference(inner) => {
                        self.load_operand(ptg, offset, result, inner);
                        self.address_map.insert(result.clone(), (**inner).clone());
                    }
                    Operand::Dereference(reference) => {
                        self.process_copy(ptg, result, std::slice::from_ref(reference));
                    }
                    _ => {}
                }
            }
            InstructionKind::Store { target, value } => match target {
                Place::InstanceField { instance, field } => {
                    self.process_store(ptg, offset, instance, field, value);
                }
                Place::StaticField(field) => {
                    self.process_store(ptg, offset, &Variable::global(), field, value);
                }
                Place::ArrayElement { array, .. } => {
                    self.process_store(ptg, offset, array, &array_field(), value);
                }
                Place::Dereference(_) => {}
            },
            InstructionKind::CreateObject { result, allocation_type } => {
                if allocation_type.is_delegate() {
                    self.analyze_next_delegate_ctor = true;
                }
                self.process_allocation(ptg, offset, result, Some(allocation_type));
            }
            InstructionKind::CreateArray { result, .. } => {
                self.process_allocation(ptg, offset, result, result.ty.as_ref());
            }
            InstructionKind::InitializeObject { target } => {
                self.process_allocation(ptg, offset, target, target.ty.as_ref());
                match self.address_map.get(target).cloned() {
                    Some(Operand::Variable(v)) => self.process_copy(ptg, &v, std::slice::from_ref(target)),
                    Some(Operand::InstanceField { instance, field }) => {
                        self.process_store(ptg, offset, &instance, &field, target)
                    }
                    _ => {}
                }
            }
            InstructionKind::Convert { result, operand, .. } => {
                self.process_copy(ptg, result, std::slice::from_ref(operand));
            }
            InstructionKind::Call { result, method, arguments } => {
                if method.is_constructor() && self.analyze_next_delegate_ctor {
                    self.process_delegate_ctor(ptg, arguments);
                    self.analyze_next_delegate_ctor = false;
                }
                if method.containing_type.name.contains("JsonConvert") && method.name == "DeserializeObject" {
                    if let Some(result) = result {
                        self.process_json_alloc(ptg, offset, result);
                    }
                }
            }
            InstructionKind::Phi { result, arguments } => {
                self.process_copy(ptg, result, arguments);
            }
            InstructionKind::Return { operand: Some(operand) } => {
                let rv = self.return_variable.clone();
                self.process_copy(ptg, &rv, std::slice::from_ref(operand));
            }
            _ => {}
        }
    }

    fn load_operand(&mut self, ptg: &mut PointsToGraph, offset: u32, result: &Variable, operand: &Operand) {
        match operand {
            Operand::Constant { value, .. } if value.is_null() => self.process_null(ptg, result),
            Operand::Variable(source) => self.process_copy(ptg, result, std::slice::from_ref(source)),
            Operand::InstanceField { instance, field } => {
                self.process_load(ptg, offset, result, instance, field);
            }
            Operand::StaticField(field) => {
                self.process_load(ptg, offset, result, &Variable::global(), field);
            }
            Operand::ArrayElement { array, .. } => {
                self.process_load(ptg, offset, result, array, &array_field());
            }
            Operand::VirtualMethod { instance, method } => {
                self.process_delegate_addr(ptg, offset, result, method, Some(instance));
            }
            Operand::StaticMethod(method) => {
                self.process_delegate_addr(ptg, offset, result, method, None);
            }
            _ => {}
        }
    }

    pub fn process_null(&self, ptg: &mut PointsToGraph, dst: &Variable) {
        ptg.remove_root_edges(dst);
        if !dst.is_reference() {
            return;
        }
        ptg.points_to(dst, &PtgId::null());
    }

    pub fn process_allocation(&self, ptg: &mut PointsToGraph, offset: u32, dst: &Variable, ty: Option<&TypeRef>) {
        ptg.remove_root_edges(dst);
        if !dst.is_reference() {
            return;
        }
        let node = PtgNode::object(self.site(offset), ty.cloned().or_else(|| dst.ty.clone()));
        ptg.points_to_node(dst, node);
    }

    pub fn process_json_alloc(&self, ptg: &mut PointsToGraph, offset: u32, dst: &Variable) {
        ptg.remove_root_edges(dst);
        if !dst.is_reference() {
            return;
        }
        let node = PtgNode::new(self.site(offset), NodeKind::Json, dst.ty.clone());
        ptg.points_to_node(dst, node);
    }

    /// `dst` points to the union of the reference-typed sources' targets
    pub fn process_copy(&self, ptg: &mut PointsToGraph, dst: &Variable, sources: &[Variable]) {
        let targets: NodeSet = sources
            .iter()
            .filter(|s| s.is_reference())
            .flat_map(|s| ptg.targets(s))
            .collect();
        ptg.remove_root_edges(dst);
        if !dst.is_reference() {
            return;
        }
        ptg.points_to_all(dst, targets.iter());
    }

    pub fn process_load(
        &self,
        ptg: &mut PointsToGraph,
        offset: u32,
        dst: &Variable,
        instance: &Variable,
        field: &FieldRef,
    ) {
        if !dst.is_reference() || !field.is_reference() || !instance.is_reference() {
            return;
        }

        let nodes = ptg.targets(instance);
        ptg.remove_root_edges(dst);
        ptg.add_root(dst);

        for node in &nodes {
            let mut targets = ptg.targets_of_field(node, field);
            if targets.is_empty() {
                if self.may_reachable_from_parameter(ptg, node) {
                    let unknown = PtgNode::new(self.site(offset), NodeKind::Unknown, dst.ty.clone());
                    let id = ptg.add_node(unknown);
                    ptg.points_to_field(node, field, &id);
                    targets.insert(id);
                } else if field.name == crate::features::points_to::domain::ARRAY_FIELD {
                    targets.extend(nodes.iter().cloned());
                }
            }
            ptg.points_to_all(dst, targets.iter());
        }
    }

    pub fn process_store(
        &self,
        ptg: &mut PointsToGraph,
        offset: u32,
        instance: &Variable,
        field: &FieldRef,
        src: &Variable,
    ) {
        if !field.is_reference() || !src.is_reference() {
            return;
        }
        let nodes = ptg.targets(instance);
        let targets = ptg.non_null_targets(src);

        if targets.is_empty() {
            // placeholder for a value nobody allocated here
            let fake = ptg.add_node(PtgNode::object(self.site(offset), src.ty.clone()));
            for node in &nodes {
                ptg.points_to_field(node, field, &fake);
            }
        } else {
            for node in &nodes {
                for target in &targets {
                    ptg.points_to_field(node, field, target);
                }
            }
        }
    }

    pub fn process_delegate_addr(
        &self,
        ptg: &mut PointsToGraph,
        offset: u32,
        dst: &Variable,
        method: &MethodRef,
        instance: Option<&Variable>,
    ) {
        let node = PtgNode::delegate(self.site(offset), method.clone(), instance.cloned());
        ptg.remove_root_edges(dst);
        ptg.points_to_node(dst, node);
    }

    /// `new D(instance?, &method)`: the delegate object takes over the
    /// delegate nodes of the function pointer argument
    fn process_delegate_ctor(&self, ptg: &mut PointsToGraph, arguments: &[Variable]) {
        let Some(delegate) = arguments.first() else {
            return;
        };
        if !delegate.ty.as_ref().map_or(false, |t| t.is_delegate()) {
            return;
        }
        ptg.remove_root_edges(delegate);

        let (pointer, instance) = if arguments.len() == 3 {
            (&arguments[2], Some(&arguments[1]))
        } else if arguments.len() == 2 {
            (&arguments[1], None)
        } else {
            return;
        };

        let delegate_nodes: Vec<PtgId> = ptg
            .targets_of_kind(pointer, NodeKind::Delegate)
            .into_iter()
            .map(|n| n.id.clone())
            .collect();
        for id in delegate_nodes {
            if let Some(instance) = instance {
                if let Some(target) = ptg.node_mut(&id).and_then(|n| n.delegate.as_mut()) {
                    target.instance = Some(instance.clone());
                }
            }
            ptg.points_to(delegate, &id);
        }
    }

    /// Reachable from a parameter or from the global node
    fn may_reachable_from_parameter(&self, ptg: &PointsToGraph, node: &PtgId) -> bool {
        let mut roots: Vec<PtgId> = self.parameters.iter().flat_map(|p| ptg.targets(p)).collect();
        roots.push(PtgId::global());
        ptg.reachable_nodes(roots.iter(), None::<fn(&PtgId, &FieldRef) -> bool>)
            .contains(node)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Collection summaries
    // ═══════════════════════════════════════════════════════════════════

    pub fn create_collection_summary(&self, ptg: &mut PointsToGraph, offset: u32, collection: &Variable) -> PtgId {
        ptg.add_node(PtgNode::object(self.site(offset), collection.ty.clone()))
    }

    pub fn add_item(&self, ptg: &mut PointsToGraph, offset: u32, collection: &Variable, item: &Variable) -> FieldRef {
        let field = item_field();
        self.process_store(ptg, offset, collection, &field, item);
        field
    }

    pub fn get_item(&self, ptg: &mut PointsToGraph, offset: u32, collection: &Variable, result: &Variable) -> FieldRef {
        let field = item_field();
        self.process_load(ptg, offset, result, collection, &field);
        field
    }

    /// `result = collection.GetEnumerator()`
    pub fn process_get_enumerator(
        &self,
        ptg: &mut PointsToGraph,
        offset: u32,
        collection: &Variable,
        result: &Variable,
    ) -> PtgId {
        let enumerator_ty = TypeRef::interface("System.Collections", "IEnumerator");
        let enumerator = PtgNode::object(self.site(offset), Some(enumerator_ty));
        ptg.remove_root_edges(result);
        let enum_id = ptg.points_to_node(result, enumerator);

        let nodes = ptg.targets(collection);
        if nodes.len() == 1 && nodes.contains(&PtgId::null()) {
            let summary = PtgNode::object(self.site(offset).with_slot(COLLECTION_SLOT), collection.ty.clone());
            ptg.points_to_node(collection, summary);
        }

        self.process_store(ptg, offset, result, &collection_field(), collection);
        enum_id
    }

    /// `result = enumerator.get_Current()`. Returns the item nodes and
    /// whether they had to be created.
    pub fn process_get_current(
        &self,
        ptg: &mut PointsToGraph,
        offset: u32,
        enumerator: &Variable,
        result: &Variable,
    ) -> (NodeSet, bool) {
        let mut created = false;
        let mut targets = NodeSet::new();
        let collections = ptg.variable_field_targets(enumerator, &collection_field());

        if !collections.is_empty() {
            let items = item_field();
            for collection in &collections {
                targets.extend(ptg.targets_of_field(collection, &items));
            }
            if targets.is_empty() {
                for collection in &collections {
                    let item = PtgNode::object(self.site(offset), result.ty.clone());
                    let id = ptg.add_node(item);
                    ptg.points_to_field(collection, &items, &id);
                    targets.insert(id);
                    created = true;
                }
            }
        }

        ptg.remove_root_edges(result);
        ptg.points_to_all(result, targets.iter());
        (targets, created)
    }
}
