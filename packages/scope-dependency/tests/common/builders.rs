//! Test data builders
//!
//! A processor is assembled the way the compiler lays it out: a `Process`
//! entry method storing its tables into a generated iterator, a
//! `GetEnumerator` returning the iterator, and a `MoveNext` body built with
//! [`MoveNextBuilder`].

use scope_dependency::shared::models::{Cfg, FieldRef, Instruction, MethodBody, MethodRef, Operand, TypeRef, Variable};
use scope_dependency::shared::models::cfg::{ENTRY, EXIT};
use scope_dependency::{InMemoryProgram, ProcessorInfo, Schema};

pub const RUNTIME: &str = "ScopeRuntime";

// ═══════════════════════════════════════════════════════════════════════════
// Types and fields
// ═══════════════════════════════════════════════════════════════════════════

pub fn processor_type() -> TypeRef {
    TypeRef::class("Demo", "Proc")
}

pub fn iterator_type() -> TypeRef {
    TypeRef::class("Demo", "<Process>d__0")
        .compiler_generated()
        .nested_in(processor_type())
}

pub fn row_type() -> TypeRef {
    TypeRef::class(RUNTIME, "Row")
}

pub fn row_set_type() -> TypeRef {
    TypeRef::class(RUNTIME, "RowSet")
}

pub fn column_data_type() -> TypeRef {
    TypeRef::class(RUNTIME, "ColumnData")
}

pub fn schema_type() -> TypeRef {
    TypeRef::class(RUNTIME, "Schema")
}

pub fn scope_map_type() -> TypeRef {
    TypeRef::class(RUNTIME, "ScopeMap")
}

pub fn enumerable_of(element: TypeRef) -> TypeRef {
    TypeRef::interface("System.Collections.Generic", "IEnumerable").with_generic_args(vec![element])
}

pub fn enumerator_of(element: TypeRef) -> TypeRef {
    TypeRef::interface("System.Collections.Generic", "IEnumerator").with_generic_args(vec![element])
}

pub fn list_of(element: TypeRef) -> TypeRef {
    TypeRef::class("System.Collections.Generic", "List").with_generic_args(vec![element])
}

pub fn dictionary_of(key: TypeRef, value: TypeRef) -> TypeRef {
    TypeRef::class("System.Collections.Generic", "Dictionary").with_generic_args(vec![key, value])
}

/// `JObject`, `JArray` or `JToken`
pub fn json_type(name: &str) -> TypeRef {
    TypeRef::class("Newtonsoft.Json.Linq", name)
}

pub fn json_convert_type() -> TypeRef {
    TypeRef::class("Newtonsoft.Json", "JsonConvert")
}

pub fn rows_type() -> TypeRef {
    enumerable_of(row_type())
}

pub fn row_enumerator_type() -> TypeRef {
    enumerator_of(row_type())
}

pub fn input_field() -> FieldRef {
    FieldRef::new("<>3__input", row_set_type(), iterator_type())
}

pub fn output_field() -> FieldRef {
    FieldRef::new("<>3__output", row_type(), iterator_type())
}

pub fn current_field() -> FieldRef {
    FieldRef::new("<>2__current", row_type(), iterator_type())
}

/// Static `Demo.<class>.<name>(String) : String`
pub fn static_string_method(class: &str, name: &str) -> MethodRef {
    MethodRef::new(TypeRef::class("Demo", class), name, TypeRef::string())
        .with_params(vec![TypeRef::string()])
        .as_static()
}

// ═══════════════════════════════════════════════════════════════════════════
// MoveNext
// ═══════════════════════════════════════════════════════════════════════════

/// Builder for the instructions of a `MoveNext` body
#[derive(Debug)]
pub struct MoveNextBuilder {
    this: Variable,
    blocks: Vec<Vec<Instruction>>,
    offset: u32,
    counter: usize,
}

impl Default for MoveNextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MoveNextBuilder {
    pub fn new() -> Self {
        Self {
            this: Variable::this(iterator_type()),
            blocks: vec![Vec::new()],
            offset: 0,
            counter: 0,
        }
    }

    pub fn this(&self) -> &Variable {
        &self.this
    }

    /// Fresh local of type `ty`
    pub fn local(&mut self, prefix: &str, ty: TypeRef) -> Variable {
        self.counter += 1;
        Variable::local(format!("{}_{}", prefix, self.counter), ty)
    }

    pub fn push(&mut self, build: impl FnOnce(u32) -> Instruction) -> &mut Self {
        let instruction = build(self.offset);
        self.offset += 1;
        if let Some(block) = self.blocks.last_mut() {
            block.push(instruction);
        }
        self
    }

    /// Start a new basic block
    pub fn split(&mut self) -> &mut Self {
        self.blocks.push(Vec::new());
        self
    }

    /// `input.get_Rows().GetEnumerator()`, advanced once; returns the row
    pub fn read_input_row(&mut self) -> Variable {
        let this = self.this.clone();
        let input = self.local("input", row_set_type());
        let rows = self.local("rows", rows_type());
        let enumerator = self.local("e", row_enumerator_type());
        let has = self.local("has", TypeRef::boolean());
        let row = self.local("row", row_type());

        self.push(|o| Instruction::load(o, &input, Operand::field(&this, input_field())));
        self.push(|o| {
            Instruction::call(
                o,
                Some(&rows),
                MethodRef::new(row_set_type(), "get_Rows", rows_type()),
                &[&input],
            )
        });
        self.push(|o| {
            Instruction::call(
                o,
                Some(&enumerator),
                MethodRef::new(rows_type(), "GetEnumerator", row_enumerator_type()),
                &[&rows],
            )
        });
        self.push(|o| {
            Instruction::call(
                o,
                Some(&has),
                MethodRef::new(row_enumerator_type(), "MoveNext", TypeRef::boolean()),
                &[&enumerator],
            )
        });
        self.push(|o| {
            Instruction::call(
                o,
                Some(&row),
                MethodRef::new(row_enumerator_type(), "get_Current", row_type()),
                &[&enumerator],
            )
        });
        row
    }

    /// The output row held by the iterator
    pub fn output_row(&mut self) -> Variable {
        let this = self.this.clone();
        let output = self.local("out", row_type());
        self.push(|o| Instruction::load(o, &output, Operand::field(&this, output_field())));
        output
    }

    /// String constant in a fresh local
    pub fn literal(&mut self, value: &str) -> Variable {
        let local = self.local("lit", TypeRef::string());
        let literal = value.to_string();
        self.push(|o| Instruction::load(o, &local, Operand::string(literal)));
        local
    }

    /// Integer constant in a fresh local
    pub fn index(&mut self, value: i64) -> Variable {
        let local = self.local("i", TypeRef::int32());
        self.push(|o| Instruction::load(o, &local, Operand::int(value)));
        local
    }

    /// String the iterator captured from `Process`; its value is unknown here
    pub fn captured_string(&mut self, name: &str) -> Variable {
        let this = self.this.clone();
        let local = self.local("cap", TypeRef::string());
        let field = FieldRef::new(format!("<>3__{}", name), TypeRef::string(), iterator_type());
        self.push(|o| Instruction::load(o, &local, Operand::field(&this, field)));
        local
    }

    /// `new T()`
    pub fn create(&mut self, ty: TypeRef) -> Variable {
        let object = self.local("obj", ty.clone());
        self.push(|o| Instruction::create_object(o, &object, ty.clone()));
        self.push(|o| Instruction::call(o, None, MethodRef::constructor(ty), &[&object]));
        object
    }

    /// `row["name"]`
    pub fn column(&mut self, row: &Variable, name: &str) -> Variable {
        let selector = self.literal(name);
        let data = self.local("cd", column_data_type());
        self.push(|o| {
            Instruction::call(
                o,
                Some(&data),
                MethodRef::new(row_type(), "get_Item", column_data_type()).with_params(vec![TypeRef::string()]),
                &[row, &selector],
            )
        });
        data
    }

    /// `row["name"].String`
    pub fn read_string(&mut self, row: &Variable, name: &str) -> Variable {
        self.read_as(row, name, "get_String", TypeRef::string())
    }

    /// `row["name"].Boolean`
    pub fn read_bool(&mut self, row: &Variable, name: &str) -> Variable {
        self.read_as(row, name, "get_Boolean", TypeRef::boolean())
    }

    /// `data.String`
    pub fn string_of(&mut self, data: &Variable) -> Variable {
        self.value_of(data, "get_String", TypeRef::string())
    }

    fn read_as(&mut self, row: &Variable, name: &str, getter: &str, ty: TypeRef) -> Variable {
        let data = self.column(row, name);
        self.value_of(&data, getter, ty)
    }

    fn value_of(&mut self, data: &Variable, getter: &str, ty: TypeRef) -> Variable {
        let value = self.local("v", ty.clone());
        self.push(|o| {
            Instruction::call(
                o,
                Some(&value),
                MethodRef::new(column_data_type(), getter, ty),
                &[data],
            )
        });
        value
    }

    /// `output["name"].Set(value)`
    pub fn write(&mut self, output: &Variable, name: &str, value: &Variable) -> &mut Self {
        let data = self.column(output, name);
        let setter = MethodRef::new(column_data_type(), "Set", TypeRef::void())
            .with_params(vec![value.ty.clone().unwrap_or_else(TypeRef::object)]);
        self.push(|o| Instruction::call(o, None, setter, &[&data, value]))
    }

    /// `result = method(arguments)`
    pub fn call(&mut self, method: MethodRef, arguments: &[&Variable]) -> Variable {
        let result = self.local("r", method.return_type.clone());
        self.push(|o| Instruction::call(o, Some(&result), method, arguments));
        result
    }

    pub fn call_void(&mut self, method: MethodRef, arguments: &[&Variable]) -> &mut Self {
        self.push(|o| Instruction::call(o, None, method, arguments))
    }

    pub fn branch_on(&mut self, condition: &Variable) -> &mut Self {
        self.push(|o| Instruction::branch(o, &[condition]))
    }

    /// `yield return row`
    pub fn yield_row(&mut self, row: &Variable) -> &mut Self {
        let this = self.this.clone();
        self.push(|o| Instruction::store_field(o, &this, current_field(), row))
    }

    pub fn ret(&mut self) -> &mut Self {
        self.push(|o| Instruction::ret(o, None))
    }

    /// Blocks chained entry → 0 → 1 → ... → exit
    pub fn build(self, method: MethodRef) -> MethodBody {
        let edges: Vec<(usize, usize)> = (1..self.blocks.len()).map(|i| (i - 1, i)).collect();
        self.build_with_edges(method, &edges)
    }

    /// Entry → block 0, last block → exit, plus `edges` between block indices
    pub fn build_with_edges(self, method: MethodRef, edges: &[(usize, usize)]) -> MethodBody {
        let mut cfg = Cfg::new();
        let count = self.blocks.len();
        let ids: Vec<_> = self.blocks.into_iter().map(|block| cfg.add_node(block)).collect();
        cfg.connect(ENTRY, ids[0]);
        for (from, to) in edges {
            cfg.connect(ids[*from], ids[*to]);
        }
        cfg.connect(ids[count - 1], EXIT);
        MethodBody::new(method, vec![self.this], cfg)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Processor
// ═══════════════════════════════════════════════════════════════════════════

/// Builder for a whole processor and the program holding it
#[derive(Debug)]
pub struct ProcessorBuilder {
    input_schema: Schema,
    output_schema: Schema,
    move_next_name: String,
    move_next: Option<MethodBody>,
    extra: Vec<MethodBody>,
}

impl ProcessorBuilder {
    pub fn new(input_schema: &str, output_schema: &str) -> Self {
        Self {
            input_schema: Schema::parse(input_schema),
            output_schema: Schema::parse(output_schema),
            move_next_name: "MoveNext".to_string(),
            move_next: None,
            extra: Vec::new(),
        }
    }

    pub fn move_next_method() -> MethodRef {
        MethodRef::new(iterator_type(), "MoveNext", TypeRef::boolean())
    }

    /// Give the iterator's `MoveNext` another name, so several processors
    /// can share one program
    pub fn move_next_named(mut self, name: &str) -> Self {
        self.move_next_name = name.to_string();
        self
    }

    pub fn with_move_next(mut self, body: impl FnOnce(&mut MoveNextBuilder)) -> Self {
        let mut builder = MoveNextBuilder::new();
        body(&mut builder);
        self.move_next = Some(builder.build(Self::move_next_method()));
        self
    }

    pub fn with_move_next_body(mut self, body: MethodBody) -> Self {
        self.move_next = Some(body);
        self
    }

    /// Additional method of the program (callees)
    pub fn with_method(mut self, body: MethodBody) -> Self {
        self.extra.push(body);
        self
    }

    pub fn info(&self) -> ProcessorInfo {
        let iterator = iterator_type();
        ProcessorInfo::new(
            processor_type(),
            MethodRef::new(processor_type(), "Process", iterator.clone())
                .with_params(vec![row_set_type(), row_type()]),
            MethodRef::new(iterator.clone(), "GetEnumerator", iterator),
            MethodRef::new(iterator_type(), self.move_next_name.as_str(), TypeRef::boolean()),
        )
        .with_schemas(self.input_schema.clone(), self.output_schema.clone())
    }

    pub fn build(self) -> (ProcessorInfo, InMemoryProgram) {
        let mut program = InMemoryProgram::new();
        let info = self.build_into(&mut program);
        (info, program)
    }

    /// Add the processor's methods to an existing program
    pub fn build_into(self, program: &mut InMemoryProgram) -> ProcessorInfo {
        let info = self.info();
        program.add_method(entry_body(&info));
        program.add_method(get_enumerator_body(&info));
        if let Some(mut move_next) = self.move_next {
            move_next.method = info.move_next.clone();
            program.add_method(move_next);
        }
        for body in self.extra {
            program.add_method(body);
        }
        info
    }
}

/// `Process(input, output)`: store both tables into a new iterator
pub fn entry_body(info: &ProcessorInfo) -> MethodBody {
    let this = Variable::this(processor_type());
    let input = Variable::parameter("input", row_set_type());
    let output = Variable::parameter("output", row_type());
    let iterator = Variable::local("it", iterator_type());
    MethodBody::new(
        info.entry_method.clone(),
        vec![this, input.clone(), output.clone()],
        Cfg::linear(vec![
            Instruction::create_object(0, &iterator, iterator_type()),
            Instruction::store_field(1, &iterator, input_field(), &input),
            Instruction::store_field(2, &iterator, output_field(), &output),
            Instruction::ret(3, Some(&iterator)),
        ]),
    )
}

/// `GetEnumerator()`: the iterator is its own enumerator
pub fn get_enumerator_body(info: &ProcessorInfo) -> MethodBody {
    let this = Variable::this(iterator_type());
    MethodBody::new(
        info.get_enumerator.clone(),
        vec![this.clone()],
        Cfg::linear(vec![Instruction::ret(0, Some(&this))]),
    )
}

/// Static `p => p`
pub fn identity_body(method: MethodRef) -> MethodBody {
    let p = Variable::parameter("p", TypeRef::string());
    MethodBody::new(method, vec![p.clone()], Cfg::linear(vec![Instruction::ret(0, Some(&p))]))
}

/// Static `p => Self(p)`
pub fn self_recursive_body(method: MethodRef) -> MethodBody {
    let p = Variable::parameter("p", TypeRef::string());
    let r = Variable::local("r", TypeRef::string());
    MethodBody::new(
        method.clone(),
        vec![p.clone()],
        Cfg::linear(vec![
            Instruction::call(0, Some(&r), method, &[&p]),
            Instruction::ret(1, Some(&r)),
        ]),
    )
}
