//! A structural model of the emitted module: globals, string constants and
//! functions made of labelled basic blocks. Instructions are kept as
//! rendered text, but functions retain their signatures and blocks their
//! terminator so the lowering engine can check forward declarations and
//! tests can check block structure. `Display` produces textual LLVM IR in
//! the opaque-pointer dialect.

use std::collections::HashSet;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ty {
    I1,
    I32,
    F64,
    Ptr,
    Array(u32, Box<Ty>),
}

impl Ty {
    pub fn array(len: u32, elem: Ty) -> Ty {
        Ty::Array(len, Box::new(elem))
    }

    /// The zero initializer in textual form.
    pub fn zero(&self) -> String {
        match self {
            Ty::I1 | Ty::I32 => "0".to_string(),
            Ty::F64 => Value::real(0.0).repr,
            Ty::Ptr => "null".to_string(),
            Ty::Array(..) => "zeroinitializer".to_string(),
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::I1 => f.write_str("i1"),
            Ty::I32 => f.write_str("i32"),
            Ty::F64 => f.write_str("double"),
            Ty::Ptr => f.write_str("ptr"),
            Ty::Array(len, elem) => write!(f, "[{len} x {elem}]"),
        }
    }
}

/// An SSA value: its rendered operand (`%t3`, `@x`, `17`, `0x3FF0…`) plus
/// its type.
#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    pub repr: String,
    pub ty: Ty,
}

impl Value {
    pub fn int(value: i32) -> Value {
        Value {
            repr: value.to_string(),
            ty: Ty::I32,
        }
    }

    /// Doubles are rendered in hexadecimal bit form so the text parses back
    /// to the identical value.
    pub fn real(value: f64) -> Value {
        Value {
            repr: format!("0x{:016X}", value.to_bits()),
            ty: Ty::F64,
        }
    }

    pub fn zero_of(ty: &Ty) -> Value {
        Value {
            repr: ty.zero(),
            ty: ty.clone(),
        }
    }

    fn typed(&self) -> String {
        format!("{} {}", self.ty, self.repr)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FuncId(usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockId {
    func: usize,
    block: usize,
}

#[derive(Clone, Debug)]
pub struct FnParam {
    pub name: String,
    pub ty: Ty,
}

pub struct Function {
    pub name: String,
    pub params: Vec<FnParam>,
    pub ret: Option<Ty>,
    pub varargs: bool,
    blocks: Vec<BasicBlock>,
    next_id: u32,
}

impl Function {
    /// A function stays undefined between its declaration (extern or
    /// `forward`) and the first appended block.
    pub fn is_defined(&self) -> bool {
        !self.blocks.is_empty()
    }

    /// The incoming argument as a value, usable inside the function body.
    pub fn param_value(&self, index: usize) -> Value {
        let param = &self.params[index];
        Value {
            repr: format!("%{}", param.name),
            ty: param.ty.clone(),
        }
    }
}

struct BasicBlock {
    label: String,
    insts: Vec<String>,
    term: Option<String>,
}

pub struct Module {
    name: String,
    globals: Vec<String>,
    funcs: Vec<Function>,
    taken_names: HashSet<String>,
    string_count: u32,
    cursor: Option<BlockId>,
}

impl Module {
    pub fn new(name: &str) -> Module {
        Module {
            name: name.to_string(),
            globals: Vec::new(),
            funcs: Vec::new(),
            taken_names: HashSet::new(),
            string_count: 0,
            cursor: None,
        }
    }

    /// Declares an external function: no body, optionally variadic.
    pub fn declare_function(&mut self, name: &str, params: &[Ty], ret: Option<Ty>, varargs: bool) -> FuncId {
        let params = params
            .iter()
            .map(|ty| FnParam {
                name: String::new(),
                ty: ty.clone(),
            })
            .collect();
        self.add_function(name, params, ret, varargs)
    }

    pub fn add_function(
        &mut self,
        name: &str,
        params: Vec<FnParam>,
        ret: Option<Ty>,
        varargs: bool,
    ) -> FuncId {
        let name = self.claim_name(name);
        self.funcs.push(Function {
            name,
            params,
            ret,
            varargs,
            blocks: Vec::new(),
            next_id: 0,
        });
        FuncId(self.funcs.len() - 1)
    }

    /// Looks a function up by its source name; renamed shadowed definitions
    /// are not found, matching name resolution against the first entry.
    pub fn function(&self, name: &str) -> Option<FuncId> {
        self.funcs.iter().position(|f| f.name == name).map(FuncId)
    }

    pub fn func(&self, id: FuncId) -> &Function {
        &self.funcs[id.0]
    }

    pub fn add_global(&mut self, name: &str, ty: &Ty, init: &str) -> Value {
        let name = self.claim_name(name);
        self.globals.push(format!("@{name} = global {ty} {init}"));
        Value {
            repr: format!("@{name}"),
            ty: Ty::Ptr,
        }
    }

    /// Interns a NUL-terminated string constant and returns a pointer to it.
    pub fn add_string(&mut self, text: &str) -> Value {
        let name = if self.string_count == 0 {
            "@.str".to_string()
        } else {
            format!("@.str.{}", self.string_count)
        };
        self.string_count += 1;
        let len = text.len() + 1;
        self.globals.push(format!(
            "{name} = private unnamed_addr constant [{len} x i8] c\"{}\\00\"",
            escape_string(text),
        ));
        Value {
            repr: name,
            ty: Ty::Ptr,
        }
    }

    /// Appends a fresh block to the function; its label is unique within it.
    pub fn append_block(&mut self, func: FuncId, base: &str) -> BlockId {
        let label = if base == "entry" {
            base.to_string()
        } else {
            let n = self.funcs[func.0].next_id;
            self.funcs[func.0].next_id += 1;
            format!("{base}{n}")
        };
        self.funcs[func.0].blocks.push(BasicBlock {
            label,
            insts: Vec::new(),
            term: None,
        });
        BlockId {
            func: func.0,
            block: self.funcs[func.0].blocks.len() - 1,
        }
    }

    pub fn set_insert_point(&mut self, block: BlockId) {
        self.cursor = Some(block);
    }

    pub fn insert_point(&self) -> BlockId {
        self.cursor.expect("insertion point not set")
    }

    pub fn insert_func(&self) -> FuncId {
        FuncId(self.insert_point().func)
    }

    /* ----------------- Instruction emission ----------------- */

    pub fn emit_alloca(&mut self, base: &str, ty: &Ty) -> Value {
        let name = self.fresh(base);
        self.push(format!("{name} = alloca {ty}"));
        Value {
            repr: name,
            ty: Ty::Ptr,
        }
    }

    pub fn emit_store(&mut self, value: &Value, ptr: &Value) {
        self.push(format!(
            "store {}, ptr {}",
            value.typed(),
            ptr.repr
        ));
    }

    pub fn emit_load(&mut self, ty: Ty, ptr: &Value, base: &str) -> Value {
        let name = self.fresh(base);
        self.push(format!("{name} = load {ty}, ptr {}", ptr.repr));
        Value { repr: name, ty }
    }

    /// A two-operand instruction whose result type equals the left
    /// operand's (arithmetic, bitwise, remainder).
    pub fn emit_binary(&mut self, op: &str, base: &str, lhs: &Value, rhs: &Value) -> Value {
        let name = self.fresh(base);
        self.push(format!("{name} = {op} {}, {}", lhs.typed(), rhs.repr));
        Value {
            repr: name,
            ty: lhs.ty.clone(),
        }
    }

    pub fn emit_icmp(&mut self, cond: &str, base: &str, lhs: &Value, rhs: &Value) -> Value {
        let name = self.fresh(base);
        self.push(format!("{name} = icmp {cond} {}, {}", lhs.typed(), rhs.repr));
        Value {
            repr: name,
            ty: Ty::I1,
        }
    }

    /// Ordered floating-point comparison.
    pub fn emit_fcmp(&mut self, cond: &str, base: &str, lhs: &Value, rhs: &Value) -> Value {
        let name = self.fresh(base);
        self.push(format!("{name} = fcmp {cond} {}, {}", lhs.typed(), rhs.repr));
        Value {
            repr: name,
            ty: Ty::I1,
        }
    }

    pub fn emit_fneg(&mut self, value: &Value) -> Value {
        let name = self.fresh("fneg");
        self.push(format!("{name} = fneg {}", value.typed()));
        Value {
            repr: name,
            ty: Ty::F64,
        }
    }

    pub fn emit_sitofp(&mut self, value: &Value) -> Value {
        let name = self.fresh("conv");
        self.push(format!("{name} = sitofp {} to double", value.typed()));
        Value {
            repr: name,
            ty: Ty::F64,
        }
    }

    pub fn emit_fptosi(&mut self, value: &Value) -> Value {
        let name = self.fresh("conv");
        self.push(format!("{name} = fptosi {} to i32", value.typed()));
        Value {
            repr: name,
            ty: Ty::I32,
        }
    }

    /// Element address inside an aggregate, LLVM-style leading zero index.
    pub fn emit_gep(&mut self, agg: &Ty, ptr: &Value, index: &Value, base: &str) -> Value {
        let name = self.fresh(base);
        self.push(format!(
            "{name} = getelementptr inbounds {agg}, ptr {}, i32 0, {}",
            ptr.repr,
            index.typed(),
        ));
        Value {
            repr: name,
            ty: Ty::Ptr,
        }
    }

    pub fn emit_call(&mut self, func: FuncId, args: &[Value]) -> Option<Value> {
        let f = &self.funcs[func.0];
        let fname = f.name.clone();
        let ret = f.ret.clone();
        let callee_ty = if f.varargs {
            let fixed: Vec<String> = f.params.iter().map(|p| p.ty.to_string()).collect();
            format!(
                "{} ({}, ...)",
                ret.as_ref().map_or("void".to_string(), Ty::to_string),
                fixed.join(", "),
            )
        } else {
            ret.as_ref().map_or("void".to_string(), Ty::to_string)
        };
        let rendered: Vec<String> = args.iter().map(Value::typed).collect();
        let args = rendered.join(", ");
        match ret {
            Some(ty) => {
                let name = self.fresh("call");
                self.push(format!("{name} = call {callee_ty} @{fname}({args})"));
                Some(Value { repr: name, ty })
            }
            None => {
                self.push(format!("call {callee_ty} @{fname}({args})"));
                None
            }
        }
    }

    pub fn emit_br(&mut self, target: BlockId) {
        let label = self.label(target);
        self.terminate(format!("br label %{label}"));
    }

    pub fn emit_cond_br(&mut self, cond: &Value, then_block: BlockId, else_block: BlockId) {
        let then_label = self.label(then_block);
        let else_label = self.label(else_block);
        self.terminate(format!(
            "br {}, label %{then_label}, label %{else_label}",
            cond.typed(),
        ));
    }

    pub fn emit_ret(&mut self, value: Option<&Value>) {
        match value {
            Some(value) => self.terminate(format!("ret {}", value.typed())),
            None => self.terminate("ret void".to_string()),
        }
    }

    pub fn emit_unreachable(&mut self) {
        self.terminate("unreachable".to_string());
    }

    /* ----------------- Internals ----------------- */

    fn fresh(&mut self, base: &str) -> String {
        let idx = self.insert_point().func;
        let func = &mut self.funcs[idx];
        let n = func.next_id;
        func.next_id += 1;
        format!("%{base}{n}")
    }

    fn push(&mut self, inst: String) {
        let at = self.insert_point();
        let block = &mut self.funcs[at.func].blocks[at.block];
        debug_assert!(block.term.is_none(), "emitting into a terminated block");
        block.insts.push(inst);
    }

    fn terminate(&mut self, term: String) {
        let at = self.insert_point();
        let block = &mut self.funcs[at.func].blocks[at.block];
        debug_assert!(block.term.is_none(), "block already has a terminator");
        if block.term.is_none() {
            block.term = Some(term);
        }
    }

    fn label(&self, block: BlockId) -> String {
        self.funcs[block.func].blocks[block.block].label.clone()
    }

    /// Module-level names must be unique; a clashing request gets a numeric
    /// suffix, the same way LLVM renames.
    fn claim_name(&mut self, base: &str) -> String {
        let mut name = base.to_string();
        let mut n = 0;
        while self.taken_names.contains(&name) {
            n += 1;
            name = format!("{base}.{n}");
        }
        self.taken_names.insert(name.clone());
        name
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        writeln!(f, "source_filename = \"{}\"", self.name)?;
        if !self.globals.is_empty() {
            writeln!(f)?;
            for global in &self.globals {
                writeln!(f, "{global}")?;
            }
        }
        for func in &self.funcs {
            writeln!(f)?;
            let ret = func.ret.as_ref().map_or("void".to_string(), Ty::to_string);
            if func.is_defined() {
                let params: Vec<String> = func
                    .params
                    .iter()
                    .map(|p| format!("{} %{}", p.ty, p.name))
                    .collect();
                writeln!(f, "define {ret} @{}({}) {{", func.name, params.join(", "))?;
                for (i, block) in func.blocks.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    writeln!(f, "{}:", block.label)?;
                    for inst in &block.insts {
                        writeln!(f, "  {inst}")?;
                    }
                    if let Some(ref term) = block.term {
                        writeln!(f, "  {term}")?;
                    }
                }
                writeln!(f, "}}")?;
            } else {
                let mut params: Vec<String> =
                    func.params.iter().map(|p| p.ty.to_string()).collect();
                if func.varargs {
                    params.push("...".to_string());
                }
                writeln!(f, "declare {ret} @{}({})", func.name, params.join(", "))?;
            }
        }
        Ok(())
    }
}

/// LLVM `c"…"` escaping: printable ASCII except quote and backslash stays,
/// everything else becomes `\XX`.
fn escape_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for &byte in text.as_bytes() {
        match byte {
            b'"' | b'\\' => out.push_str(&format!("\\{byte:02X}")),
            0x20..=0x7e => out.push(byte as char),
            _ => out.push_str(&format!("\\{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn real_values_round_trip_through_bits() {
        assert_eq!(Value::real(1.0).repr, "0x3FF0000000000000");
        assert_eq!(Value::real(0.0).repr, "0x0000000000000000");
    }

    #[test]
    fn string_constants_are_escaped_and_nul_terminated() {
        let mut module = Module::new("m");
        let s = module.add_string("hi\n");
        assert_eq!(s.repr, "@.str");
        let text = module.to_string();
        assert!(text.contains("[4 x i8] c\"hi\\0A\\00\""), "got: {text}");
    }

    #[test]
    fn defined_function_renders_blocks_in_order() {
        let mut module = Module::new("m");
        let f = module.add_function(
            "id",
            vec![FnParam {
                name: "n".to_string(),
                ty: Ty::I32,
            }],
            Some(Ty::I32),
            false,
        );
        let entry = module.append_block(f, "entry");
        module.set_insert_point(entry);
        let slot = module.emit_alloca("n", &Ty::I32);
        module.emit_store(&module.func(f).param_value(0), &slot);
        let loaded = module.emit_load(Ty::I32, &slot, "n");
        module.emit_ret(Some(&loaded));

        let text = module.to_string();
        assert!(text.contains("define i32 @id(i32 %n) {"), "got: {text}");
        assert!(text.contains("%n0 = alloca i32"), "got: {text}");
        assert!(text.contains("store i32 %n, ptr %n0"), "got: {text}");
        assert!(text.contains("ret i32 %n1"), "got: {text}");
    }

    #[test]
    fn externs_render_as_declares() {
        let mut module = Module::new("m");
        module.declare_function("write_int", &[Ty::I32], None, false);
        module.declare_function("readln_double", &[Ty::Ptr], None, false);
        let text = module.to_string();
        assert!(text.contains("declare void @write_int(i32)"));
        assert!(text.contains("declare void @readln_double(ptr)"));
    }

    #[test]
    fn clashing_module_names_are_renamed() {
        let mut module = Module::new("m");
        module.add_global("x", &Ty::I32, "0");
        let renamed = module.add_global("x", &Ty::I32, "0");
        assert_eq!(renamed.repr, "@x.1");
    }

    #[test]
    fn varargs_call_spells_the_callee_type() {
        let mut module = Module::new("m");
        let error = module.declare_function("error", &[Ty::Ptr], Some(Ty::I32), true);
        let main = module.add_function("main", Vec::new(), Some(Ty::I32), false);
        let entry = module.append_block(main, "entry");
        module.set_insert_point(entry);
        let message = module.add_string("boom");
        module.emit_call(error, &[message]);
        module.emit_ret(Some(&Value::int(0)));
        let text = module.to_string();
        assert!(
            text.contains("call i32 (ptr, ...) @error(ptr @.str)"),
            "got: {text}"
        );
    }
}
