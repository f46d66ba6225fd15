//! The IR lowering engine. Walks the typed AST bottom-up and emits one
//! [`ir::Module`]: promoted globals for main-block declarations, one
//! function per routine, `main` returning `i32`, and bounds-checked array
//! accesses. Semantic violations surface as [`CodegenError`].

mod builtins;
mod env;

use std::fmt;
use std::mem;

use crate::{
    ast::{ArrayType, BinaryOp, Block, Direction, Expr, Literal, Place, Primitive, Program,
          Routine, Stmt, Type, UnaryOp},
    ir::{self, BlockId, FuncId, Ty, Value},
};
use env::{Storage, Symbol, SymbolTable};

type Result<T, E = CodegenError> = std::result::Result<T, E>;

/// Lowers a parsed program into a fresh IR module.
pub fn lower_program(program: &Program) -> Result<ir::Module> {
    let mut codegen = Codegen::new();
    codegen.lower_block(&program.block)?;
    Ok(codegen.module)
}

/// Handles to the runtime externs, declared once at module creation.
/// `error` is declared lazily on the first bounds check.
struct RuntimeFns {
    write_int: FuncId,
    write_double: FuncId,
    writeln_int: FuncId,
    writeln_double: FuncId,
    readln_int: FuncId,
    readln_double: FuncId,
    error: Option<FuncId>,
}

/// What an `exit` statement returns in the scope being lowered.
#[derive(Clone)]
enum ExitSink {
    /// The program's main block: status 0.
    MainZero,
    /// A procedure body.
    Void,
    /// A function body: the current content of the named return slot.
    Return { name: String, slot: Value, ty: Ty },
}

struct Codegen {
    module: ir::Module,
    runtime: RuntimeFns,
    symbols: SymbolTable,
    exit_sink: ExitSink,
    break_target: Option<BlockId>,
}

/// A resolved assignable location: the cell pointer plus its pointee type.
struct PlaceRef {
    ptr: Value,
    ty: Ty,
}

impl Codegen {
    fn new() -> Codegen {
        let mut module = ir::Module::new("mila-module");
        let runtime = RuntimeFns {
            write_int: module.declare_function("write_int", &[Ty::I32], None, false),
            write_double: module.declare_function("write_double", &[Ty::F64], None, false),
            writeln_int: module.declare_function("writeln_int", &[Ty::I32], None, false),
            writeln_double: module.declare_function("writeln_double", &[Ty::F64], None, false),
            readln_int: module.declare_function("readln_int", &[Ty::Ptr], None, false),
            readln_double: module.declare_function("readln_double", &[Ty::Ptr], None, false),
            error: None,
        };
        Codegen {
            module,
            runtime,
            symbols: SymbolTable::default(),
            exit_sink: ExitSink::MainZero,
            break_target: None,
        }
    }

    /// The main block becomes `main`; any other block opens a fresh basic
    /// block and a symbol scope inside the current function.
    fn lower_block(&mut self, block: &Block) -> Result<()> {
        if block.is_main {
            let main = self.module.add_function("main", Vec::new(), Some(Ty::I32), false);
            let entry = self.module.append_block(main, "entry");
            self.module.set_insert_point(entry);
            self.exit_sink = ExitSink::MainZero;
            for stmt in &block.stmts {
                self.lower_stmt(stmt, true)?;
            }
            self.module.emit_ret(Some(&Value::int(0)));
        } else {
            let func = self.module.insert_func();
            let body = self.module.append_block(func, "block");
            self.module.emit_br(body);
            self.module.set_insert_point(body);
            let saved = self.symbols.snapshot();
            for stmt in &block.stmts {
                self.lower_stmt(stmt, false)?;
            }
            self.symbols = saved;
        }
        Ok(())
    }

    fn lower_stmt(&mut self, stmt: &Stmt, globals: bool) -> Result<()> {
        match stmt {
            Stmt::Empty => Ok(()),
            Stmt::Compound(stmts) => {
                for stmt in stmts {
                    self.lower_stmt(stmt, globals)?;
                }
                Ok(())
            }
            Stmt::ConstDef { name, value } => self.lower_const_def(name, value, globals),
            Stmt::VarDecl { name, ty } => self.lower_var_decl(name, *ty, globals),
            Stmt::ArrayDecl { name, ty } => self.lower_array_decl(name, *ty, globals),
            Stmt::Routine(routine) => self.lower_routine(routine),
            Stmt::Assign { target, value } => self.lower_assign(target, value),
            Stmt::Call { name, args } => self.lower_call(name, args).map(|_| ()),
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => self.lower_if(cond, then_body, else_body.as_deref()),
            Stmt::While { cond, body } => self.lower_while(cond, body),
            Stmt::For {
                var,
                from,
                limit,
                direction,
                body,
            } => self.lower_for(var, from, limit, *direction, body),
            Stmt::Break => {
                self.lower_break();
                Ok(())
            }
            Stmt::Exit => {
                self.lower_exit();
                Ok(())
            }
        }
    }

    /* ----------------- Declarations ----------------- */

    fn lower_var_decl(&mut self, name: &str, ty: Primitive, global: bool) -> Result<()> {
        if self.symbols.contains(name) {
            return Err(CodegenError::new(format!(
                "Variable is already declared: {name}"
            )));
        }
        let cell_ty = prim_ty(ty);
        let storage = if global {
            Storage::Global(self.module.add_global(name, &cell_ty, &cell_ty.zero()))
        } else {
            let slot = self.module.emit_alloca(name, &cell_ty);
            self.module.emit_store(&Value::zero_of(&cell_ty), &slot);
            Storage::Local(slot)
        };
        self.symbols.insert(Symbol {
            name: name.to_string(),
            ty: Type::Primitive(ty),
            storage,
            immutable: false,
        })
    }

    fn lower_array_decl(&mut self, name: &str, ty: ArrayType, global: bool) -> Result<()> {
        if self.symbols.contains(name) {
            return Err(CodegenError::new(format!(
                "Array is already declared: {name}"
            )));
        }
        let span = i64::from(ty.hi) - i64::from(ty.lo);
        if span < 0 {
            return Err(CodegenError::new(format!(
                "Array lower bound is greater than upper bound: {name}"
            )));
        }
        if span > 1000 {
            return Err(CodegenError::new(format!("Array size is too large: {name}")));
        }
        if span == 0 {
            return Err(CodegenError::new(format!(
                "Array size should be at least 2: {name}"
            )));
        }

        let len = (span + 1) as u32;
        let elem = prim_ty(ty.elem);
        let agg = Ty::array(len, elem.clone());
        let storage = if global {
            Storage::Global(self.module.add_global(name, &agg, &agg.zero()))
        } else {
            let slot = self.module.emit_alloca(name, &agg);
            for i in 0..len {
                let ptr = self
                    .module
                    .emit_gep(&agg, &slot, &Value::int(i as i32), "idx");
                self.module.emit_store(&Value::zero_of(&elem), &ptr);
            }
            Storage::Local(slot)
        };
        self.symbols.insert(Symbol {
            name: name.to_string(),
            ty: Type::Array(ty),
            storage,
            immutable: false,
        })
    }

    /// A constant is an initialized immutable cell; its type is whatever the
    /// defining expression evaluates to.
    fn lower_const_def(&mut self, name: &str, value: &Expr, global: bool) -> Result<()> {
        if self.symbols.contains(name) {
            return Err(CodegenError::new(format!(
                "Constant is already defined: {name}"
            )));
        }
        let value = self.lower_expr(value)?;
        let inferred = match value.ty {
            Ty::F64 => Primitive::Real,
            Ty::I1 | Ty::I32 => Primitive::Integer,
            _ => {
                return Err(CodegenError::new(format!(
                    "Unsupported constant type: {name}"
                )))
            }
        };
        let storage = if global {
            let cell = self.module.add_global(name, &value.ty, &value.ty.zero());
            self.module.emit_store(&value, &cell);
            Storage::Global(cell)
        } else {
            let slot = self.module.emit_alloca(name, &value.ty);
            self.module.emit_store(&value, &slot);
            Storage::Local(slot)
        };
        self.symbols.insert(Symbol {
            name: name.to_string(),
            ty: Type::Primitive(inferred),
            storage,
            immutable: true,
        })
    }

    /* ----------------- Routines ----------------- */

    fn lower_routine(&mut self, routine: &Routine) -> Result<()> {
        let func = match self.module.function(&routine.name) {
            Some(func) => {
                // A prior declaration exists; only a defining body with the
                // exact same signature is acceptable.
                let existing = self.module.func(func);
                if routine.body.is_none() {
                    return Err(CodegenError::new(format!(
                        "Redeclaration of {} '{}'",
                        routine.kind(),
                        routine.name
                    )));
                }
                if existing.is_defined() {
                    return Err(CodegenError::new(format!(
                        "Redefinition of {} '{}'",
                        routine.kind(),
                        routine.name
                    )));
                }
                if existing.params.len() != routine.params.len() {
                    return Err(CodegenError::new(format!(
                        "{} '{}' expects {} arguments in declaration, but {} were provided in definition",
                        kind_title(routine),
                        routine.name,
                        existing.params.len(),
                        routine.params.len(),
                    )));
                }
                for (i, param) in routine.params.iter().enumerate() {
                    if existing.params[i].ty != prim_ty(param.ty) {
                        return Err(CodegenError::new(format!(
                            "{} '{}' expects argument ${} to be of type provided in the declaration",
                            kind_title(routine),
                            routine.name,
                            i,
                        )));
                    }
                }
                func
            }
            None => {
                if routine.ret.is_some() {
                    for param in &routine.params {
                        if param.name == routine.name {
                            return Err(CodegenError::new(format!(
                                "Function parameter has the same name as the function itself: '{}'",
                                routine.name
                            )));
                        }
                    }
                }
                let params = routine
                    .params
                    .iter()
                    .map(|p| ir::FnParam {
                        name: p.name.clone(),
                        ty: prim_ty(p.ty),
                    })
                    .collect();
                let func =
                    self.module
                        .add_function(&routine.name, params, routine.ret.map(prim_ty), false);
                match routine.body {
                    Some(_) => func,
                    // Just a forward declaration; the stub is all there is.
                    None => return Ok(()),
                }
            }
        };
        let Some(ref body) = routine.body else {
            return Ok(());
        };

        let prev_point = self.module.insert_point();
        let saved_symbols = self.symbols.snapshot();
        let saved_sink = self.exit_sink.clone();

        let entry = self.module.append_block(func, "entry");
        self.module.set_insert_point(entry);

        // Parameters become stack cells holding the incoming values.
        for (i, param) in routine.params.iter().enumerate() {
            let arg = self.module.func(func).param_value(i);
            let slot = self.module.emit_alloca(&param.name, &arg.ty);
            self.module.emit_store(&arg, &slot);
            self.symbols.insert(Symbol {
                name: param.name.clone(),
                ty: Type::Primitive(param.ty),
                storage: Storage::Local(slot),
                immutable: false,
            })?;
        }

        match routine.ret {
            Some(ret) => {
                // The return slot carries the function's own name, so plain
                // assignments to it set the eventual return value.
                let ty = prim_ty(ret);
                let slot = self.module.emit_alloca(&routine.name, &ty);
                self.module.emit_store(&Value::zero_of(&ty), &slot);
                self.symbols.insert(Symbol {
                    name: routine.name.clone(),
                    ty: Type::Primitive(ret),
                    storage: Storage::Local(slot.clone()),
                    immutable: false,
                })?;
                self.exit_sink = ExitSink::Return {
                    name: routine.name.clone(),
                    slot,
                    ty,
                };
            }
            None => self.exit_sink = ExitSink::Void,
        }

        self.lower_block(body)?;

        match self.exit_sink.clone() {
            ExitSink::Return { name, slot, ty } => {
                let value = self.module.emit_load(ty, &slot, &name);
                self.module.emit_ret(Some(&value));
            }
            _ => self.module.emit_ret(None),
        }

        self.module.set_insert_point(prev_point);
        self.symbols = saved_symbols;
        self.exit_sink = saved_sink;
        Ok(())
    }

    /* ----------------- Statements ----------------- */

    fn lower_assign(&mut self, target: &Place, value: &Expr) -> Result<()> {
        let name = target.name();
        match self.symbols.get(name) {
            None => {
                return Err(CodegenError::new(format!("Variable not found: {name}")));
            }
            Some(symbol) if symbol.immutable => {
                return Err(CodegenError::new(format!(
                    "Cannot assign to a constant: {name}"
                )));
            }
            Some(_) => {}
        }

        let place = self.lower_place(target)?;
        let value = self.lower_expr(value)?;

        if value.ty == Ty::F64 && place.ty == Ty::I32 {
            return Err(CodegenError::new(format!(
                "Assignment failed - cannot assign real value to an integer variable: {name}"
            )));
        }
        let value = if place.ty == Ty::F64 && value.ty != Ty::F64 {
            self.module.emit_sitofp(&value)
        } else {
            value
        };
        self.module.emit_store(&value, &place.ptr);
        Ok(())
    }

    fn lower_if(&mut self, cond: &Expr, then_body: &Stmt, else_body: Option<&Stmt>) -> Result<()> {
        let func = self.module.insert_func();
        let body = self.module.append_block(func, "body");
        let else_block = self.module.append_block(func, "elseBody");
        let after = self.module.append_block(func, "after");

        let cond = self.lower_expr(cond)?;
        self.module.emit_cond_br(&cond, body, else_block);

        self.module.set_insert_point(body);
        self.lower_stmt(then_body, false)?;
        self.module.emit_br(after);

        self.module.set_insert_point(else_block);
        if let Some(else_body) = else_body {
            self.lower_stmt(else_body, false)?;
        }
        self.module.emit_br(after);

        self.module.set_insert_point(after);
        Ok(())
    }

    fn lower_while(&mut self, cond: &Expr, body: &Stmt) -> Result<()> {
        let func = self.module.insert_func();
        let cond_block = self.module.append_block(func, "cond");
        let body_block = self.module.append_block(func, "body");
        let after = self.module.append_block(func, "after");

        self.module.emit_br(cond_block);
        self.module.set_insert_point(cond_block);
        let cond = self.lower_expr(cond)?;
        self.module.emit_cond_br(&cond, body_block, after);

        self.module.set_insert_point(body_block);
        let saved_break = mem::replace(&mut self.break_target, Some(after));
        self.lower_stmt(body, false)?;
        self.break_target = saved_break;
        self.module.emit_br(cond_block);

        self.module.set_insert_point(after);
        Ok(())
    }

    fn lower_for(
        &mut self,
        var: &str,
        from: &Expr,
        limit: &Expr,
        direction: Direction,
        body: &Stmt,
    ) -> Result<()> {
        let func = self.module.insert_func();
        let init = self.module.append_block(func, "init");
        let cond = self.module.append_block(func, "cond");
        let body_block = self.module.append_block(func, "body");
        let after = self.module.append_block(func, "after");

        let target = Place::Var(var.to_string());

        // The bound is evaluated once, together with the init assignment.
        self.module.emit_br(init);
        self.module.set_insert_point(init);
        self.lower_assign(&target, from)?;
        let limit = self.lower_expr(limit)?;
        self.module.emit_br(cond);

        self.module.set_insert_point(cond);
        let current = self.load_var(var)?;
        let keep_going = match direction {
            Direction::To => self.module.emit_icmp("sle", "le", &current, &limit),
            Direction::Downto => self.module.emit_icmp("sge", "ge", &current, &limit),
        };
        self.module.emit_cond_br(&keep_going, body_block, after);

        self.module.set_insert_point(body_block);
        let saved_break = mem::replace(&mut self.break_target, Some(after));
        self.lower_stmt(body, false)?;
        self.break_target = saved_break;

        let step = match direction {
            Direction::To => 1,
            Direction::Downto => -1,
        };
        let current = self.load_var(var)?;
        let stepped = self
            .module
            .emit_binary("add", "inc", &current, &Value::int(step));
        let place = self.lower_place(&target)?;
        self.module.emit_store(&stepped, &place.ptr);
        self.module.emit_br(cond);

        self.module.set_insert_point(after);
        Ok(())
    }

    /// Branches to the innermost loop's after-block. Outside a loop the
    /// statement does nothing.
    fn lower_break(&mut self) {
        let Some(target) = self.break_target else {
            return;
        };
        self.module.emit_br(target);
        let func = self.module.insert_func();
        let unreachable = self.module.append_block(func, "afterBreak");
        self.module.set_insert_point(unreachable);
    }

    /// Returns from the enclosing scope according to the exit sink. Source
    /// code after the exit lowers into a fresh unreachable block.
    fn lower_exit(&mut self) {
        match self.exit_sink.clone() {
            ExitSink::MainZero => self.module.emit_ret(Some(&Value::int(0))),
            ExitSink::Void => self.module.emit_ret(None),
            ExitSink::Return { name, slot, ty } => {
                let value = self.module.emit_load(ty, &slot, &name);
                self.module.emit_ret(Some(&value));
            }
        }
        let func = self.module.insert_func();
        let unreachable = self.module.append_block(func, "afterExit");
        self.module.set_insert_point(unreachable);
    }

    /* ----------------- Expressions ----------------- */

    fn lower_expr(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(Literal::Int(value)) => Ok(Value::int(*value)),
            Expr::Literal(Literal::Real(value)) => Ok(Value::real(*value)),
            Expr::VarRef(name) => self.load_var(name),
            Expr::ArrayRef { name, index } => {
                let (ptr, elem) = self.element_ptr(name, index)?;
                Ok(self.module.emit_load(elem, &ptr, &format!("{name}_elem")))
            }
            Expr::Unary { op, expr } => self.lower_unary(*op, expr),
            Expr::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs),
            Expr::Call { name, args } => match self.lower_call(name, args)? {
                Some(value) => Ok(value),
                None => Err(CodegenError::new(format!(
                    "Function '{name}' does not return a value"
                ))),
            },
        }
    }

    fn lower_unary(&mut self, op: UnaryOp, expr: &Expr) -> Result<Value> {
        let value = self.lower_expr(expr)?;
        match op {
            UnaryOp::Neg => {
                if value.ty == Ty::F64 {
                    Ok(self.module.emit_fneg(&value))
                } else {
                    let zero = Value {
                        repr: "0".to_string(),
                        ty: value.ty.clone(),
                    };
                    Ok(self.module.emit_binary("sub", "neg", &zero, &value))
                }
            }
            UnaryOp::Not => {
                if value.ty == Ty::F64 {
                    return Err(CodegenError::new(
                        "Unsupported NOT operation for real type",
                    ));
                }
                let one = Value {
                    repr: "1".to_string(),
                    ty: value.ty.clone(),
                };
                Ok(self.module.emit_binary("xor", "not", &value, &one))
            }
        }
    }

    fn lower_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value> {
        let lhs = self.lower_expr(lhs)?;
        let rhs = self.lower_expr(rhs)?;
        let fp = lhs.ty == Ty::F64 || rhs.ty == Ty::F64;

        // Logical operators are bitwise and integer-only.
        if let BinaryOp::And | BinaryOp::Or = op {
            if fp {
                let which = if op == BinaryOp::And { "AND" } else { "OR" };
                return Err(CodegenError::new(format!(
                    "Unsupported logical {which} operation for real type"
                )));
            }
            let text = if op == BinaryOp::And { "and" } else { "or" };
            return Ok(self.module.emit_binary(text, text, &lhs, &rhs));
        }

        if fp {
            // One real side promotes the whole operation to floating point.
            let lhs = self.promote(lhs);
            let rhs = self.promote(rhs);
            let result = match op {
                BinaryOp::Add => self.module.emit_binary("fadd", "fadd", &lhs, &rhs),
                BinaryOp::Sub => self.module.emit_binary("fsub", "fsub", &lhs, &rhs),
                BinaryOp::Mul => self.module.emit_binary("fmul", "fmul", &lhs, &rhs),
                BinaryOp::Div => self.module.emit_binary("fdiv", "fdiv", &lhs, &rhs),
                BinaryOp::Mod => self.module.emit_binary("frem", "fmod", &lhs, &rhs),
                BinaryOp::Eq => self.module.emit_fcmp("oeq", "feq", &lhs, &rhs),
                BinaryOp::Ne => self.module.emit_fcmp("one", "fneq", &lhs, &rhs),
                BinaryOp::Lt => self.module.emit_fcmp("olt", "flt", &lhs, &rhs),
                BinaryOp::Le => self.module.emit_fcmp("ole", "fle", &lhs, &rhs),
                BinaryOp::Gt => self.module.emit_fcmp("ogt", "fgt", &lhs, &rhs),
                BinaryOp::Ge => self.module.emit_fcmp("oge", "fge", &lhs, &rhs),
                BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
            };
            return Ok(result);
        }

        let result = match op {
            BinaryOp::Add => self.module.emit_binary("add", "add", &lhs, &rhs),
            BinaryOp::Sub => self.module.emit_binary("sub", "sub", &lhs, &rhs),
            BinaryOp::Mul => self.module.emit_binary("mul", "mul", &lhs, &rhs),
            BinaryOp::Div => self.module.emit_binary("sdiv", "div", &lhs, &rhs),
            BinaryOp::Mod => self.module.emit_binary("srem", "mod", &lhs, &rhs),
            BinaryOp::Eq => self.module.emit_icmp("eq", "eq", &lhs, &rhs),
            BinaryOp::Ne => self.module.emit_icmp("ne", "neq", &lhs, &rhs),
            BinaryOp::Lt => self.module.emit_icmp("slt", "lt", &lhs, &rhs),
            BinaryOp::Le => self.module.emit_icmp("sle", "le", &lhs, &rhs),
            BinaryOp::Gt => self.module.emit_icmp("sgt", "gt", &lhs, &rhs),
            BinaryOp::Ge => self.module.emit_icmp("sge", "ge", &lhs, &rhs),
            BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
        };
        Ok(result)
    }

    /// Signed-int to FP conversion, a no-op on values that are already real.
    fn promote(&mut self, value: Value) -> Value {
        if value.ty == Ty::F64 {
            value
        } else {
            self.module.emit_sitofp(&value)
        }
    }

    fn load_var(&mut self, name: &str) -> Result<Value> {
        let symbol = self.symbols.get(name).ok_or_else(|| {
            CodegenError::new(format!("Variable/Constant not found: {name}"))
        })?;
        let ptr = symbol.storage.ptr().clone();
        let ty = ir_ty(&symbol.ty);
        Ok(self.module.emit_load(ty, &ptr, name))
    }

    /// Resolves an assignable location without loading from it.
    fn lower_place(&mut self, place: &Place) -> Result<PlaceRef> {
        match place {
            Place::Var(name) => {
                let symbol = self.symbols.get(name).ok_or_else(|| {
                    CodegenError::new(format!("Variable/Constant not found: {name}"))
                })?;
                Ok(PlaceRef {
                    ptr: symbol.storage.ptr().clone(),
                    ty: ir_ty(&symbol.ty),
                })
            }
            Place::Element { name, index } => {
                let (ptr, ty) = self.element_ptr(name, index)?;
                Ok(PlaceRef { ptr, ty })
            }
        }
    }

    /// The address of an array element, after the bounds check. The index
    /// is rebased by the lower bound, so negative declared bounds work.
    fn element_ptr(&mut self, name: &str, index: &Expr) -> Result<(Value, Ty)> {
        let symbol = self.symbols.get(name).ok_or_else(|| {
            CodegenError::new(format!("Array identifier not found: {name}"))
        })?;
        let Type::Array(array) = symbol.ty else {
            return Err(CodegenError::new(format!(
                "Identifier is not an array: {name}"
            )));
        };
        let base = symbol.storage.ptr().clone();

        let index = self.lower_expr(index)?;
        if !matches!(index.ty, Ty::I1 | Ty::I32) {
            return Err(CodegenError::new(format!(
                "Array index value is not an integer: {name}"
            )));
        }

        self.bounds_check(name, &index, array.lo, array.hi);

        let adjusted =
            self.module
                .emit_binary("sub", "adjustedIndex", &index, &Value::int(array.lo));
        let agg = ir_ty(&Type::Array(array));
        let ptr = self
            .module
            .emit_gep(&agg, &base, &adjusted, &format!("{name}_idx"));
        Ok((ptr, prim_ty(array.elem)))
    }

    /// Emits the signed range test against the declared bounds; the failing
    /// path calls the runtime `error` and never returns.
    fn bounds_check(&mut self, name: &str, index: &Value, lo: i32, hi: i32) {
        let below = self.module.emit_icmp("slt", "lt", index, &Value::int(lo));
        let above = self.module.emit_icmp("sgt", "gt", index, &Value::int(hi));
        let out_of_bounds = self
            .module
            .emit_binary("or", "indexOutOfBounds", &below, &above);

        let func = self.module.insert_func();
        let check = self.module.append_block(func, "check");
        let throw = self.module.append_block(func, "throw_exception");
        let resume = self.module.append_block(func, "continue");

        self.module.emit_br(check);
        self.module.set_insert_point(check);
        self.module.emit_cond_br(&out_of_bounds, throw, resume);

        self.module.set_insert_point(throw);
        let message = self.module.add_string(&format!(
            "Runtime error: Array '{name}' - the index is out of bounds.\n"
        ));
        let error = self.error_function();
        self.module.emit_call(error, &[message]);
        self.module.emit_unreachable();

        self.module.set_insert_point(resume);
    }

    /// The `error` extern, declared on first use so user programs cannot
    /// call it by accident.
    fn error_function(&mut self) -> FuncId {
        match self.runtime.error {
            Some(func) => func,
            None => {
                let func =
                    self.module
                        .declare_function("error", &[Ty::Ptr], Some(Ty::I32), true);
                self.runtime.error = Some(func);
                func
            }
        }
    }
}

fn prim_ty(ty: Primitive) -> Ty {
    match ty {
        Primitive::Integer => Ty::I32,
        Primitive::Real => Ty::F64,
    }
}

fn ir_ty(ty: &Type) -> Ty {
    match ty {
        Type::Primitive(ty) => prim_ty(*ty),
        Type::Array(array) => {
            let len = (i64::from(array.hi) - i64::from(array.lo) + 1) as u32;
            Ty::array(len, prim_ty(array.elem))
        }
    }
}

fn kind_title(routine: &Routine) -> &'static str {
    if routine.ret.is_some() {
        "Function"
    } else {
        "Procedure"
    }
}

#[derive(Debug)]
pub struct CodegenError {
    pub message: String,
}

impl CodegenError {
    fn new(message: impl Into<String>) -> CodegenError {
        CodegenError {
            message: message.into(),
        }
    }
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CodegenError {}
