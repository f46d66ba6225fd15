//! Dispatch for calls: the predefined IO and conversion routines are tried
//! by name first, then the module's own functions. `readln` is special in
//! that its argument must resolve to a storage location.

use super::{Codegen, CodegenError, Result};
use crate::{
    ast::Expr,
    ir::{FuncId, Ty, Value},
};

impl Codegen {
    /// Lowers a call in either expression or statement position. Procedures
    /// and the IO routines produce no value.
    pub(super) fn lower_call(&mut self, name: &str, args: &[Expr]) -> Result<Option<Value>> {
        match name {
            "write" => self.lower_write(name, args, false),
            "writeln" => self.lower_write(name, args, true),
            "readln" => self.lower_readln(args),
            "to_integer" => self.lower_to_integer(args),
            "to_real" => self.lower_to_real(args),
            _ => self.lower_user_call(name, args),
        }
    }

    fn lower_write(&mut self, name: &str, args: &[Expr], line: bool) -> Result<Option<Value>> {
        self.expect_one_arg(name, "procedure", args)?;
        let value = self.lower_expr(&args[0])?;
        let target = match (line, &value.ty) {
            (false, Ty::F64) => self.runtime.write_double,
            (false, Ty::I1 | Ty::I32) => self.runtime.write_int,
            (true, Ty::F64) => self.runtime.writeln_double,
            (true, Ty::I1 | Ty::I32) => self.runtime.writeln_int,
            _ => {
                return Err(CodegenError::new(format!(
                    "Unsupported argument type for '{name}' procedure"
                )))
            }
        };
        self.module.emit_call(target, &[value]);
        Ok(None)
    }

    fn lower_readln(&mut self, args: &[Expr]) -> Result<Option<Value>> {
        self.expect_one_arg("readln", "procedure", args)?;
        // The argument must denote a cell, not an arbitrary value.
        let (ptr, ty) = match &args[0] {
            Expr::VarRef(name) => {
                let symbol = self.symbols.get(name).ok_or_else(|| {
                    CodegenError::new(format!("Variable/Constant not found: {name}"))
                })?;
                (symbol.storage.ptr().clone(), super::ir_ty(&symbol.ty))
            }
            Expr::ArrayRef { name, index } => self.element_ptr(name, index)?,
            _ => {
                return Err(CodegenError::new(
                    "'readln' procedure failed, argument is not a variable",
                ))
            }
        };
        let target = match ty {
            Ty::F64 => self.runtime.readln_double,
            Ty::I32 => self.runtime.readln_int,
            _ => {
                return Err(CodegenError::new(
                    "Unsupported argument type for 'readln' procedure",
                ))
            }
        };
        self.module.emit_call(target, &[ptr]);
        Ok(None)
    }

    fn lower_to_integer(&mut self, args: &[Expr]) -> Result<Option<Value>> {
        self.expect_one_arg("to_integer", "function", args)?;
        let value = self.lower_expr(&args[0])?;
        match value.ty {
            Ty::F64 => Ok(Some(self.module.emit_fptosi(&value))),
            Ty::I1 | Ty::I32 => Ok(Some(value)),
            _ => Err(CodegenError::new(
                "Unsupported argument type for 'to_integer' function",
            )),
        }
    }

    fn lower_to_real(&mut self, args: &[Expr]) -> Result<Option<Value>> {
        self.expect_one_arg("to_real", "function", args)?;
        let value = self.lower_expr(&args[0])?;
        match value.ty {
            Ty::I1 | Ty::I32 => Ok(Some(self.module.emit_sitofp(&value))),
            Ty::F64 => Ok(Some(value)),
            _ => Err(CodegenError::new(
                "Unsupported argument type for 'to_real' function",
            )),
        }
    }

    /// The fallback: resolve against the module's functions, check arity,
    /// lower the arguments in order and emit the call.
    fn lower_user_call(&mut self, name: &str, args: &[Expr]) -> Result<Option<Value>> {
        let func: FuncId = self.module.function(name).ok_or_else(|| {
            CodegenError::new(format!("Function/Procedure not found: {name}"))
        })?;
        let expected = self.module.func(func).params.len();
        if expected != args.len() {
            return Err(CodegenError::new(format!(
                "Function/Procedure {name} expects {expected} arguments, but {} were provided",
                args.len()
            )));
        }
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.lower_expr(arg)?);
        }
        Ok(self.module.emit_call(func, &values))
    }

    fn expect_one_arg(&self, name: &str, kind: &str, args: &[Expr]) -> Result<()> {
        if args.len() != 1 {
            return Err(CodegenError::new(format!(
                "'{name}' {kind} expects 1 argument, but {} were provided",
                args.len()
            )));
        }
        Ok(())
    }
}
