use std::io::{self, Write};

use crate::ast::{Block, Expr, Literal, Place, Program, Routine, Stmt, Type};

const INDENT_WIDTH: usize = 2;

/// Writes an indented tree dump of the program, one node per line. Used by
/// the CLI's verbose mode.
pub fn print_program(w: &mut impl Write, program: &Program) -> io::Result<()> {
    writeln!(w, "program {}", program.name)?;
    print_block(w, 1, &program.block)
}

pub fn print_program_string(program: &Program) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_program(&mut buf, program).unwrap();
    String::from_utf8(buf).unwrap()
}

fn print_block(w: &mut impl Write, i: usize, block: &Block) -> io::Result<()> {
    sp(w, i)?;
    if block.is_main {
        writeln!(w, "block (main)")?;
    } else {
        writeln!(w, "block")?;
    }
    for stmt in &block.stmts {
        print_stmt(w, i + 1, stmt)?;
    }
    Ok(())
}

fn print_stmt(w: &mut impl Write, i: usize, stmt: &Stmt) -> io::Result<()> {
    sp(w, i)?;
    match stmt {
        Stmt::Empty => writeln!(w, "empty"),
        Stmt::Assign { target, value } => {
            match target {
                Place::Var(name) => writeln!(w, "assign {name}")?,
                Place::Element { name, index } => {
                    writeln!(w, "assign {name}[..]")?;
                    print_expr(w, i + 1, index)?;
                }
            }
            print_expr(w, i + 1, value)
        }
        Stmt::If {
            cond,
            then_body,
            else_body,
        } => {
            writeln!(w, "if")?;
            print_expr(w, i + 1, cond)?;
            print_stmt(w, i + 1, then_body)?;
            if let Some(else_body) = else_body {
                sp(w, i)?;
                writeln!(w, "else")?;
                print_stmt(w, i + 1, else_body)?;
            }
            Ok(())
        }
        Stmt::While { cond, body } => {
            writeln!(w, "while")?;
            print_expr(w, i + 1, cond)?;
            print_stmt(w, i + 1, body)
        }
        Stmt::For {
            var,
            from,
            limit,
            direction,
            body,
        } => {
            writeln!(w, "for {var} ({direction:?})")?;
            print_expr(w, i + 1, from)?;
            print_expr(w, i + 1, limit)?;
            print_stmt(w, i + 1, body)
        }
        Stmt::Compound(stmts) => {
            writeln!(w, "compound")?;
            for stmt in stmts {
                print_stmt(w, i + 1, stmt)?;
            }
            Ok(())
        }
        Stmt::Call { name, args } => {
            writeln!(w, "call {name}")?;
            for arg in args {
                print_expr(w, i + 1, arg)?;
            }
            Ok(())
        }
        Stmt::Break => writeln!(w, "break"),
        Stmt::Exit => writeln!(w, "exit"),
        Stmt::ConstDef { name, value } => {
            writeln!(w, "const {name}")?;
            print_expr(w, i + 1, value)
        }
        Stmt::VarDecl { name, ty } => writeln!(w, "var {name}: {}", type_name(Type::Primitive(*ty))),
        Stmt::ArrayDecl { name, ty } => writeln!(w, "var {name}: {}", type_name(Type::Array(*ty))),
        Stmt::Routine(routine) => print_routine(w, i, routine),
    }
}

fn print_routine(w: &mut impl Write, i: usize, routine: &Routine) -> io::Result<()> {
    write!(w, "{} {}(", routine.kind(), routine.name)?;
    for (idx, param) in routine.params.iter().enumerate() {
        if idx > 0 {
            write!(w, ", ")?;
        }
        write!(
            w,
            "{}: {}",
            param.name,
            type_name(Type::Primitive(param.ty))
        )?;
    }
    write!(w, ")")?;
    if let Some(ret) = routine.ret {
        write!(w, ": {}", type_name(Type::Primitive(ret)))?;
    }
    match routine.body {
        Some(ref body) => {
            writeln!(w)?;
            print_block(w, i + 1, body)
        }
        None => writeln!(w, " (forward)"),
    }
}

fn print_expr(w: &mut impl Write, i: usize, expr: &Expr) -> io::Result<()> {
    sp(w, i)?;
    match expr {
        Expr::Literal(Literal::Int(value)) => writeln!(w, "int {value}"),
        Expr::Literal(Literal::Real(value)) => writeln!(w, "real {value}"),
        Expr::VarRef(name) => writeln!(w, "ref {name}"),
        Expr::ArrayRef { name, index } => {
            writeln!(w, "ref {name}[..]")?;
            print_expr(w, i + 1, index)
        }
        Expr::Unary { op, expr } => {
            writeln!(w, "unary {op:?}")?;
            print_expr(w, i + 1, expr)
        }
        Expr::Binary { op, lhs, rhs } => {
            writeln!(w, "binary {op:?}")?;
            print_expr(w, i + 1, lhs)?;
            print_expr(w, i + 1, rhs)
        }
        Expr::Call { name, args } => {
            writeln!(w, "call {name}")?;
            for arg in args {
                print_expr(w, i + 1, arg)?;
            }
            Ok(())
        }
    }
}

fn type_name(ty: Type) -> String {
    match ty {
        Type::Primitive(crate::ast::Primitive::Integer) => "integer".to_string(),
        Type::Primitive(crate::ast::Primitive::Real) => "real".to_string(),
        Type::Array(a) => format!(
            "array [{} .. {}] of {}",
            a.lo,
            a.hi,
            type_name(Type::Primitive(a.elem))
        ),
    }
}

fn sp(w: &mut impl Write, i: usize) -> io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer::Lexer, parser::Parser};
    use pretty_assertions::assert_eq;

    #[test]
    fn dump_shape() {
        let src = "program t; var n: integer; begin n := 1; writeln(n) end.";
        let program = Parser::new(Lexer::new(src).unwrap(), false)
            .parse_program()
            .unwrap();
        let dump = print_program_string(&program);
        assert_eq!(
            dump,
            "program t\n\
             \x20 block (main)\n\
             \x20   var n: integer\n\
             \x20   compound\n\
             \x20     assign n\n\
             \x20       int 1\n\
             \x20     call writeln\n\
             \x20       ref n\n",
        );
    }
}
