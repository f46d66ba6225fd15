use std::fmt;

use crate::{
    ast::{
        ArrayType, BinaryOp, Block, Direction, Expr, Literal, Param, Place, Primitive, Program,
        Routine, Stmt, Type, UnaryOp,
    },
    lexer::{Lexer, LexerError},
    token::{Token, TokenKind},
};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Recursive descent over the lexer's single-token lookahead.
///
/// Each rule inspects [`Lexer::peek`], consumes what the grammar dictates and
/// fails with the rule's full expected set otherwise. With `trace` enabled,
/// reduced productions and matched tokens are printed to stdout.
pub struct Parser<'src> {
    lexer: Lexer<'src>,
    trace: bool,
}

impl<'src> Parser<'src> {
    pub fn new(lexer: Lexer<'src>, trace: bool) -> Parser<'src> {
        Parser { lexer, trace }
    }

    pub fn parse_program(&mut self) -> Result<Program> {
        const RULE: &str = "Program";
        self.rule("Program -> 'program' identifier ';' Block '.'");
        self.expect(TokenKind::Program, RULE)?;
        let name = self.expect(TokenKind::Identifier, RULE)?.ident().to_string();
        self.expect(TokenKind::Semicolon, RULE)?;
        let block = self.parse_block()?;
        self.expect(TokenKind::Dot, RULE)?;
        Ok(Program {
            name,
            block: Block {
                is_main: true,
                ..block
            },
        })
    }

    /// The program-level block: declarations (including routines) followed by
    /// the compound statement.
    fn parse_block(&mut self) -> Result<Block> {
        self.rule("Block -> Decls CompoundStmt");
        let mut stmts = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::Const => self.parse_const_defs(&mut stmts)?,
                TokenKind::Var => self.parse_var_decls(&mut stmts)?,
                TokenKind::Procedure | TokenKind::Function => {
                    stmts.push(self.parse_routine_decl()?)
                }
                TokenKind::Begin => break,
                _ => {
                    return Err(self.unexpected(
                        "Block",
                        &[
                            TokenKind::Const,
                            TokenKind::Var,
                            TokenKind::Procedure,
                            TokenKind::Function,
                            TokenKind::Begin,
                        ],
                    ))
                }
            }
        }
        stmts.push(self.parse_compound()?);
        Ok(Block {
            stmts,
            is_main: false,
        })
    }

    /// A routine body block: like [`Parser::parse_block`] but without nested
    /// routine declarations.
    fn parse_body(&mut self) -> Result<Block> {
        self.rule("Body -> LocalDecls CompoundStmt");
        let mut stmts = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::Const => self.parse_const_defs(&mut stmts)?,
                TokenKind::Var => self.parse_var_decls(&mut stmts)?,
                TokenKind::Begin => break,
                _ => {
                    return Err(self.unexpected(
                        "Body",
                        &[TokenKind::Const, TokenKind::Var, TokenKind::Begin],
                    ))
                }
            }
        }
        stmts.push(self.parse_compound()?);
        Ok(Block {
            stmts,
            is_main: false,
        })
    }

    fn parse_const_defs(&mut self, stmts: &mut Vec<Stmt>) -> Result<()> {
        const RULE: &str = "ConstDefs";
        self.rule("ConstDefs -> 'const' (identifier '=' Expr ';')+");
        self.expect(TokenKind::Const, RULE)?;
        loop {
            let name = self.expect(TokenKind::Identifier, RULE)?.ident().to_string();
            self.expect(TokenKind::Equal, RULE)?;
            let value = self.parse_expr()?;
            self.expect(TokenKind::Semicolon, RULE)?;
            stmts.push(Stmt::ConstDef { name, value });
            if self.peek_kind() != TokenKind::Identifier {
                return Ok(());
            }
        }
    }

    fn parse_var_decls(&mut self, stmts: &mut Vec<Stmt>) -> Result<()> {
        const RULE: &str = "VarDecls";
        self.rule("VarDecls -> 'var' (IdentList ':' Type ';')+");
        self.expect(TokenKind::Var, RULE)?;
        loop {
            let names = self.parse_ident_list()?;
            self.expect(TokenKind::Colon, RULE)?;
            let ty = self.parse_type()?;
            self.expect(TokenKind::Semicolon, RULE)?;
            for name in names {
                stmts.push(match ty {
                    Type::Primitive(ty) => Stmt::VarDecl { name, ty },
                    Type::Array(ty) => Stmt::ArrayDecl { name, ty },
                });
            }
            if self.peek_kind() != TokenKind::Identifier {
                return Ok(());
            }
        }
    }

    fn parse_ident_list(&mut self) -> Result<Vec<String>> {
        const RULE: &str = "IdentList";
        let mut names = vec![self.expect(TokenKind::Identifier, RULE)?.ident().to_string()];
        while self.eat(TokenKind::Comma)?.is_some() {
            names.push(self.expect(TokenKind::Identifier, RULE)?.ident().to_string());
        }
        Ok(names)
    }

    fn parse_type(&mut self) -> Result<Type> {
        const RULE: &str = "Type";
        match self.peek_kind() {
            TokenKind::Integer | TokenKind::Real => {
                self.rule("Type -> PrimitiveType");
                Ok(Type::Primitive(self.parse_primitive_type()?))
            }
            TokenKind::Array => {
                self.rule("Type -> 'array' '[' SignedInt '..' SignedInt ']' 'of' PrimitiveType");
                self.expect(TokenKind::Array, RULE)?;
                self.expect(TokenKind::LBracket, RULE)?;
                let lo = self.parse_signed_int()?;
                self.expect(TokenKind::DotDot, RULE)?;
                let hi = self.parse_signed_int()?;
                self.expect(TokenKind::RBracket, RULE)?;
                self.expect(TokenKind::Of, RULE)?;
                let elem = self.parse_primitive_type()?;
                Ok(Type::Array(ArrayType { elem, lo, hi }))
            }
            _ => Err(self.unexpected(
                RULE,
                &[TokenKind::Integer, TokenKind::Real, TokenKind::Array],
            )),
        }
    }

    fn parse_primitive_type(&mut self) -> Result<Primitive> {
        const RULE: &str = "PrimitiveType";
        match self.peek_kind() {
            TokenKind::Integer => {
                self.advance()?;
                Ok(Primitive::Integer)
            }
            TokenKind::Real => {
                self.advance()?;
                Ok(Primitive::Real)
            }
            _ => Err(self.unexpected(RULE, &[TokenKind::Integer, TokenKind::Real])),
        }
    }

    /// An optionally negated integer literal; only array bounds use this.
    fn parse_signed_int(&mut self) -> Result<i32> {
        const RULE: &str = "SignedInt";
        match self.peek_kind() {
            TokenKind::IntLit => Ok(self.advance()?.int()),
            TokenKind::Minus => {
                self.advance()?;
                Ok(-self.expect(TokenKind::IntLit, RULE)?.int())
            }
            _ => Err(self.unexpected(RULE, &[TokenKind::IntLit, TokenKind::Minus])),
        }
    }

    fn parse_routine_decl(&mut self) -> Result<Stmt> {
        const RULE: &str = "RoutineDecl";
        let ret = match self.peek_kind() {
            TokenKind::Procedure => {
                self.rule("RoutineDecl -> 'procedure' identifier Params ';' BodyOrForward ';'");
                self.advance()?;
                None
            }
            TokenKind::Function => {
                self.rule(
                    "RoutineDecl -> 'function' identifier Params ':' PrimitiveType ';' \
                     BodyOrForward ';'",
                );
                self.advance()?;
                Some(())
            }
            _ => {
                return Err(
                    self.unexpected(RULE, &[TokenKind::Procedure, TokenKind::Function])
                )
            }
        };

        let name = self.expect(TokenKind::Identifier, RULE)?.ident().to_string();
        let params = self.parse_params()?;
        let ret = match ret {
            Some(()) => {
                self.expect(TokenKind::Colon, RULE)?;
                Some(self.parse_primitive_type()?)
            }
            None => None,
        };
        self.expect(TokenKind::Semicolon, RULE)?;
        let body = self.parse_body_or_forward()?;
        self.expect(TokenKind::Semicolon, RULE)?;
        Ok(Stmt::Routine(Routine {
            name,
            params,
            ret,
            body,
        }))
    }

    fn parse_params(&mut self) -> Result<Vec<Param>> {
        const RULE: &str = "Params";
        self.expect(TokenKind::LParen, RULE)?;
        let mut params = Vec::new();
        match self.peek_kind() {
            TokenKind::RParen => {}
            TokenKind::Identifier => loop {
                let names = self.parse_ident_list()?;
                self.expect(TokenKind::Colon, RULE)?;
                let ty = self.parse_primitive_type()?;
                params.extend(names.into_iter().map(|name| Param { name, ty }));
                if self.eat(TokenKind::Semicolon)?.is_none() {
                    break;
                }
            },
            _ => {
                return Err(
                    self.unexpected(RULE, &[TokenKind::Identifier, TokenKind::RParen])
                )
            }
        }
        self.expect(TokenKind::RParen, RULE)?;
        Ok(params)
    }

    fn parse_body_or_forward(&mut self) -> Result<Option<Block>> {
        const RULE: &str = "BodyOrForward";
        match self.peek_kind() {
            TokenKind::Forward => {
                self.rule("BodyOrForward -> 'forward'");
                self.advance()?;
                Ok(None)
            }
            TokenKind::Begin | TokenKind::Const | TokenKind::Var => {
                self.rule("BodyOrForward -> Body");
                Ok(Some(self.parse_body()?))
            }
            _ => Err(self.unexpected(
                RULE,
                &[
                    TokenKind::Forward,
                    TokenKind::Begin,
                    TokenKind::Const,
                    TokenKind::Var,
                ],
            )),
        }
    }

    fn parse_compound(&mut self) -> Result<Stmt> {
        const RULE: &str = "CompoundStmt";
        self.rule("CompoundStmt -> 'begin' Stmt (';' Stmt)* 'end'");
        self.expect(TokenKind::Begin, RULE)?;
        let mut stmts = vec![self.parse_statement()?];
        while self.eat(TokenKind::Semicolon)?.is_some() {
            stmts.push(self.parse_statement()?);
        }
        self.expect(TokenKind::End, RULE)?;
        Ok(Stmt::Compound(stmts))
    }

    fn parse_statement(&mut self) -> Result<Stmt> {
        match self.peek_kind() {
            // Empty statement: the lookahead stays for the enclosing rule.
            TokenKind::Semicolon | TokenKind::End | TokenKind::Else => {
                self.rule("Stmt -> EmptyStmt");
                Ok(Stmt::Empty)
            }
            TokenKind::Exit => {
                self.rule("Stmt -> 'exit'");
                self.advance()?;
                Ok(Stmt::Exit)
            }
            TokenKind::Break => {
                self.rule("Stmt -> 'break'");
                self.advance()?;
                Ok(Stmt::Break)
            }
            TokenKind::Identifier => {
                let name = self.advance()?.ident().to_string();
                self.parse_assign_or_call(name)
            }
            TokenKind::Begin => self.parse_compound(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            _ => Err(self.unexpected(
                "Stmt",
                &[
                    TokenKind::Else,
                    TokenKind::Break,
                    TokenKind::Semicolon,
                    TokenKind::Exit,
                    TokenKind::Identifier,
                    TokenKind::Begin,
                    TokenKind::If,
                    TokenKind::For,
                    TokenKind::While,
                    TokenKind::End,
                ],
            )),
        }
    }

    /// Continuation after a leading identifier: a call, an array-element
    /// assignment or a plain assignment.
    fn parse_assign_or_call(&mut self, name: String) -> Result<Stmt> {
        const RULE: &str = "AssignOrCall";
        match self.peek_kind() {
            TokenKind::LParen => {
                self.rule("AssignOrCall -> identifier Args");
                let args = self.parse_args()?;
                Ok(Stmt::Call { name, args })
            }
            TokenKind::LBracket => {
                self.rule("AssignOrCall -> identifier '[' Expr ']' ':=' Expr");
                self.advance()?;
                let index = Box::new(self.parse_expr()?);
                self.expect(TokenKind::RBracket, RULE)?;
                self.expect(TokenKind::Assign, RULE)?;
                let value = self.parse_expr()?;
                Ok(Stmt::Assign {
                    target: Place::Element { name, index },
                    value,
                })
            }
            TokenKind::Assign => {
                self.rule("AssignOrCall -> identifier ':=' Expr");
                self.advance()?;
                let value = self.parse_expr()?;
                Ok(Stmt::Assign {
                    target: Place::Var(name),
                    value,
                })
            }
            _ => Err(self.unexpected(
                RULE,
                &[TokenKind::Assign, TokenKind::LBracket, TokenKind::LParen],
            )),
        }
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        const RULE: &str = "IfStmt";
        self.rule("IfStmt -> 'if' Expr 'then' Stmt ['else' Stmt]");
        self.expect(TokenKind::If, RULE)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Then, RULE)?;
        let then_body = Box::new(self.parse_statement()?);
        // The else arm belongs to the innermost unmatched if.
        let else_body = match self.peek_kind() {
            TokenKind::Else => {
                self.advance()?;
                Some(Box::new(self.parse_statement()?))
            }
            TokenKind::End | TokenKind::Semicolon => None,
            _ => {
                return Err(self.unexpected(
                    "ElseStmt",
                    &[TokenKind::Else, TokenKind::End, TokenKind::Semicolon],
                ))
            }
        };
        Ok(Stmt::If {
            cond,
            then_body,
            else_body,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt> {
        const RULE: &str = "WhileStmt";
        self.rule("WhileStmt -> 'while' Expr 'do' Stmt");
        self.expect(TokenKind::While, RULE)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Do, RULE)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::While { cond, body })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        const RULE: &str = "ForStmt";
        self.rule("ForStmt -> 'for' identifier ':=' Expr ('to' | 'downto') Expr 'do' Stmt");
        self.expect(TokenKind::For, RULE)?;
        let var = self.expect(TokenKind::Identifier, RULE)?.ident().to_string();
        self.expect(TokenKind::Assign, RULE)?;
        let from = self.parse_expr()?;
        let direction = match self.peek_kind() {
            TokenKind::To => {
                self.advance()?;
                Direction::To
            }
            TokenKind::Downto => {
                self.advance()?;
                Direction::Downto
            }
            _ => return Err(self.unexpected(RULE, &[TokenKind::To, TokenKind::Downto])),
        };
        let limit = self.parse_expr()?;
        self.expect(TokenKind::Do, RULE)?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            var,
            from,
            limit,
            direction,
            body,
        })
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>> {
        const RULE: &str = "Args";
        self.expect(TokenKind::LParen, RULE)?;
        let mut args = Vec::new();
        if self.peek_kind() != TokenKind::RParen {
            args.push(self.parse_expr()?);
            while self.eat(TokenKind::Comma)?.is_some() {
                args.push(self.parse_expr()?);
            }
        }
        self.expect(TokenKind::RParen, RULE)?;
        Ok(args)
    }

    /* ----------------- Expressions ----------------- */

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(TokenKind::Or)?.is_some() {
            lhs = binary(BinaryOp::Or, lhs, self.parse_and()?);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.eat(TokenKind::And)?.is_some() {
            lhs = binary(BinaryOp::And, lhs, self.parse_equality()?);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Equal => BinaryOp::Eq,
                TokenKind::NotEqual => BinaryOp::Ne,
                _ => return Ok(lhs),
            };
            self.advance()?;
            lhs = binary(op, lhs, self.parse_relational()?);
        }
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Less => BinaryOp::Lt,
                TokenKind::LessEqual => BinaryOp::Le,
                TokenKind::Greater => BinaryOp::Gt,
                TokenKind::GreaterEqual => BinaryOp::Ge,
                _ => return Ok(lhs),
            };
            self.advance()?;
            lhs = binary(op, lhs, self.parse_additive()?);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance()?;
            lhs = binary(op, lhs, self.parse_multiplicative()?);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash | TokenKind::Div => BinaryOp::Div,
                TokenKind::Mod => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.advance()?;
            lhs = binary(op, lhs, self.parse_unary()?);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.parse_primary(),
        };
        self.advance()?;
        Ok(Expr::Unary {
            op,
            expr: Box::new(self.parse_unary()?),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        const RULE: &str = "PrimaryExpr";
        match self.peek_kind() {
            TokenKind::Identifier => {
                let name = self.advance()?.ident().to_string();
                match self.peek_kind() {
                    TokenKind::LParen => {
                        let args = self.parse_args()?;
                        Ok(Expr::Call { name, args })
                    }
                    TokenKind::LBracket => {
                        self.advance()?;
                        let index = Box::new(self.parse_expr()?);
                        self.expect(TokenKind::RBracket, RULE)?;
                        Ok(Expr::ArrayRef { name, index })
                    }
                    _ => Ok(Expr::VarRef(name)),
                }
            }
            TokenKind::LParen => {
                self.advance()?;
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, RULE)?;
                Ok(expr)
            }
            TokenKind::IntLit => Ok(Expr::Literal(Literal::Int(self.advance()?.int()))),
            TokenKind::RealLit => Ok(Expr::Literal(Literal::Real(self.advance()?.real()))),
            _ => Err(self.unexpected(
                RULE,
                &[
                    TokenKind::Identifier,
                    TokenKind::LParen,
                    TokenKind::IntLit,
                    TokenKind::RealLit,
                ],
            )),
        }
    }

    /* ----------------- Lookahead plumbing ----------------- */

    fn peek_kind(&self) -> TokenKind {
        self.lexer.peek().kind
    }

    /// Consumes the lookahead token if its kind matches.
    fn eat(&mut self, kind: TokenKind) -> Result<Option<Token>> {
        let token = self.lexer.try_match(kind)?;
        if let Some(ref token) = token {
            self.matched(token);
        }
        Ok(token)
    }

    /// Consumes the lookahead token, which must match, or fails with the
    /// rule's name and the single expected kind.
    fn expect(&mut self, kind: TokenKind, rule: &'static str) -> Result<Token> {
        match self.eat(kind)? {
            Some(token) => Ok(token),
            None => Err(self.unexpected(rule, &[kind])),
        }
    }

    /// Consumes the lookahead token unconditionally. Callers dispatch on
    /// [`Parser::peek_kind`] first.
    fn advance(&mut self) -> Result<Token> {
        let kind = self.peek_kind();
        match self.eat(kind)? {
            Some(token) => Ok(token),
            None => unreachable!("lookahead kind always matches itself"),
        }
    }

    fn unexpected(&self, rule: &'static str, expected: &[TokenKind]) -> Error {
        Error::Unexpected(ParseError {
            rule,
            actual: self.lexer.peek().clone(),
            expected: expected.to_vec(),
        })
    }

    fn rule(&self, production: &str) {
        if self.trace {
            println!("{production}");
        }
    }

    fn matched(&self, token: &Token) {
        if self.trace {
            println!("match {token}");
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[derive(Debug)]
pub enum Error {
    /// The lexer failed while scanning the token after a consumed one.
    Lexer(LexerError),
    Unexpected(ParseError),
}

impl From<LexerError> for Error {
    fn from(error: LexerError) -> Error {
        Error::Lexer(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Lexer(e) => e.fmt(f),
            Error::Unexpected(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for Error {}

/// The next token was outside the active rule's first/follow set.
#[derive(Debug)]
pub struct ParseError {
    pub rule: &'static str,
    pub actual: Token,
    pub expected: Vec<TokenKind>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rule {} at [{}]: found {}, expected ",
            self.rule, self.actual.pos, self.actual
        )?;
        if self.expected.len() > 1 {
            write!(f, "one of ")?;
        }
        for (i, kind) in self.expected.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{kind}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(src: &str) -> Program {
        let lexer = Lexer::new(src).unwrap();
        Parser::new(lexer, false).parse_program().unwrap()
    }

    fn parse_err(src: &str) -> ParseError {
        let lexer = Lexer::new(src).unwrap();
        match Parser::new(lexer, false).parse_program() {
            Err(Error::Unexpected(e)) => e,
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    /// The single statement of the program's compound statement.
    fn main_stmt(src: &str) -> Stmt {
        let program = parse(src);
        let mut stmts = program.block.stmts;
        match stmts.pop() {
            Some(Stmt::Compound(mut inner)) => {
                assert_eq!(inner.len(), 1);
                inner.pop().unwrap()
            }
            other => panic!("expected compound statement, got {other:?}"),
        }
    }

    #[test]
    fn program_shape() {
        let program = parse("program hello; begin end.");
        assert_eq!(program.name, "hello");
        assert!(program.block.is_main);
        assert_eq!(program.block.stmts, [Stmt::Compound(vec![Stmt::Empty])]);
    }

    #[test]
    fn statement_order_matches_source() {
        let program = parse("program t; var a: integer; begin a := 1; a := 2; a := 3 end.");
        let Stmt::Compound(stmts) = &program.block.stmts[1] else {
            panic!("expected compound");
        };
        let values: Vec<i32> = stmts
            .iter()
            .map(|s| match s {
                Stmt::Assign {
                    value: Expr::Literal(Literal::Int(i)),
                    ..
                } => *i,
                other => panic!("unexpected stmt {other:?}"),
            })
            .collect();
        assert_eq!(values, [1, 2, 3]);
    }

    #[test]
    fn var_group_expands_to_one_decl_per_name() {
        let program = parse("program t; var x, y: integer; var r: real; begin end.");
        assert_eq!(
            program.block.stmts[..3],
            [
                Stmt::VarDecl {
                    name: "x".into(),
                    ty: Primitive::Integer
                },
                Stmt::VarDecl {
                    name: "y".into(),
                    ty: Primitive::Integer
                },
                Stmt::VarDecl {
                    name: "r".into(),
                    ty: Primitive::Real
                },
            ],
        );
    }

    #[test]
    fn array_decl_with_signed_bounds() {
        let program = parse("program t; var X: array [-50 .. 50] of integer; begin end.");
        assert_eq!(
            program.block.stmts[0],
            Stmt::ArrayDecl {
                name: "X".into(),
                ty: ArrayType {
                    elem: Primitive::Integer,
                    lo: -50,
                    hi: 50
                },
            },
        );
    }

    #[test]
    fn operators_fold_left() {
        // 1 - 2 - 3 parses as (1 - 2) - 3.
        let stmt = main_stmt("program t; var a: integer; begin a := 1 - 2 - 3 end.");
        let Stmt::Assign { value, .. } = stmt else {
            panic!("expected assignment");
        };
        assert_eq!(
            value,
            binary(
                BinaryOp::Sub,
                binary(
                    BinaryOp::Sub,
                    Expr::Literal(Literal::Int(1)),
                    Expr::Literal(Literal::Int(2)),
                ),
                Expr::Literal(Literal::Int(3)),
            ),
        );
    }

    #[test]
    fn precedence_ladder() {
        // not 1 * 2 + 3 < 4 and 5 = 6 or 7
        // => ((((not 1) * 2 + 3) < 4) and (5 = 6)) or 7
        let stmt = main_stmt(
            "program t; var a: integer; begin a := not 1 * 2 + 3 < 4 and 5 = 6 or 7 end.",
        );
        let Stmt::Assign { value, .. } = stmt else {
            panic!("expected assignment");
        };
        let lhs = match value {
            Expr::Binary {
                op: BinaryOp::Or,
                lhs,
                ..
            } => lhs,
            other => panic!("expected or at the top, got {other:?}"),
        };
        match *lhs {
            Expr::Binary {
                op: BinaryOp::And, ..
            } => {}
            other => panic!("expected and under or, got {other:?}"),
        }
    }

    #[test]
    fn dangling_else_binds_to_innermost_if() {
        let stmt = main_stmt(
            "program t; var x: integer; begin if 1 then if 2 then x := 1 else x := 2 end.",
        );
        let then_body = match stmt {
            Stmt::If {
                then_body,
                else_body: None,
                ..
            } => then_body,
            other => panic!("outer if must have no else, got {other:?}"),
        };
        match *then_body {
            Stmt::If {
                else_body: Some(_), ..
            } => {}
            other => panic!("inner if must own the else, got {other:?}"),
        }
    }

    #[test]
    fn for_downto() {
        let stmt = main_stmt("program t; var i: integer; begin for i := 10 downto 1 do i := i end.");
        let (var, direction) = match stmt {
            Stmt::For { var, direction, .. } => (var, direction),
            other => panic!("expected for, got {other:?}"),
        };
        assert_eq!(var, "i");
        assert_eq!(direction, Direction::Downto);
    }

    #[test]
    fn forward_routine_has_no_body() {
        let program =
            parse("program t; function f(n: integer): integer; forward; begin end.");
        let Stmt::Routine(routine) = &program.block.stmts[0] else {
            panic!("expected routine");
        };
        assert_eq!(routine.name, "f");
        assert_eq!(routine.ret, Some(Primitive::Integer));
        assert!(routine.body.is_none());
    }

    #[test]
    fn routine_local_declarations() {
        let program = parse(
            "program t; \
             procedure p(a: integer; b, c: real); const k = 1; var t: real; begin end; \
             begin p(1, 2.0, 3.0) end.",
        );
        let Stmt::Routine(routine) = &program.block.stmts[0] else {
            panic!("expected routine");
        };
        let tys: Vec<Primitive> = routine.params.iter().map(|p| p.ty).collect();
        assert_eq!(
            tys,
            [Primitive::Integer, Primitive::Real, Primitive::Real]
        );
        let body = routine.body.as_ref().unwrap();
        assert!(!body.is_main);
        assert_eq!(body.stmts.len(), 3); // const, var, compound
    }

    #[test]
    fn array_element_assignment() {
        let stmt = main_stmt(
            "program t; var X: array [0 .. 5] of integer; begin X[2] := 7 end.",
        );
        assert_eq!(
            stmt,
            Stmt::Assign {
                target: Place::Element {
                    name: "X".into(),
                    index: Box::new(Expr::Literal(Literal::Int(2))),
                },
                value: Expr::Literal(Literal::Int(7)),
            },
        );
    }

    #[test]
    fn missing_then_reports_rule_and_expected_set() {
        let err = parse_err("program t; begin if 1 x := 2 end.");
        assert_eq!(err.rule, "IfStmt");
        assert_eq!(err.expected, [TokenKind::Then]);
        assert_eq!(err.actual.kind, TokenKind::Identifier);
    }

    #[test]
    fn statement_error_lists_first_set() {
        let err = parse_err("program t; begin . end.");
        assert_eq!(err.rule, "Stmt");
        assert!(err.expected.contains(&TokenKind::Identifier));
        assert!(err.expected.contains(&TokenKind::If));
    }

    #[test]
    fn empty_statements_between_semicolons() {
        let program = parse("program t; begin ;; end.");
        assert_eq!(
            program.block.stmts,
            [Stmt::Compound(vec![Stmt::Empty, Stmt::Empty, Stmt::Empty])],
        );
    }
}
