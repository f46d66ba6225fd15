use std::{fmt, iter::Peekable, mem, str::Chars};

use crate::token::{Position, Token, TokenKind, TokenValue, KEYWORDS};

/// The lexer over a source string.
///
/// It keeps exactly one token of lookahead: [`Lexer::peek`] returns the
/// upcoming token without consuming it, and [`Lexer::try_match`] consumes it
/// only if its kind matches. The first token is scanned eagerly on
/// construction, so a malformed leading token surfaces from [`Lexer::new`].
#[derive(Debug)]
pub struct Lexer<'src> {
    iter: Peekable<Chars<'src>>,
    pos: Position,
    next: Token,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Result<Lexer<'src>, LexerError> {
        let mut lexer = Lexer {
            iter: src.chars().peekable(),
            pos: Position::default(),
            next: Token::new(TokenKind::Eoi, Position::default()),
        };
        lexer.next = lexer.read_token()?;
        Ok(lexer)
    }

    /// Returns the upcoming token without consuming it.
    pub fn peek(&self) -> &Token {
        &self.next
    }

    /// Consumes the upcoming token if it has the given kind.
    ///
    /// Scanning the token after the consumed one may itself fail, hence the
    /// nested result.
    pub fn try_match(&mut self, kind: TokenKind) -> Result<Option<Token>, LexerError> {
        if self.next.kind != kind {
            return Ok(None);
        }
        let following = self.read_token()?;
        Ok(Some(mem::replace(&mut self.next, following)))
    }

    /// Returns the next character without consuming it, `'\0'` at the end of
    /// input.
    fn peek_char(&mut self) -> char {
        self.iter.peek().copied().unwrap_or('\0')
    }

    /// Consumes the next character, keeping the position in sync.
    fn bump(&mut self) -> char {
        match self.iter.next() {
            Some('\n') => {
                self.pos.next_line();
                '\n'
            }
            Some(c) => {
                self.pos.advance();
                c
            }
            None => '\0',
        }
    }

    fn read_token(&mut self) -> Result<Token, LexerError> {
        use TokenKind::*;

        // Skip whitespace and brace comments; both may repeat.
        loop {
            match self.peek_char() {
                c if c.is_ascii_whitespace() => {
                    self.bump();
                }
                '{' => {
                    self.bump();
                    loop {
                        match self.peek_char() {
                            '}' => {
                                self.bump();
                                break;
                            }
                            '\0' => {
                                return Err(LexerError::new(
                                    "Unexpected end of file in a comment.",
                                    self.pos,
                                ))
                            }
                            _ => {
                                self.bump();
                            }
                        }
                    }
                }
                _ => break,
            }
        }

        let start = self.pos;
        if self.peek_char() == '\0' {
            return Ok(Token::new(Eoi, start));
        }

        let kind = match self.bump() {
            '+' => Plus,
            '-' => Minus,
            '*' => Star,
            '/' => Slash,
            '=' => Equal,
            ';' => Semicolon,
            ',' => Comma,
            '(' => LParen,
            ')' => RParen,
            '[' => LBracket,
            ']' => RBracket,
            '<' => match self.peek_char() {
                '>' => {
                    self.bump();
                    NotEqual
                }
                '=' => {
                    self.bump();
                    LessEqual
                }
                _ => Less,
            },
            '>' => match self.peek_char() {
                '=' => {
                    self.bump();
                    GreaterEqual
                }
                _ => Greater,
            },
            ':' => match self.peek_char() {
                '=' => {
                    self.bump();
                    Assign
                }
                _ => Colon,
            },
            '.' => match self.peek_char() {
                '.' => {
                    self.bump();
                    DotDot
                }
                _ => Dot,
            },
            '&' => return self.octal_literal(start),
            '$' => return self.hex_literal(start),
            c if c.is_ascii_alphabetic() || c == '_' => return Ok(self.identifier(c, start)),
            c if c.is_ascii_digit() => return self.number(c, start),
            _ => return Err(LexerError::new("Unable to lex next token.", start)),
        };
        Ok(Token::new(kind, start))
    }

    fn identifier(&mut self, first: char, start: Position) -> Token {
        let mut name = String::new();
        name.push(first);
        while self.peek_char().is_ascii_alphanumeric() || self.peek_char() == '_' {
            name.push(self.bump());
        }
        match KEYWORDS.get(name.as_str()) {
            Some(&keyword) => Token::new(keyword, start),
            None => Token::with_value(TokenKind::Identifier, start, TokenValue::Ident(name)),
        }
    }

    /// Decimal integer, continuing into a real literal on `<digits>.<digits>`.
    fn number(&mut self, first: char, start: Position) -> Result<Token, LexerError> {
        let mut int_part = first as i32 - '0' as i32;
        while self.peek_char().is_ascii_digit() {
            let digit = self.bump() as i32 - '0' as i32;
            int_part = int_part.wrapping_mul(10).wrapping_add(digit);
        }

        if self.peek_char() != '.' {
            return Ok(Token::with_value(
                TokenKind::IntLit,
                start,
                TokenValue::Int(int_part),
            ));
        }
        self.bump();

        if !self.peek_char().is_ascii_digit() {
            return Err(LexerError::new(
                "Expected a digit after the dot in a real number.",
                self.pos,
            ));
        }

        let mut value = int_part as f64;
        let mut divider = 10.0;
        while self.peek_char().is_ascii_digit() {
            let digit = self.bump() as u32 - '0' as u32;
            value += digit as f64 / divider;
            divider *= 10.0;
        }
        Ok(Token::with_value(
            TokenKind::RealLit,
            start,
            TokenValue::Real(value),
        ))
    }

    fn octal_literal(&mut self, start: Position) -> Result<Token, LexerError> {
        let mut value: i32 = 0;
        while self.peek_char().is_ascii_digit() {
            if self.peek_char() > '7' {
                return Err(LexerError::new("Invalid octal digit.", self.pos));
            }
            let digit = self.bump() as i32 - '0' as i32;
            value = value.wrapping_mul(8).wrapping_add(digit);
        }
        Ok(Token::with_value(
            TokenKind::IntLit,
            start,
            TokenValue::Int(value),
        ))
    }

    fn hex_literal(&mut self, start: Position) -> Result<Token, LexerError> {
        let mut value: i32 = 0;
        while self.peek_char().is_ascii_alphanumeric() {
            let c = self.peek_char();
            let digit = match c {
                '0'..='9' => c as i32 - '0' as i32,
                'a'..='f' => c as i32 - 'a' as i32 + 10,
                _ => {
                    return Err(LexerError::new(
                        format!("Invalid hex digit: {c}"),
                        self.pos,
                    ))
                }
            };
            self.bump();
            value = value.wrapping_mul(16).wrapping_add(digit);
        }
        Ok(Token::with_value(
            TokenKind::IntLit,
            start,
            TokenValue::Int(value),
        ))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LexerError {
    pub message: String,
    pub position: Position,
}

impl LexerError {
    fn new(message: impl Into<String>, position: Position) -> LexerError {
        LexerError {
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.position, self.message)
    }
}

impl std::error::Error for LexerError {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn drain(src: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(src).unwrap();
        let mut tokens = Vec::new();
        loop {
            let kind = lexer.peek().kind;
            let token = lexer.try_match(kind).unwrap().unwrap();
            if kind == TokenKind::Eoi {
                return tokens;
            }
            tokens.push(token);
        }
    }

    fn kinds(src: &str) -> Vec<TokenKind> {
        drain(src).into_iter().map(|t| t.kind).collect()
    }

    fn int_values(src: &str) -> Vec<i32> {
        drain(src).into_iter().map(|t| t.int()).collect()
    }

    #[test]
    fn identifiers() {
        let tokens = drain("MyVar _MY__VAR_ my_var123");
        let names: Vec<_> = tokens.iter().map(|t| t.ident().to_string()).collect();
        assert_eq!(names, ["MyVar", "_MY__VAR_", "my_var123"]);
    }

    #[test]
    fn operators() {
        use TokenKind::*;
        assert_eq!(
            kinds("+ - * / = < > <> <= >= :="),
            [Plus, Minus, Star, Slash, Equal, Less, Greater, NotEqual, LessEqual, GreaterEqual, Assign],
        );
    }

    #[test]
    fn separators() {
        use TokenKind::*;
        assert_eq!(
            kinds("; :, ... () []"),
            [Semicolon, Colon, Comma, DotDot, Dot, LParen, RParen, LBracket, RBracket],
        );
    }

    #[test]
    fn keywords_are_lowercase_only() {
        use TokenKind::*;
        assert_eq!(
            kinds("program var const begin end Begin PROGRAM"),
            [Program, Var, Const, Begin, End, Identifier, Identifier],
        );
    }

    #[test]
    fn all_keywords() {
        use TokenKind::*;
        assert_eq!(
            kinds(
                "integer real array of program var const begin end function procedure \
                 forward if then else while for do to downto exit break or not and mod div"
            ),
            [
                Integer, Real, Array, Of, Program, Var, Const, Begin, End, Function, Procedure,
                Forward, If, Then, Else, While, For, Do, To, Downto, Exit, Break, Or, Not, And,
                Mod, Div,
            ],
        );
    }

    #[test]
    fn decimal_octal_and_hex_literals() {
        assert_eq!(
            int_values("10 &1234 $a9f8e &0000 $10 &10 0"),
            [10, 668, 696206, 0, 16, 8, 0],
        );
    }

    #[test]
    fn real_literals() {
        let tokens = drain("123.456 0.99");
        let values: Vec<f64> = tokens
            .iter()
            .map(|t| match t.value {
                Some(TokenValue::Real(r)) => r,
                _ => panic!("expected real"),
            })
            .collect();
        assert_eq!(values, [123.456, 0.99]);
    }

    #[test]
    fn real_literal_requires_fraction_digit() {
        let err = Lexer::new("12.x").unwrap_err();
        assert_eq!(err.message, "Expected a digit after the dot in a real number.");
    }

    #[test]
    fn invalid_octal_digit() {
        let err = Lexer::new("&8").unwrap_err();
        assert_eq!(err.message, "Invalid octal digit.");
    }

    #[test]
    fn invalid_hex_digit() {
        let err = Lexer::new("$a9g").unwrap_err();
        assert_eq!(err.message, "Invalid hex digit: g");
    }

    #[test]
    fn comments_are_skipped() {
        use TokenKind::*;
        assert_eq!(kinds("begin { a comment\nover two lines } end"), [Begin, End]);
    }

    #[test]
    fn unterminated_comment() {
        let err = Lexer::new("{ never closed").unwrap_err();
        assert_eq!(err.message, "Unexpected end of file in a comment.");
    }

    #[test]
    fn unknown_character() {
        let err = Lexer::new("#").unwrap_err();
        assert_eq!(err.message, "Unable to lex next token.");
        assert_eq!(err.position, Position { line: 1, col: 1 });
    }

    #[test]
    fn positions_track_lines_and_columns() {
        let tokens = drain("x :=\n  12;");
        let positions: Vec<(u32, u32)> = tokens.iter().map(|t| (t.pos.line, t.pos.col)).collect();
        assert_eq!(positions, [(1, 1), (1, 3), (2, 3), (2, 5)]);
    }

    #[test]
    fn lexing_is_deterministic() {
        let src = "program t; begin writeln($ff + &17 - 1.5) end.";
        assert_eq!(drain(src), drain(src));
    }
}
