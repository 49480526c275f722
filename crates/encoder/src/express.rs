//! Parser for definition templates.
//!
//! Recursive descent: sum -> unit -> primary -> op.
//!
//! ```text
//! sum     := unit ('+' unit)*
//! unit    := ('!' | '+')* primary op*
//! primary := '(' sum ')' | '[' sum? ']' | identifier | string | number
//! op      := '.' identifier | '[' sum ']' | '(' sum? ')'
//! ```

use std::fmt;

/// Prefix operators, a primary expression and postfix operations
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    /// Run of `!` and `+` prefix operators, outermost first
    pub mods: String,
    pub primary: Primary,
    pub ops: Vec<Op>,
}

impl Unit {
    fn bare(primary: Primary) -> Self {
        Self {
            mods: String::new(),
            primary,
            ops: Vec::new(),
        }
    }

    /// Collapse the terms of a sum into one unit
    fn from_terms(mut terms: Vec<Unit>) -> Self {
        if terms.len() == 1 {
            if let Some(term) = terms.pop() {
                return term;
            }
        }
        Self::bare(Primary::Group(terms))
    }

    /// String literal with nothing applied to it
    fn as_plain_string(&self) -> Option<&str> {
        match &self.primary {
            Primary::Str(value) if self.mods.is_empty() && self.ops.is_empty() => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primary {
    /// Terms joined by `+`
    Group(Vec<Unit>),
    Identifier(String),
    Str(String),
    /// `[]` or a one-element array
    Array(Option<Box<Unit>>),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// `()`
    Call,
    /// `(arg)`
    CallWith(Operand),
    /// `[key]` or `.key`
    Get(Operand),
}

/// Argument of a call or key of a property access
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Str(String),
    Unit(Box<Unit>),
}

impl Operand {
    fn from_terms(terms: Vec<Unit>) -> Self {
        let unit = Unit::from_terms(terms);
        match unit.as_plain_string() {
            Some(value) => Self::Str(value.to_string()),
            None => Self::Unit(Box::new(unit)),
        }
    }
}

/// Template that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub offset: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

impl std::error::Error for ParseError {}

/// Parse a template into its operation tree
pub fn parse(expr: &str) -> Result<Unit, ParseError> {
    let mut parser = Parser::new(expr);
    let terms = parser.parse_sum()?;
    parser.skip_whitespace();
    if let Some(ch) = parser.peek() {
        return Err(parser.error(format!("Unexpected character {ch:?}")));
    }
    Ok(Unit::from_terms(terms))
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            offset: self.pos,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.bump();
        }
    }

    /// Consume `expected` after optional whitespace
    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("Expected {expected:?}")))
        }
    }

    fn parse_sum(&mut self) -> Result<Vec<Unit>, ParseError> {
        let mut terms = vec![self.parse_unit()?];
        while self.eat('+') {
            terms.push(self.parse_unit()?);
        }
        Ok(terms)
    }

    fn parse_unit(&mut self) -> Result<Unit, ParseError> {
        let mut mods = String::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(ch @ ('!' | '+')) => {
                    mods.push(ch);
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let (primary, mut ops) = self.parse_primary()?;
        while let Some(op) = self.parse_op()? {
            ops.push(op);
        }
        Ok(Unit { mods, primary, ops })
    }

    /// Parse a primary; a parenthesized bare unit is unwrapped and its
    /// operations returned alongside
    fn parse_primary(&mut self) -> Result<(Primary, Vec<Op>), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some('(') => {
                self.pos += 1;
                let mut terms = self.parse_sum()?;
                self.expect(')')?;
                if terms.len() == 1 && terms[0].mods.is_empty() {
                    if let Some(Unit { primary, ops, .. }) = terms.pop() {
                        return Ok((primary, ops));
                    }
                }
                Ok((Primary::Group(terms), Vec::new()))
            }
            Some('[') => {
                self.pos += 1;
                if self.eat(']') {
                    return Ok((Primary::Array(None), Vec::new()));
                }
                let terms = self.parse_sum()?;
                self.expect(']')?;
                let element = Unit::from_terms(terms);
                Ok((Primary::Array(Some(Box::new(element))), Vec::new()))
            }
            Some('"') => Ok((Primary::Str(self.parse_string()?), Vec::new())),
            Some(ch) if ch.is_ascii_digit() || ch == '.' => {
                Ok((Primary::Number(self.parse_number()?), Vec::new()))
            }
            Some(ch) if is_identifier_start(ch) => {
                Ok((Primary::Identifier(self.parse_identifier()), Vec::new()))
            }
            Some(ch) => Err(self.error(format!("Unexpected character {ch:?}"))),
            None => Err(self.error("Unexpected end of input")),
        }
    }

    fn parse_op(&mut self) -> Result<Option<Op>, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some('.') => {
                self.pos += 1;
                self.skip_whitespace();
                match self.peek() {
                    Some(ch) if is_identifier_start(ch) => {
                        Ok(Some(Op::Get(Operand::Str(self.parse_identifier()))))
                    }
                    _ => Err(self.error("Expected property name")),
                }
            }
            Some('[') => {
                self.pos += 1;
                let terms = self.parse_sum()?;
                self.expect(']')?;
                Ok(Some(Op::Get(Operand::from_terms(terms))))
            }
            Some('(') => {
                self.pos += 1;
                if self.eat(')') {
                    return Ok(Some(Op::Call));
                }
                let terms = self.parse_sum()?;
                self.expect(')')?;
                Ok(Some(Op::CallWith(Operand::from_terms(terms))))
            }
            _ => Ok(None),
        }
    }

    fn parse_identifier(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if is_identifier_part(ch)) {
            self.pos += 1;
        }
        self.src[start..self.pos].to_string()
    }

    fn parse_string(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => {
                    if self.bump().is_none() {
                        break;
                    }
                }
                Some(_) => {}
                None => {
                    return Err(ParseError {
                        message: "Unterminated string".to_string(),
                        offset: start,
                    })
                }
            }
        }
        serde_json::from_str(&self.src[start..self.pos]).map_err(|err| ParseError {
            message: format!("Invalid string literal: {err}"),
            offset: start,
        })
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        let start = self.pos;
        self.skip_digits();
        if self.peek() == Some('.') {
            self.pos += 1;
            self.skip_digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some('+' | '-')) {
                self.pos += 1;
            }
            self.skip_digits();
        }
        let text = &self.src[start..self.pos];
        text.parse().map_err(|_| ParseError {
            message: format!("Invalid number {text:?}"),
            offset: start,
        })
    }

    fn skip_digits(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
            self.pos += 1;
        }
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

fn is_identifier_part(ch: char) -> bool {
    is_identifier_start(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ident(name: &str) -> Unit {
        Unit::bare(Primary::Identifier(name.to_string()))
    }

    #[test]
    fn test_parse_identifier_with_ops() {
        let unit = parse("[][\"filter\"][CONSTRUCTOR]").unwrap();
        assert_eq!(unit.primary, Primary::Array(None));
        assert_eq!(
            unit.ops,
            vec![
                Op::Get(Operand::Str("filter".to_string())),
                Op::Get(Operand::Unit(Box::new(ident("CONSTRUCTOR")))),
            ]
        );
    }

    #[test]
    fn test_parse_sum_and_mods() {
        let unit = parse("!![] + +\"1e100\"").unwrap();
        let Primary::Group(terms) = unit.primary else {
            panic!("expected group");
        };
        assert_eq!(terms.len(), 2);
        assert_eq!(terms[0].mods, "!!");
        assert_eq!(terms[1].mods, "+");
        assert_eq!(terms[1].primary, Primary::Str("1e100".to_string()));
    }

    #[test]
    fn test_parenthesized_unit_is_flattened() {
        let unit = parse("(RP_5_N + Date())[\"30\"]").unwrap();
        assert!(matches!(unit.primary, Primary::Group(ref terms) if terms.len() == 2));
        assert_eq!(unit.ops, vec![Op::Get(Operand::Str("30".to_string()))]);

        let unit = parse("(Function())[0]").unwrap();
        assert_eq!(unit.primary, Primary::Identifier("Function".to_string()));
        assert_eq!(
            unit.ops,
            vec![
                Op::Call,
                Op::Get(Operand::Unit(Box::new(Unit::bare(Primary::Number(0.0))))),
            ]
        );
    }

    #[test]
    fn test_parse_dot_and_call() {
        let unit = parse("String.name").unwrap();
        assert_eq!(unit.ops, vec![Op::Get(Operand::Str("name".to_string()))]);

        let unit = parse("(211)[TO_STRING](\"31\")[1]").unwrap();
        assert_eq!(unit.primary, Primary::Number(211.0));
        assert_eq!(unit.ops.len(), 3);
        assert_eq!(unit.ops[1], Op::CallWith(Operand::Str("31".to_string())));
    }

    #[test]
    fn test_parse_string_escapes() {
        let unit = parse(r#""return\"\\u0041\"""#).unwrap();
        assert_eq!(unit.primary, Primary::Str("return\"\\u0041\"".to_string()));
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse("1e1000").unwrap().primary, Primary::Number(f64::INFINITY));
        assert_eq!(parse(".5").unwrap().primary, Primary::Number(0.5));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse("").is_err());
        assert!(parse("[").is_err());
        assert!(parse("a b").is_err());
        assert!(parse("\"open").is_err());
        assert!(parse("#").is_err());
    }
}
