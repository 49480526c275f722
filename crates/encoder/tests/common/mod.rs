//! Evaluator for restricted-alphabet output, modelled on a V8 engine
//! (Node.js): native functions print as `function name() { [native code] }`,
//! `Function()` prints as `function anonymous(\n) {\n\n}`, and `atob`, `btoa`,
//! `Array.prototype.fill` and `Array.prototype.entries` exist. There is no
//! `self`.
//!
//! Only the builtins that encoder definitions reach are modelled; anything
//! else is an evaluation error.

#![allow(dead_code)]

/// Fixed result of `Date()`
pub const DATE_TEXT: &str = "Thu Jan 01 1970 00:00:00 GMT+0000 (Coordinated Universal Time)";

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Vec<Value>),
    Object(Object),
    Function(Function),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Plain,
    ArrayIterator,
    RegExp(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Native {
    ArrayCtor,
    BooleanCtor,
    DateCtor,
    FunctionCtor,
    NumberCtor,
    ObjectCtor,
    RegExpCtor,
    StringCtor,
    ArraySlice,
    Call,
    Entries,
    Fill,
    Filter,
    Fontcolor,
    Italics,
    NumberToString,
    ObjectToString,
    StringSlice,
    Atob,
    Btoa,
    Escape,
    Unescape,
}

impl Native {
    fn name(self) -> &'static str {
        match self {
            Native::ArrayCtor => "Array",
            Native::BooleanCtor => "Boolean",
            Native::DateCtor => "Date",
            Native::FunctionCtor => "Function",
            Native::NumberCtor => "Number",
            Native::ObjectCtor => "Object",
            Native::RegExpCtor => "RegExp",
            Native::StringCtor => "String",
            Native::ArraySlice | Native::StringSlice => "slice",
            Native::Call => "call",
            Native::Entries => "entries",
            Native::Fill => "fill",
            Native::Filter => "filter",
            Native::Fontcolor => "fontcolor",
            Native::Italics => "italics",
            Native::NumberToString | Native::ObjectToString => "toString",
            Native::Atob => "atob",
            Native::Btoa => "btoa",
            Native::Escape => "escape",
            Native::Unescape => "unescape",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Native(Native),
    /// Created with `Function(body)`
    Anonymous(String),
}

/// A function value; methods read off a value keep it as their receiver
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    body: Body,
    this: Option<Box<Value>>,
}

impl Function {
    fn native(native: Native) -> Value {
        Value::Function(Function {
            body: Body::Native(native),
            this: None,
        })
    }

    fn method(native: Native, this: &Value) -> Value {
        Value::Function(Function {
            body: Body::Native(native),
            this: Some(Box::new(this.clone())),
        })
    }

    fn name(&self) -> &str {
        match &self.body {
            Body::Native(native) => native.name(),
            Body::Anonymous(_) => "anonymous",
        }
    }

    fn source(&self) -> String {
        match &self.body {
            Body::Native(native) => format!("function {}() {{ [native code] }}", native.name()),
            Body::Anonymous(body) => format!("function anonymous(\n) {{\n{body}\n}}"),
        }
    }

    fn invoke(&self, this: Value, args: Vec<Value>) -> Result<Value, String> {
        let native = match &self.body {
            Body::Anonymous(body) => return run_body(body),
            Body::Native(native) => *native,
        };
        let arg = |index: usize| args.get(index).cloned().unwrap_or(Value::Undefined);
        match native {
            Native::Call => {
                let target = match self.this.as_deref() {
                    Some(Value::Function(target)) => target.clone(),
                    other => return Err(format!("call on {other:?}")),
                };
                target.invoke(arg(0), args.iter().skip(1).cloned().collect())
            }
            Native::ArraySlice => {
                let items = match this {
                    Value::Array(items) => items,
                    Value::Str(text) => text.chars().map(|ch| Value::Str(ch.to_string())).collect(),
                    other => return Err(format!("Array slice on {other:?}")),
                };
                let (start, end) = slice_bounds(items.len(), &args);
                Ok(Value::Array(items[start..end].to_vec()))
            }
            Native::StringSlice => {
                let chars: Vec<char> = this.to_js_string().chars().collect();
                let (start, end) = slice_bounds(chars.len(), &args);
                Ok(Value::Str(chars[start..end].iter().collect()))
            }
            Native::Entries => Ok(Value::Object(Object::ArrayIterator)),
            Native::Fontcolor => Ok(Value::Str(format!(
                "<font color=\"{}\">{}</font>",
                arg(0).to_js_string(),
                this.to_js_string()
            ))),
            Native::Italics => Ok(Value::Str(format!("<i>{}</i>", this.to_js_string()))),
            Native::NumberToString => {
                let Value::Number(number) = this else {
                    return Err(format!("Number toString on {this:?}"));
                };
                let radix = match arg(0) {
                    Value::Undefined => 10.0,
                    radix => radix.to_number(),
                };
                Ok(Value::Str(radix_string(number, radix)?))
            }
            Native::ObjectToString => Ok(Value::Str(match this {
                Value::Undefined => "[object Undefined]".to_string(),
                other => other.to_js_string(),
            })),
            Native::FunctionCtor => {
                let body = args.last().map(Value::to_js_string).unwrap_or_default();
                Ok(Value::Function(Function {
                    body: Body::Anonymous(body),
                    this: None,
                }))
            }
            Native::RegExpCtor if args.is_empty() => {
                Ok(Value::Object(Object::RegExp("(?:)".to_string())))
            }
            Native::DateCtor => Ok(Value::Str(DATE_TEXT.to_string())),
            Native::Atob => Ok(Value::Str(atob(&arg(0).to_js_string())?)),
            Native::Btoa => Ok(Value::Str(btoa(&arg(0).to_js_string())?)),
            Native::Escape => Ok(Value::Str(escape(&arg(0).to_js_string()))),
            Native::Unescape => Ok(Value::Str(unescape(&arg(0).to_js_string())?)),
            other => Err(format!("calling {} is not supported", other.name())),
        }
    }
}

/// Body of a function created with `Function(…)`
fn run_body(body: &str) -> Result<Value, String> {
    let expr = body
        .strip_prefix("return")
        .ok_or_else(|| format!("unsupported function body {body:?}"))?
        .trim();
    match expr {
        "{}" => Ok(Value::Object(Object::Plain)),
        "Date" => Ok(Function::native(Native::DateCtor)),
        "atob" => Ok(Function::native(Native::Atob)),
        "btoa" => Ok(Function::native(Native::Btoa)),
        "escape" => Ok(Function::native(Native::Escape)),
        "unescape" => Ok(Function::native(Native::Unescape)),
        _ if expr.len() >= 2 && expr.starts_with('/') && expr.ends_with('/') => Ok(
            Value::Object(Object::RegExp(expr[1..expr.len() - 1].to_string())),
        ),
        _ if expr.starts_with('"') => Ok(Value::Str(parse_string_literal(expr)?)),
        _ => Err(format!("unsupported function body {body:?}")),
    }
}

fn parse_string_literal(literal: &str) -> Result<String, String> {
    let inner = literal
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(|| format!("bad string literal {literal:?}"))?;
    let mut out = String::new();
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16).map_err(|err| err.to_string())?;
                out.push(char::from_u32(code).ok_or("lone surrogate")?);
            }
            Some(other) => out.push(other),
            None => return Err("dangling escape".to_string()),
        }
    }
    Ok(out)
}

fn slice_bounds(len: usize, args: &[Value]) -> (usize, usize) {
    let relative = |value: Option<&Value>, default: usize| match value {
        None | Some(Value::Undefined) => default,
        Some(value) => {
            let n = value.to_number();
            let n = if n.is_nan() { 0.0 } else { n.trunc() };
            if n < 0.0 {
                (len as f64 + n).max(0.0) as usize
            } else {
                (n as usize).min(len)
            }
        }
    };
    let start = relative(args.first(), 0);
    let end = relative(args.get(1), len);
    (start, end.max(start))
}

fn radix_string(number: f64, radix: f64) -> Result<String, String> {
    if radix == 10.0 {
        return Ok(number_to_string(number));
    }
    if !(2.0..=36.0).contains(&radix) || number.fract() != 0.0 || number < 0.0 {
        return Err(format!("unsupported toString({radix}) of {number}"));
    }
    let radix = radix as u64;
    let mut n = number as u64;
    let mut digits = Vec::new();
    loop {
        digits.push(char::from_digit((n % radix) as u32, radix as u32).ok_or("digit")?);
        n /= radix;
        if n == 0 {
            break;
        }
    }
    Ok(digits.into_iter().rev().collect())
}

fn atob(text: &str) -> Result<String, String> {
    let mut data: Vec<u8> = text
        .bytes()
        .filter(|byte| !b" \t\n\x0c\r".contains(byte))
        .collect();
    if data.len() % 4 == 0 {
        for _ in 0..2 {
            if data.last() == Some(&b'=') {
                data.pop();
            }
        }
    }
    if data.len() % 4 == 1 {
        return Err(format!("atob: bad length of {text:?}"));
    }
    let mut out = String::new();
    let mut bits = 0u32;
    let mut count = 0;
    for byte in data {
        let value = BASE64
            .iter()
            .position(|&b| b == byte)
            .ok_or_else(|| format!("atob: bad character in {text:?}"))?;
        bits = ((bits << 6) | value as u32) & 0xff_ffff;
        count += 6;
        if count >= 8 {
            count -= 8;
            out.push(char::from(((bits >> count) & 0xff) as u8));
        }
    }
    Ok(out)
}

fn btoa(text: &str) -> Result<String, String> {
    let bytes = text
        .chars()
        .map(|ch| u8::try_from(u32::from(ch)).map_err(|_| format!("btoa: {ch:?}")))
        .collect::<Result<Vec<u8>, String>>()?;
    let mut out = String::new();
    for chunk in bytes.chunks(3) {
        let bits = chunk
            .iter()
            .enumerate()
            .fold(0u32, |bits, (index, &byte)| bits | u32::from(byte) << (16 - 8 * index));
        for index in 0..4 {
            if index <= chunk.len() {
                out.push(char::from(BASE64[((bits >> (18 - 6 * index)) & 0x3f) as usize]));
            } else {
                out.push('=');
            }
        }
    }
    Ok(out)
}

fn escape(text: &str) -> String {
    let mut out = String::new();
    for ch in text.chars() {
        let code = u32::from(ch);
        if ch.is_ascii_alphanumeric() || "@*_+-./".contains(ch) {
            out.push(ch);
        } else if code < 0x100 {
            out.push_str(&format!("%{code:02X}"));
        } else {
            out.push_str(&format!("%u{code:04X}"));
        }
    }
    out
}

fn unescape(text: &str) -> Result<String, String> {
    let chars: Vec<char> = text.chars().collect();
    let hex = |digits: &[char]| -> Option<u32> {
        let digits: String = digits.iter().collect();
        if digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
            u32::from_str_radix(&digits, 16).ok()
        } else {
            None
        }
    };
    let mut out = String::new();
    let mut index = 0;
    while index < chars.len() {
        if chars[index] == '%' {
            if chars.get(index + 1) == Some(&'u') && index + 6 <= chars.len() {
                if let Some(code) = hex(&chars[index + 2..index + 6]) {
                    out.push(char::from_u32(code).ok_or("unescape: lone surrogate")?);
                    index += 6;
                    continue;
                }
            }
            if index + 3 <= chars.len() {
                if let Some(code) = hex(&chars[index + 1..index + 3]) {
                    out.push(char::from_u32(code).ok_or("unescape")?);
                    index += 3;
                    continue;
                }
            }
        }
        out.push(chars[index]);
        index += 1;
    }
    Ok(out)
}

impl Value {
    fn to_primitive(&self) -> Value {
        match self {
            Value::Array(_) | Value::Object(_) | Value::Function(_) => {
                Value::Str(self.to_js_string())
            }
            other => other.clone(),
        }
    }

    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Bool(value) => value.to_string(),
            Value::Number(value) => number_to_string(*value),
            Value::Str(value) => value.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Undefined => String::new(),
                    other => other.to_js_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(Object::Plain) => "[object Object]".to_string(),
            Value::Object(Object::ArrayIterator) => "[object Array Iterator]".to_string(),
            Value::Object(Object::RegExp(source)) => format!("/{source}/"),
            Value::Function(function) => function.source(),
        }
    }

    fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Bool(value) => f64::from(u8::from(*value)),
            Value::Number(value) => *value,
            Value::Str(value) => string_to_number(value),
            _ => self.to_primitive().to_number(),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Bool(value) => *value,
            Value::Number(value) => *value != 0.0 && !value.is_nan(),
            Value::Str(value) => !value.is_empty(),
            Value::Array(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    fn add(&self, other: &Value) -> Value {
        let left = self.to_primitive();
        let right = other.to_primitive();
        if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
            Value::Str(format!("{}{}", left.to_js_string(), right.to_js_string()))
        } else {
            Value::Number(left.to_number() + right.to_number())
        }
    }

    fn constructor(&self) -> Result<Value, String> {
        let native = match self {
            Value::Bool(_) => Native::BooleanCtor,
            Value::Number(_) => Native::NumberCtor,
            Value::Str(_) => Native::StringCtor,
            Value::Array(_) => Native::ArrayCtor,
            Value::Object(Object::RegExp(_)) => Native::RegExpCtor,
            Value::Object(_) => Native::ObjectCtor,
            Value::Function(_) => Native::FunctionCtor,
            Value::Undefined => return Err("constructor of undefined".to_string()),
        };
        Ok(Function::native(native))
    }

    fn get(&self, key: &Value) -> Result<Value, String> {
        let key = key.to_primitive().to_js_string();
        let index = key.parse::<usize>().ok().filter(|index| index.to_string() == key);
        match (self, index) {
            (Value::Undefined, _) => {
                return Err(format!("cannot read property {key:?} of undefined"))
            }
            (Value::Str(value), Some(index)) => {
                return Ok(value
                    .chars()
                    .nth(index)
                    .map_or(Value::Undefined, |ch| Value::Str(ch.to_string())))
            }
            (Value::Array(items), Some(index)) => {
                return Ok(items.get(index).cloned().unwrap_or(Value::Undefined))
            }
            _ => {}
        }
        let method = |native| Ok(Function::method(native, self));
        match (self, key.as_str()) {
            (_, "constructor") => self.constructor(),
            (Value::Str(_), "fontcolor") => method(Native::Fontcolor),
            (Value::Str(_), "italics") => method(Native::Italics),
            (Value::Str(_), "slice") => method(Native::StringSlice),
            (Value::Array(_), "slice") => method(Native::ArraySlice),
            (Value::Array(_), "entries") => method(Native::Entries),
            (Value::Array(_), "fill") => method(Native::Fill),
            (Value::Array(_), "filter") => method(Native::Filter),
            (Value::Number(_), "toString") => method(Native::NumberToString),
            (Value::Object(_), "toString") => method(Native::ObjectToString),
            (Value::Function(_), "call") => method(Native::Call),
            (Value::Function(function), "name") => Ok(Value::Str(function.name().to_string())),
            // Only reached for names that exist on no value, like ""
            (_, "") => Ok(Value::Undefined),
            _ => Err(format!("unsupported property access {key:?} on {self:?}")),
        }
    }

    fn call(&self, args: Vec<Value>) -> Result<Value, String> {
        match self {
            Value::Function(function) => {
                let this = function.this.as_deref().cloned().unwrap_or(Value::Undefined);
                function.invoke(this, args)
            }
            other => Err(format!("{other:?} is not a function")),
        }
    }
}

fn string_to_number(text: &str) -> f64 {
    let text = text.trim();
    match text {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        // Rust also reads "inf" and "nan", which JavaScript does not
        _ if text.chars().any(|ch| ch.is_ascii_alphabetic() && !"eE".contains(ch)) => f64::NAN,
        _ => text.parse().unwrap_or(f64::NAN),
    }
}

fn number_to_string(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let formatted = format!("{:e}", value.abs());
    let (mantissa, exp) = formatted.split_once('e').unwrap();
    let exp: i32 = exp.parse().unwrap();
    let sign = if value < 0.0 { "-" } else { "" };
    if exp >= 21 {
        format!("{sign}{mantissa}e+{exp}")
    } else if exp <= -7 {
        format!("{sign}{mantissa}e{exp}")
    } else {
        format!("{value}")
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn expect(&mut self, expected: u8) -> Result<(), String> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!(
                "expected {:?} at {}",
                char::from(expected),
                self.pos
            ))
        }
    }

    fn sum(&mut self) -> Result<Value, String> {
        let mut value = self.unary()?;
        while self.peek() == Some(b'+') {
            self.pos += 1;
            let right = self.unary()?;
            value = value.add(&right);
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<Value, String> {
        match self.peek() {
            Some(b'!') => {
                self.pos += 1;
                Ok(Value::Bool(!self.unary()?.truthy()))
            }
            Some(b'+') => {
                self.pos += 1;
                Ok(Value::Number(self.unary()?.to_number()))
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Value, String> {
        let mut value = self.primary()?;
        loop {
            match self.peek() {
                Some(b'[') => {
                    self.pos += 1;
                    let key = self.sum()?;
                    self.expect(b']')?;
                    value = value.get(&key)?;
                }
                Some(b'(') => {
                    self.pos += 1;
                    let args = if self.peek() == Some(b')') {
                        Vec::new()
                    } else {
                        vec![self.sum()?]
                    };
                    self.expect(b')')?;
                    value = value.call(args)?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn primary(&mut self) -> Result<Value, String> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let value = self.sum()?;
                self.expect(b')')?;
                Ok(value)
            }
            Some(b'[') => {
                self.pos += 1;
                if self.peek() == Some(b']') {
                    self.pos += 1;
                    return Ok(Value::Array(Vec::new()));
                }
                let element = self.sum()?;
                self.expect(b']')?;
                Ok(Value::Array(vec![element]))
            }
            other => Err(format!(
                "unexpected {:?} at {}",
                other.map(char::from),
                self.pos
            )),
        }
    }
}

/// Evaluate a restricted-alphabet expression
pub fn eval(source: &str) -> Result<Value, String> {
    let mut parser = Parser {
        src: source.as_bytes(),
        pos: 0,
    };
    let value = parser.sum()?;
    if parser.pos != source.len() {
        return Err(format!("trailing input at {}", parser.pos));
    }
    Ok(value)
}

/// Evaluate and convert the result to a string
pub fn eval_string(source: &str) -> String {
    match eval(source) {
        Ok(value) => value.to_js_string(),
        Err(err) => panic!("evaluation failed: {err}\n{source}"),
    }
}

/// True when `text` only uses the six output characters
pub fn is_restricted(text: &str) -> bool {
    text.chars().all(|ch| "!()+[]".contains(ch))
}

/// Characters whose encodings need no native function output
pub const PLAIN_CHARACTERS: &str = "adefilnrstuyIN0123456789+-.";

/// Characters read from native function text, radix strings, markup
/// helpers and other call results
pub const NATIVE_CHARACTERS: &str = ",hkpqwxz bcgjmovABCDEFGMRSTU(){}[]%<>=/\"?:";

/// Characters without a definition, reached through `unescape`, `atob` or
/// `Function("return\"\\uXXXX\"")()`
pub const FALLBACK_CHARACTERS: &str = "#_~\u{e9}\u{fc}\u{20ac}";

/// Capability sets a V8 engine satisfies. `NODE` claims `NO_SAFARI_LF`,
/// which current V8 no longer has, so line feeds are left out under it.
pub const V8_CAPABILITY_SETS: &[&[&str]] = &[
    &[],
    &["ATOB"],
    &["NODE"],
    &["NO_IE"],
    &["V8_SRC"],
    &["NO_IE_SRC", "FILL"],
    &["NODE", "ATOB", "FILL", "ENTRIES"],
];
