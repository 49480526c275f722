use crate::buffer::ScrewBuffer;
use crate::config::EncoderConfig;
use crate::definitions::{find_definition, Definition, Definitions, Entry, Tables};
use crate::error::{EncoderError, Result};
use crate::solution::{Level, Solution};
use regex::Regex;
use screw_features::Mask;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolver and compiler bound to one capability mask.
///
/// Every solution is computed at most once per encoder. Definitions with a
/// single unconditional form are resolved by an inner encoder with no
/// capabilities, so they come out the same under every mask.
#[derive(Debug)]
pub struct Encoder {
    mask: Mask,
    tables: Arc<Tables>,
    config: EncoderConfig,
    char_cache: HashMap<char, Arc<Solution>>,
    code_unit_cache: HashMap<u16, Arc<Solution>>,
    const_cache: HashMap<String, Arc<Solution>>,
    complex_cache: HashMap<String, Option<Arc<Solution>>>,
    simple_cache: HashMap<&'static str, Arc<Solution>>,
    stack: Vec<String>,
    token_pattern: Option<Regex>,
    static_encoder: Option<Box<Encoder>>,
}

impl Encoder {
    /// Create an encoder over the builtin tables with default config
    pub fn new(mask: Mask) -> Self {
        Self::with_tables(mask, Tables::builtin(), EncoderConfig::default())
    }

    pub fn with_tables(mask: Mask, tables: Arc<Tables>, config: EncoderConfig) -> Self {
        log::debug!("Creating encoder for mask {mask}");
        Self {
            mask,
            tables,
            config,
            char_cache: HashMap::new(),
            code_unit_cache: HashMap::new(),
            const_cache: HashMap::new(),
            complex_cache: HashMap::new(),
            simple_cache: HashMap::new(),
            stack: Vec::new(),
            token_pattern: None,
            static_encoder: None,
        }
    }

    pub fn mask(&self) -> Mask {
        self.mask
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Replace the assembly config. Cached solutions stay valid.
    pub fn set_config(&mut self, config: EncoderConfig) {
        if let Some(encoder) = self.static_encoder.as_mut() {
            encoder.set_config(config.clone());
        }
        self.config = config;
    }

    pub(crate) fn tables(&self) -> Arc<Tables> {
        Arc::clone(&self.tables)
    }

    /// Key currently being resolved
    pub(crate) fn context(&self) -> Option<String> {
        self.stack.last().cloned()
    }

    pub(crate) fn has_features(&self, mask: Mask) -> bool {
        self.mask.includes(mask)
    }

    pub(crate) fn too_complex(&self) -> EncoderError {
        let context = self
            .context()
            .map(|key| format!(" in the definition of {key}"))
            .unwrap_or_default();
        EncoderError::UnencodableInput(format!("String too complex{context}"))
    }

    /// Encode `input` as a restricted-alphabet expression evaluating to it.
    ///
    /// With `wrap_for_evaluation` the input is treated as code and the output
    /// runs it through `Function(…)()`.
    pub fn encode(&mut self, input: &str, wrap_for_evaluation: bool) -> Result<String> {
        log::debug!(
            "Encoding {} characters under mask {}",
            input.chars().count(),
            self.mask
        );
        let optimize = self.config.optimize;
        let output = self
            .replace_string(input, optimize, false, true, usize::MAX)?
            .ok_or_else(|| {
                EncoderError::UnencodableInput(format!(
                    "input needs more than {} fragments",
                    self.config.capacity()
                ))
            })?;
        if !wrap_for_evaluation {
            return Ok(output);
        }
        let function = self.resolve_constant("Function")?;
        Ok(format!("{function}({output})()"))
    }

    /// Run `resolver` with `name` pushed on the resolution stack
    pub(crate) fn call_resolver<T>(
        &mut self,
        name: String,
        resolver: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if let Some(start) = self.stack.iter().position(|key| *key == name) {
            let mut chain = self.stack[start..].to_vec();
            chain.push(name);
            return Err(EncoderError::CircularDefinition {
                chain: chain.join(" < "),
            });
        }
        self.stack.push(name);
        let result = resolver(self);
        self.stack.pop();
        result
    }

    /// Run `f` on the encoder without capabilities
    pub(crate) fn with_static<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.mask.is_empty() {
            return f(self);
        }
        let tables = Arc::clone(&self.tables);
        let config = self.config.clone();
        let encoder = self
            .static_encoder
            .get_or_insert_with(|| Box::new(Self::with_tables(Mask::EMPTY, tables, config)));
        f(encoder)
    }

    /// Resolve a definition, or `None` when its output would exceed `max_length`
    pub(crate) fn resolve_within(
        &mut self,
        definition: &Definition,
        default_level: Level,
        subject: Option<char>,
        max_length: usize,
    ) -> Result<Option<Solution>> {
        match definition {
            Definition::Expr(expr) => {
                let replacement = self.replace_expr_within(expr.text, expr.optimize, max_length)?;
                Ok(replacement
                    .map(|text| Solution::new(text, expr.level.unwrap_or(default_level))))
            }
            Definition::Nested(entries) => match find_definition(entries, self.mask) {
                Some(inner) => self.resolve_within(inner, default_level, subject, max_length),
                None => Err(EncoderError::syntax(
                    "No applicable nested definition",
                    self.context(),
                )),
            },
            Definition::Digit(digit) => {
                Ok(Some(Solution::new(encode_digit(*digit), Level::Numeric)))
            }
            Definition::CharAt(char_at) => self.resolve_char_at(char_at, max_length),
            Definition::Fallback => match subject {
                Some(ch) => self.default_resolve_character(ch).map(Some),
                None => Err(EncoderError::syntax(
                    "Fallback definition outside a character",
                    self.context(),
                )),
            },
        }
    }

    pub(crate) fn resolve(
        &mut self,
        definition: &Definition,
        default_level: Level,
        subject: Option<char>,
    ) -> Result<Solution> {
        self.resolve_within(definition, default_level, subject, usize::MAX)?
            .ok_or_else(|| self.too_complex())
    }

    /// Resolve every satisfiable entry and keep the shortest; ties go to the
    /// earliest entry
    fn find_optimal_solution(
        &mut self,
        entries: &[Entry],
        default_level: Level,
        subject: Option<char>,
    ) -> Result<Option<Solution>> {
        let mut best: Option<Solution> = None;
        for (index, entry) in entries.iter().enumerate() {
            if !self.has_features(entry.mask) {
                continue;
            }
            let max_length = best
                .as_ref()
                .map_or(usize::MAX, |best| best.len().saturating_sub(1));
            let candidate =
                self.resolve_within(&entry.definition, default_level, subject, max_length)?;
            if let Some(mut solution) = candidate {
                if best.as_ref().map_or(true, |best| solution.len() < best.len()) {
                    solution.entry_index = Some(index);
                    best = Some(solution);
                }
            }
        }
        Ok(best)
    }

    pub fn resolve_character(&mut self, ch: char) -> Result<Arc<Solution>> {
        if let Some(solution) = self.char_cache.get(&ch) {
            return Ok(Arc::clone(solution));
        }
        let tables = self.tables();
        let solution = match tables.characters.get(&ch) {
            Some(Definitions::Static(_)) if !self.mask.is_empty() => {
                self.with_static(|encoder| encoder.resolve_character(ch))?
            }
            Some(Definitions::Static(definition)) => {
                let solution = self.call_resolver(quote(ch), |encoder| {
                    encoder.resolve(definition, Level::String, Some(ch))
                })?;
                Arc::new(solution)
            }
            definitions => {
                let solution = self.call_resolver(quote(ch), |encoder| {
                    let optimal = match definitions {
                        Some(Definitions::Entries(entries)) => {
                            encoder.find_optimal_solution(entries, Level::String, Some(ch))?
                        }
                        _ => None,
                    };
                    match optimal {
                        Some(solution) => Ok(solution),
                        None => encoder.default_resolve_character(ch),
                    }
                })?;
                Arc::new(solution)
            }
        };
        log::trace!(
            "Resolved {ch:?} under mask {}: {} chars",
            self.mask,
            solution.len()
        );
        self.char_cache.insert(ch, Arc::clone(&solution));
        Ok(solution)
    }

    /// Resolve one UTF-16 code unit of a character outside the BMP
    pub(crate) fn resolve_code_unit(&mut self, unit: u16) -> Result<Arc<Solution>> {
        if let Some(solution) = self.code_unit_cache.get(&unit) {
            return Ok(Arc::clone(solution));
        }
        let solution = self.call_resolver(format!("\"\\u{unit:04x}\""), |encoder| {
            encoder.encode_code_point(u32::from(unit))
        })?;
        let solution = Arc::new(solution);
        self.code_unit_cache.insert(unit, Arc::clone(&solution));
        Ok(solution)
    }

    pub fn resolve_constant(&mut self, name: &str) -> Result<Arc<Solution>> {
        if let Some(solution) = self.const_cache.get(name) {
            return Ok(Arc::clone(solution));
        }
        let tables = self.tables();
        let Some(definitions) = tables.constants.get(name) else {
            return Err(EncoderError::UndefinedReference {
                name: name.to_string(),
                context: self.context(),
            });
        };
        let solution = match definitions {
            Definitions::Static(_) if !self.mask.is_empty() => {
                self.with_static(|encoder| encoder.resolve_constant(name))?
            }
            Definitions::Static(definition) => {
                let solution = self.call_resolver(name.to_string(), |encoder| {
                    encoder.resolve(definition, Level::Object, None)
                })?;
                Arc::new(solution)
            }
            Definitions::Entries(entries) => {
                let context = self.context();
                let solution = self.call_resolver(name.to_string(), |encoder| {
                    encoder.find_optimal_solution(entries, Level::Object, None)
                })?;
                let solution = solution.ok_or_else(|| EncoderError::UndefinedReference {
                    name: name.to_string(),
                    context,
                })?;
                Arc::new(solution)
            }
        };
        log::trace!(
            "Resolved {name} under mask {}: {} chars",
            self.mask,
            solution.len()
        );
        self.const_cache
            .insert(name.to_string(), Arc::clone(&solution));
        Ok(solution)
    }

    /// Resolve a multi-character substring; `None` if no definition applies
    pub fn resolve_complex(&mut self, complex: &str) -> Result<Option<Arc<Solution>>> {
        if let Some(solution) = self.complex_cache.get(complex) {
            return Ok(solution.clone());
        }
        let tables = self.tables();
        let definition = tables
            .complex_entries(complex)
            .and_then(|entries| find_definition(entries, self.mask));
        let solution = match definition {
            Some(definition) => {
                let solution = self.call_resolver(quote(complex), |encoder| {
                    encoder.resolve(definition, Level::String, None)
                })?;
                Some(Arc::new(solution))
            }
            None => None,
        };
        self.complex_cache
            .insert(complex.to_string(), solution.clone());
        Ok(solution)
    }

    /// Resolve one of the literals `false`, `true`, `undefined`, `NaN`, `Infinity`
    pub fn resolve_simple(&mut self, name: &str) -> Result<Arc<Solution>> {
        if !self.mask.is_empty() {
            return self.with_static(|encoder| encoder.resolve_simple(name));
        }
        if let Some(solution) = self.simple_cache.get(name) {
            return Ok(Arc::clone(solution));
        }
        let tables = self.tables();
        let Some(simple) = tables.simple(name) else {
            return Err(EncoderError::UndefinedReference {
                name: name.to_string(),
                context: self.context(),
            });
        };
        let replacement =
            self.call_resolver(name.to_string(), |encoder| encoder.replace_expr(simple.expr))?;
        let solution = Arc::new(Solution::new(replacement, simple.level));
        self.simple_cache.insert(simple.name, Arc::clone(&solution));
        Ok(solution)
    }

    pub(crate) fn is_simple(&self, name: &str) -> bool {
        self.tables.simple(name).is_some()
    }

    pub(crate) fn is_constant(&self, name: &str) -> bool {
        self.tables.constants.contains_key(name)
    }

    /// Tokenizer for string literals: simple literals, complex substrings
    /// with an applicable definition, then single characters
    fn token_pattern(&mut self) -> Result<Regex> {
        if let Some(pattern) = &self.token_pattern {
            return Ok(pattern.clone());
        }
        let simple = self
            .tables
            .simple
            .iter()
            .map(|simple| simple.name)
            .collect::<Vec<_>>()
            .join("|");
        let mut pattern = format!("({simple})|");
        for (complex, entries) in &self.tables.complex {
            if find_definition(entries, self.mask).is_some() {
                pattern.push_str(&regex::escape(complex));
                pattern.push('|');
            }
        }
        pattern.push_str("((?s:.))");
        let regex = Regex::new(&pattern).map_err(|err| {
            EncoderError::syntax(format!("Invalid token pattern: {err}"), None)
        })?;
        self.token_pattern = Some(regex.clone());
        Ok(regex)
    }

    /// Encode a string value; `None` when the output would exceed
    /// `max_length` or the buffer capacity
    pub(crate) fn replace_string(
        &mut self,
        text: &str,
        optimize: bool,
        bond: bool,
        force_string: bool,
        max_length: usize,
    ) -> Result<Option<String>> {
        let pattern = self.token_pattern()?;
        let mut buffer = ScrewBuffer::new(bond, force_string, &self.config, optimize);
        for captures in pattern.captures_iter(text) {
            if buffer.length() > max_length {
                return Ok(None);
            }
            let appended = if let Some(simple) = captures.get(1) {
                let solution = self.resolve_simple(simple.as_str())?;
                buffer.append(solution)
            } else if let Some(ch) = captures.get(2).and_then(|m| m.as_str().chars().next()) {
                self.append_character(&mut buffer, ch)?
            } else {
                let complex = &captures[0];
                match self.resolve_complex(complex)? {
                    Some(solution) => buffer.append(solution),
                    None => {
                        let mut appended = true;
                        for ch in complex.chars() {
                            appended = appended && self.append_character(&mut buffer, ch)?;
                        }
                        appended
                    }
                }
            };
            if !appended {
                return Ok(None);
            }
        }
        let assembly = buffer.assemble();
        Ok((assembly.text.len() <= max_length).then_some(assembly.text))
    }

    fn append_character(&mut self, buffer: &mut ScrewBuffer, ch: char) -> Result<bool> {
        if u32::from(ch) <= 0xffff {
            let solution = self.resolve_character(ch)?;
            return Ok(buffer.append(solution));
        }
        let mut units = [0u16; 2];
        for &unit in ch.encode_utf16(&mut units).iter() {
            let solution = self.resolve_code_unit(unit)?;
            if !buffer.append(solution) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Restricted-alphabet text for a decimal digit
pub fn encode_digit(digit: u8) -> String {
    match digit {
        0 => "+[]".to_string(),
        1 => "+!![]".to_string(),
        _ => {
            let mut result = "!![]".to_string();
            for _ in 1..digit {
                result.push_str("+!![]");
            }
            result
        }
    }
}

/// Stack name of a character or substring key
fn quote(key: impl serde::Serialize + std::fmt::Debug) -> String {
    serde_json::to_string(&key).unwrap_or_else(|_| format!("{key:?}"))
}
