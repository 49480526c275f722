//! Emission of parsed templates in the restricted alphabet.
//!
//! Every step takes a maximum length. A step that cannot stay within it
//! yields `None`, which discards the candidate being compiled; errors are
//! reserved for broken templates.

use crate::encoder::Encoder;
use crate::error::{EncoderError, Result};
use crate::express::{self, Op, Operand, Primary, Unit};
use crate::numeric::format_number;

/// How tightly the surrounding syntax binds to an emitted expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BondStrength {
    /// Nothing binds; any expression is safe
    None,
    /// An operand of `+` or of a prefix operator
    Weak,
    /// Followed by a call or property access
    Strong,
}

impl Encoder {
    /// Compile a template to restricted-alphabet text
    pub fn replace_expr(&mut self, expr: &str) -> Result<String> {
        self.replace_expr_within(expr, false, usize::MAX)?
            .ok_or_else(|| self.too_complex())
    }

    pub(crate) fn replace_expr_within(
        &mut self,
        expr: &str,
        optimize: bool,
        max_length: usize,
    ) -> Result<Option<String>> {
        let unit = express::parse(expr)
            .map_err(|err| EncoderError::syntax(format!("Syntax error: {err}"), self.context()))?;
        self.replace_unit(&unit, false, max_length, optimize)
    }

    fn replace_unit(
        &mut self,
        unit: &Unit,
        bond: bool,
        max_length: usize,
        optimize: bool,
    ) -> Result<Option<String>> {
        let mods = unit.mods.as_str();
        let grouping_required = bond && mods.starts_with('+');
        let max_core_length = if mods.is_empty() {
            max_length
        } else {
            max_length.saturating_sub(mods.len() + if grouping_required { 2 } else { 0 })
        };
        let primary_bond = if !unit.ops.is_empty() {
            BondStrength::Strong
        } else if bond || !mods.is_empty() {
            BondStrength::Weak
        } else {
            BondStrength::None
        };
        let Some(mut output) =
            self.replace_primary(&unit.primary, primary_bond, max_core_length, optimize)?
        else {
            return Ok(None);
        };
        for op in &unit.ops {
            // Property keys are converted by the engine, so `"1"` may stay a
            // number there; call arguments are passed as they are
            let (open, close, operand, force_string) = match op {
                Op::Call => {
                    output.push_str("()");
                    if output.len() > max_core_length {
                        return Ok(None);
                    }
                    continue;
                }
                Op::CallWith(operand) => ('(', ')', operand, true),
                Op::Get(operand) => ('[', ']', operand, false),
            };
            let max_op_length = max_core_length.saturating_sub(output.len() + 2);
            let op_output = match operand {
                Operand::Str(value) => self.replace_string_operand(
                    value,
                    optimize,
                    false,
                    force_string,
                    max_op_length,
                )?,
                Operand::Unit(inner) => self.replace_unit(inner, false, max_op_length, optimize)?,
            };
            let Some(op_output) = op_output else {
                return Ok(None);
            };
            output.push(open);
            output.push_str(&op_output);
            output.push(close);
        }
        if !mods.is_empty() {
            output = format!("{mods}{output}");
            if grouping_required {
                output = format!("({output})");
            }
        }
        Ok(Some(output))
    }

    fn replace_primary(
        &mut self,
        primary: &Primary,
        bond: BondStrength,
        max_length: usize,
        optimize: bool,
    ) -> Result<Option<String>> {
        let output = match primary {
            Primary::Group(terms) => {
                let count = terms.len();
                let mut max_core_length = if bond == BondStrength::None {
                    max_length
                } else {
                    max_length.saturating_sub(2)
                };
                let mut output = String::new();
                for (index, term) in terms.iter().enumerate() {
                    // Each remaining term needs at least a plus sign and two characters
                    let max_term_length = max_core_length.saturating_sub(3 * (count - index - 1));
                    let Some(term_output) =
                        self.replace_unit(term, index > 0, max_term_length, optimize)?
                    else {
                        return Ok(None);
                    };
                    if index > 0 {
                        output.push('+');
                    }
                    output.push_str(&term_output);
                    max_core_length = max_core_length.saturating_sub(term_output.len() + 1);
                }
                if bond != BondStrength::None {
                    output = format!("({output})");
                }
                output
            }
            Primary::Identifier(name) => self.replace_identifier(name, bond)?,
            Primary::Str(value) => {
                let bonded = bond != BondStrength::None;
                return self.replace_string_operand(value, optimize, bonded, true, max_length);
            }
            Primary::Array(None) => "[]".to_string(),
            Primary::Array(Some(element)) => {
                let Some(inner) =
                    self.replace_unit(element, false, max_length.saturating_sub(2), optimize)?
                else {
                    return Ok(None);
                };
                format!("[{inner}]")
            }
            Primary::Number(value) => self.replace_number(*value, bond)?,
        };
        Ok((output.len() <= max_length).then_some(output))
    }

    fn replace_identifier(&mut self, name: &str, bond: BondStrength) -> Result<String> {
        let solution = if self.is_constant(name) {
            self.resolve_constant(name)?
        } else if self.is_simple(name) {
            self.resolve_simple(name)?
        } else {
            return Err(EncoderError::UndefinedReference {
                name: name.to_string(),
                context: self.context(),
            });
        };
        let grouping = (bond != BondStrength::None && solution.outer_plus)
            || (bond == BondStrength::Strong && solution.replacement.starts_with('!'));
        Ok(if grouping {
            format!("({solution})")
        } else {
            solution.replacement.clone()
        })
    }

    fn replace_number(&mut self, value: f64, bond: BondStrength) -> Result<String> {
        let text = format_number(value);
        let mut output = self.replace_static_string(&text)?;
        if text.len() > 1 {
            output = format!("+({output})");
        }
        if bond != BondStrength::None {
            output = format!("({output})");
        }
        Ok(output)
    }

    /// Encode digits and number punctuation with no capabilities
    fn replace_static_string(&mut self, text: &str) -> Result<String> {
        self.with_static(|encoder| encoder.replace_string(text, false, false, false, usize::MAX))?
            .ok_or_else(|| self.too_complex())
    }

    /// String literal of a template. Without a budget a `None` from the
    /// buffer means the string cannot be encoded at all.
    fn replace_string_operand(
        &mut self,
        value: &str,
        optimize: bool,
        bond: bool,
        force_string: bool,
        max_length: usize,
    ) -> Result<Option<String>> {
        let output = self.replace_string(value, optimize, bond, force_string, max_length)?;
        if output.is_none() && max_length == usize::MAX {
            return Err(self.too_complex());
        }
        Ok(output)
    }
}
