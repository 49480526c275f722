//! Code-point based encoders for characters without a dedicated definition.

use crate::definitions::{find_definition, FallbackEncoder};
use crate::encoder::Encoder;
use crate::error::{EncoderError, Result};
use crate::padding::format_indexer;
use crate::solution::{Level, Solution};

const BASE64_ALPHABET_HI_2: [&str; 4] = ["NaN", "false", "truefalse", "0"];

const BASE64_ALPHABET_HI_4: [&str; 16] = [
    "A", "F", "Infinity", "NaNfalse", "S", "W", "a", "false", "i", "n", "r", "true", "y", "0", "4",
    "8",
];

const BASE64_ALPHABET_HI_6: [&str; 64] = [
    "A", "B", "C", "D", "E", "F", "G", "H", "Infinity", "J", "K", "L", "M", "NaN", "O", "P", "Q",
    "R", "S", "T", "U", "V", "W", "X", "Y", "Z", "a", "b", "c", "d", "e", "false", "g", "h", "i",
    "j", "k", "l", "m", "n", "o", "p", "q", "r", "s", "true", "undefined", "v", "w", "x", "y", "z",
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "+", "/",
];

const BASE64_ALPHABET_LO_2: [&str; 4] = ["000", "NaN", "falsefalsefalse", "00f"];

const BASE64_ALPHABET_LO_4: [&str; 16] = [
    "0A",
    "0B",
    "0i",
    "0j",
    "00",
    "01",
    "02",
    "03",
    "04",
    "05",
    "0a",
    "0r",
    "0s",
    "0t",
    "undefinedfalse",
    "0f",
];

const BASE64_ALPHABET_LO_6: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

impl Encoder {
    /// Encode a BMP character through the default fallback encoder
    pub(crate) fn default_resolve_character(&mut self, ch: char) -> Result<Solution> {
        self.encode_code_point(u32::from(ch))
    }

    pub(crate) fn encode_code_point(&mut self, code: u32) -> Result<Solution> {
        let tables = self.tables();
        let entries = if code < 0x100 {
            &tables.default_8_bit
        } else {
            &tables.default_16_bit
        };
        let encoder = *find_definition(entries, self.mask()).ok_or_else(|| {
            EncoderError::syntax("No applicable default character encoder", self.context())
        })?;
        let replacement = match encoder {
            FallbackEncoder::Unescape8 => self.encode_by_unescape(code, "%", 2)?,
            FallbackEncoder::Unescape16 => self.encode_by_unescape(code, "%u", 4)?,
            FallbackEncoder::Atob => self.encode_by_atob(code)?,
            FallbackEncoder::Eval => self.encode_by_eval(code)?,
        };
        Ok(Solution::with_outer_plus(replacement, Level::String, false))
    }

    /// Hexadecimal digits of `code`, zero-padded to `length`, using the
    /// cheapest letter forms. A trailing `f` or `fa` becomes `false`, so the
    /// result can be longer than `length`.
    pub fn hex_code_of(&self, code: u32, length: usize) -> String {
        let tables = self.tables();
        let optimal_b = find_definition(&tables.optimal_b, self.mask())
            .copied()
            .unwrap_or('B');
        let hex = format!("{code:x}").replace('b', &optimal_b.to_string());
        let padding = "0".repeat(length.saturating_sub(hex.len()));
        let hex = if let Some(head) = hex.strip_suffix("fa") {
            format!("{head}false")
        } else if let Some(head) = hex.strip_suffix('f') {
            format!("{head}false")
        } else {
            hex
        };
        format!("{padding}{hex}")
    }

    fn replace_forced_string(&mut self, text: &str) -> Result<String> {
        self.replace_string(text, false, false, true, usize::MAX)?
            .ok_or_else(|| self.too_complex())
    }

    /// `unescape("%XX")` or `unescape("%uXXXX")`
    fn encode_by_unescape(&mut self, code: u32, prefix: &str, length: usize) -> Result<String> {
        let hex = self.hex_code_of(code, length);
        let unescape = self.resolve_constant("unescape")?;
        let argument = self.replace_forced_string(&format!("{prefix}{hex}"))?;
        let mut result = format!("{unescape}({argument})");
        if hex.len() > length {
            result.push_str(&self.replace_expr("[0]")?);
        }
        Ok(result)
    }

    /// `Function("return\"\uXXXX\"")()`
    fn encode_by_eval(&mut self, code: u32) -> Result<String> {
        let hex = self.hex_code_of(code, 4);
        let function = self.resolve_constant("Function")?;
        let body = self.replace_forced_string(&format!("return\"\\u{hex}\""))?;
        let mut result = format!("{function}({body})()");
        if hex.len() > 4 {
            result.push_str(&self.replace_expr("[0]")?);
        }
        Ok(result)
    }

    /// Decode a crafted base64 string with `atob` and pick the character.
    ///
    /// Three alignments of the character within the decoded bytes are tried;
    /// each spells the base64 text with cheap words like `false` and `NaN`.
    fn encode_by_atob(&mut self, code: u32) -> Result<String> {
        let code = code as usize;

        let param1 = format!(
            "{}{}",
            char::from(BASE64_ALPHABET_LO_6[code >> 2]),
            BASE64_ALPHABET_HI_2[code & 0x03]
        );
        let mut postfix1 = format!("({})", self.replace_forced_string(&param1)?);
        if param1.len() > 2 {
            postfix1.push_str(&self.replace_expr("[0]")?);
        }

        let param2_left = BASE64_ALPHABET_LO_4[code >> 4];
        let param2 = format!("{param2_left}{}", BASE64_ALPHABET_HI_4[code & 0x0f]);
        let index2 = 1 + (param2_left.len() - 2) / 4 * 3;
        let postfix2 = format!(
            "({}){}",
            self.replace_forced_string(&param2)?,
            self.replace_expr(&format!("[{}]", format_indexer(index2)))?
        );

        let param3_left = BASE64_ALPHABET_LO_2[code >> 6];
        let param3 = format!("{param3_left}{}", BASE64_ALPHABET_HI_6[code & 0x3f]);
        let index3 = 2 + (param3_left.len() - 3) / 4 * 3;
        let postfix3 = format!(
            "({}){}",
            self.replace_forced_string(&param3)?,
            self.replace_expr(&format!("[{}]", format_indexer(index3)))?
        );

        let postfix = if postfix1.len() <= postfix2.len() && postfix1.len() <= postfix3.len() {
            postfix1
        } else if postfix2.len() <= postfix3.len() {
            postfix2
        } else {
            postfix3
        };
        let atob = self.resolve_constant("atob")?;
        Ok(format!("{atob}{postfix}"))
    }
}
