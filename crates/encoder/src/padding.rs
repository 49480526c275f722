//! Padding and indexing for characters read out of native function text.
//!
//! The string form of a native function differs between engines: some put a
//! line feed before `function`, some indent `[native code]`. To read the same
//! character everywhere, a padding block of known length is prepended so the
//! character lands at one index, or the index is shifted per engine variant.

use crate::definitions::{find_definition, CharAt, Entry};
use crate::encoder::Encoder;
use crate::error::{EncoderError, Result};
use crate::solution::{Level, Solution};
use crate::tables::Masks;
use screw_features::CapabilityError;
use std::collections::HashMap;

/// Which part of a native function the character is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaddingFamily {
    /// Characters of `function name() {`
    FunctionHeader,
    /// Characters of `[native code] }`
    FunctionBody,
}

/// Block table and index shift for one engine variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddingInfo {
    /// Block expression by padding length
    pub blocks: &'static [Option<&'static str>],
    pub shift: usize,
}

impl PaddingInfo {
    pub fn block(&self, padding: usize) -> Option<&'static str> {
        self.blocks.get(padding).copied().flatten()
    }
}

const FB_PADDINGS: &[Option<&str>] = &[
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    Some("FHP_3_NO + FBEP_4_S"),
    None,
    Some("FHP_5_N + FBEP_4_S"),
    Some("FHP_1_S + FBEP_9_U"),
    None,
    Some("[FHP_3_NO] + FBEP_9_U"),
    None,
    None,
    Some("FHP_5_N + [RP_1_NO] + FBEP_9_U"),
];

const FB_NO_IE_PADDINGS: &[Option<&str>] = &[
    None,
    None,
    None,
    None,
    None,
    Some("RP_1_NO + FBEP_4_S"),
    None,
    Some("RP_3_NO + FBEP_4_S"),
    None,
    Some("FBEP_9_U"),
    Some("[RP_1_NO] + FBEP_9_U"),
    None,
    Some("[RP_3_NO] + FBEP_9_U"),
];

const FH_PADDINGS: &[Option<&str>] = &[
    None,
    Some("FHP_1_S"),
    None,
    Some("FHP_3_NO"),
    None,
    Some("FHP_5_N"),
    Some("FHP_5_N + [RP_1_NO]"),
    Some("FHP_3_NO + [RP_4_N]"),
    Some("FHP_3_NO + [RP_5_N]"),
];

const R_PADDINGS: &[Option<&str>] = &[
    Some("[]"),
    Some("RP_1_NO"),
    None,
    Some("RP_3_NO"),
    Some("RP_4_N"),
    Some("RP_5_N"),
    Some("RP_6_SO"),
];

/// Padding lengths per character offset, and padding infos per family
#[derive(Debug, Clone, Default)]
pub struct PaddingTables {
    header_entries: HashMap<usize, Vec<Entry<usize>>>,
    body_entries: HashMap<usize, Vec<Entry<usize>>>,
    header_infos: Vec<Entry<PaddingInfo>>,
    body_infos: Vec<Entry<PaddingInfo>>,
}

impl PaddingTables {
    /// Padding length candidates for a character offset
    pub fn entries(&self, family: PaddingFamily, index: usize) -> Option<&[Entry<usize>]> {
        let map = match family {
            PaddingFamily::FunctionHeader => &self.header_entries,
            PaddingFamily::FunctionBody => &self.body_entries,
        };
        map.get(&index).map(Vec::as_slice)
    }

    pub fn infos(&self, family: PaddingFamily) -> &[Entry<PaddingInfo>] {
        match family {
            PaddingFamily::FunctionHeader => &self.header_infos,
            PaddingFamily::FunctionBody => &self.body_infos,
        }
    }

    pub(crate) fn build(masks: &Masks<'_>) -> std::result::Result<Self, CapabilityError> {
        let pad = |padding: usize, names: &[&str]| -> std::result::Result<_, CapabilityError> {
            Ok(Entry::new(padding, masks.of(names)?))
        };
        let info = |blocks, shift, names: &[&str]| -> std::result::Result<_, CapabilityError> {
            Ok(Entry::new(PaddingInfo { blocks, shift }, masks.of(names)?))
        };

        let mut body_entries = HashMap::new();
        body_entries.insert(
            18,
            vec![
                pad(12, &[])?,
                pad(3, &["V8_SRC"])?,
                pad(0, &["FF_SAFARI_SRC"])?,
                pad(0, &["IE_SRC"])?,
            ],
        );
        for index in [20, 30] {
            body_entries.insert(
                index,
                vec![
                    pad(10, &[])?,
                    pad(0, &["V8_SRC"])?,
                    pad(6, &["FF_SAFARI_SRC"])?,
                    pad(5, &["IE_SRC"])?,
                ],
            );
        }
        body_entries.insert(
            23,
            vec![
                pad(7, &[])?,
                pad(0, &["V8_SRC"])?,
                pad(3, &["FF_SAFARI_SRC"])?,
                pad(3, &["IE_SRC"])?,
            ],
        );
        body_entries.insert(
            25,
            vec![
                pad(15, &[])?,
                pad(5, &["NO_IE_SRC"])?,
                pad(1, &["FF_SAFARI_SRC"])?,
                pad(0, &["IE_SRC"])?,
            ],
        );
        body_entries.insert(
            32,
            vec![
                pad(9, &[])?,
                pad(0, &["V8_SRC"])?,
                pad(4, &["FF_SAFARI_SRC"])?,
                pad(3, &["IE_SRC"])?,
            ],
        );
        body_entries.insert(
            34,
            vec![
                pad(7, &[])?,
                pad(9, &["NO_IE_SRC"])?,
                pad(6, &["V8_SRC"])?,
                pad(3, &["FF_SAFARI_SRC"])?,
                pad(1, &["IE_SRC"])?,
            ],
        );

        let mut header_entries = HashMap::new();
        for index in [3, 13] {
            header_entries.insert(
                index,
                vec![pad(7, &[])?, pad(0, &["NO_IE_SRC"])?, pad(6, &["IE_SRC"])?],
            );
        }
        for index in [6, 16] {
            header_entries.insert(
                index,
                vec![pad(5, &[])?, pad(4, &["NO_IE_SRC"])?, pad(3, &["IE_SRC"])?],
            );
        }
        for index in [8, 18] {
            header_entries.insert(index, vec![pad(3, &[])?, pad(1, &["IE_SRC"])?]);
        }
        header_entries.insert(9, vec![pad(1, &[])?, pad(0, &["IE_SRC"])?]);
        // Offset 11 is only reachable when the engine's source format is known
        header_entries.insert(11, vec![pad(0, &["NO_IE_SRC"])?, pad(0, &["IE_SRC"])?]);
        header_entries.insert(
            12,
            vec![pad(8, &[])?, pad(0, &["NO_IE_SRC"])?, pad(0, &["IE_SRC"])?],
        );
        header_entries.insert(14, vec![pad(6, &[])?, pad(5, &["IE_SRC"])?]);
        header_entries.insert(15, vec![pad(5, &[])?, pad(4, &["IE_SRC"])?]);

        Ok(Self {
            header_entries,
            body_entries,
            header_infos: vec![
                info(FH_PADDINGS, 0, &[])?,
                info(R_PADDINGS, 0, &["NO_IE_SRC"])?,
                info(R_PADDINGS, 1, &["IE_SRC"])?,
            ],
            body_infos: vec![
                info(FB_PADDINGS, 0, &[])?,
                info(FB_NO_IE_PADDINGS, 0, &["NO_IE_SRC"])?,
                info(R_PADDINGS, 0, &["V8_SRC"])?,
                info(R_PADDINGS, 4, &["FF_SAFARI_SRC"])?,
                info(R_PADDINGS, 5, &["IE_SRC"])?,
            ],
        })
    }
}

/// Index literal as written in a template; two-digit indices are quoted
pub fn format_indexer(index: usize) -> String {
    if index > 9 {
        format!("\"{index}\"")
    } else {
        index.to_string()
    }
}

/// Padded template reading the character at `char_at.index`
pub fn padded_template(
    tables: &PaddingTables,
    char_at: &CharAt,
    mask: screw_features::Mask,
    context: Option<String>,
) -> Result<String> {
    let index = char_at.index;
    let entries = tables
        .entries(char_at.family, index)
        .ok_or_else(|| {
            EncoderError::padding(
                format!("Missing padding entries for index {index}"),
                context.clone(),
            )
        })?;
    let padding = *find_definition(entries, mask).ok_or_else(|| {
        EncoderError::padding(
            format!("No padding entry for index {index} applies"),
            context.clone(),
        )
    })?;
    let info = find_definition(tables.infos(char_at.family), mask).ok_or_else(|| {
        EncoderError::padding("No padding info applies", context.clone())
    })?;
    let block = info.block(padding).ok_or_else(|| {
        EncoderError::padding(
            format!("Undefined padding block with length {padding}"),
            context.clone(),
        )
    })?;
    let indexer = format_indexer(index + padding + info.shift);
    Ok(format!("({block} + {})[{indexer}]", char_at.expr))
}

impl Encoder {
    /// Resolve a char-at definition, or `None` when it cannot beat `max_length`
    pub(crate) fn resolve_char_at(
        &mut self,
        char_at: &CharAt,
        max_length: usize,
    ) -> Result<Option<Solution>> {
        let tables = self.tables();
        let template =
            padded_template(&tables.padding, char_at, self.mask(), self.context())?;
        let replacement = self.replace_expr_within(&template, false, max_length)?;
        Ok(replacement.map(|text| Solution::with_outer_plus(text, Level::String, false)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definitions::Tables;
    use screw_features::CapabilityRegistry;

    fn template(names: &[&str], expr: &'static str, index: usize, family: PaddingFamily) -> String {
        let registry = CapabilityRegistry::builtin();
        let mask = registry.mask_of(names.iter()).unwrap();
        let tables = Tables::builtin();
        let char_at = CharAt {
            expr,
            index,
            family,
        };
        padded_template(&tables.padding, &char_at, mask, None).unwrap()
    }

    #[test]
    fn test_header_padding_default() {
        assert_eq!(
            template(&[], "Array", 9, PaddingFamily::FunctionHeader),
            "(FHP_1_S + Array)[\"10\"]"
        );
    }

    #[test]
    fn test_header_padding_shifted_by_variant() {
        assert_eq!(
            template(&["IE_SRC"], "Array", 9, PaddingFamily::FunctionHeader),
            "([] + Array)[\"10\"]"
        );
        assert_eq!(
            template(&["NO_IE_SRC"], "ANY_FUNCTION", 3, PaddingFamily::FunctionHeader),
            "([] + ANY_FUNCTION)[3]"
        );
    }

    #[test]
    fn test_body_padding() {
        assert_eq!(
            template(&["V8_SRC"], "FILTER", 32, PaddingFamily::FunctionBody),
            "([] + FILTER)[\"32\"]"
        );
        assert_eq!(
            template(&["FF_SAFARI_SRC"], "FILTER", 32, PaddingFamily::FunctionBody),
            "(RP_4_N + FILTER)[\"40\"]"
        );
        assert_eq!(
            template(&[], "FILTER", 25, PaddingFamily::FunctionBody),
            "(FHP_5_N + [RP_1_NO] + FBEP_9_U + FILTER)[\"40\"]"
        );
    }

    #[test]
    fn test_missing_entries_are_errors() {
        let tables = Tables::builtin();
        let char_at = CharAt {
            expr: "FILTER",
            index: 4,
            family: PaddingFamily::FunctionHeader,
        };
        let err = padded_template(
            &tables.padding,
            &char_at,
            screw_features::Mask::EMPTY,
            Some("\"x\"".into()),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing padding entries for index 4 in the definition of \"x\""
        );

        let char_at = CharAt {
            expr: "Number",
            index: 11,
            family: PaddingFamily::FunctionHeader,
        };
        assert!(matches!(
            padded_template(&tables.padding, &char_at, screw_features::Mask::EMPTY, None),
            Err(EncoderError::Padding { .. })
        ));
    }

    #[test]
    fn test_format_indexer() {
        assert_eq!(format_indexer(3), "3");
        assert_eq!(format_indexer(10), "\"10\"");
    }
}
