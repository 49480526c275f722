//! Builtin definition data.
//!
//! Capability names are resolved against a registry when the tables are
//! built, so a typo in a guard fails the build instead of silently never
//! matching.

use crate::definitions::{
    CharAt, Definition, Definitions, Entry, Expr, FallbackEncoder, Simple, Tables,
};
use crate::padding::{PaddingFamily, PaddingTables};
use crate::solution::Level;
use once_cell::sync::Lazy;
use screw_features::{CapabilityError, CapabilityRegistry, Mask};
use std::collections::HashMap;
use std::sync::Arc;

type BuildResult<T> = std::result::Result<T, CapabilityError>;

static BUILTIN_TABLES: Lazy<Arc<Tables>> = Lazy::new(|| {
    let tables = Tables::build(CapabilityRegistry::builtin())
        .expect("builtin definition tables reference known capabilities");
    Arc::new(tables)
});

/// Capability name lookup used while building tables
pub(crate) struct Masks<'a>(&'a CapabilityRegistry);

impl Masks<'_> {
    pub(crate) fn of(&self, names: &[&str]) -> BuildResult<Mask> {
        self.0.mask_of(names.iter())
    }

    fn entry<T>(&self, definition: T, names: &[&str]) -> BuildResult<Entry<T>> {
        Ok(Entry::new(definition, self.of(names)?))
    }
}

fn expr(text: &'static str) -> Definition {
    Definition::Expr(Expr::new(text))
}

fn fh(expr: &'static str, index: usize) -> Definition {
    Definition::CharAt(CharAt {
        expr,
        index,
        family: PaddingFamily::FunctionHeader,
    })
}

fn fb(expr: &'static str, index: usize) -> Definition {
    Definition::CharAt(CharAt {
        expr,
        index,
        family: PaddingFamily::FunctionBody,
    })
}

fn fixed(text: &'static str) -> Definitions {
    Definitions::Static(expr(text))
}

impl Tables {
    /// Shared tables over the builtin capability registry
    pub fn builtin() -> Arc<Tables> {
        Arc::clone(&BUILTIN_TABLES)
    }

    /// Build the tables, resolving capability guards against `registry`
    pub fn build(registry: &CapabilityRegistry) -> BuildResult<Self> {
        let masks = Masks(registry);
        let tables = Self {
            characters: characters(&masks)?,
            constants: constants(&masks)?,
            complex: complex(&masks)?,
            simple: simple(),
            padding: PaddingTables::build(&masks)?,
            default_8_bit: vec![
                masks.entry(FallbackEncoder::Unescape8, &[])?,
                masks.entry(FallbackEncoder::Atob, &["ATOB"])?,
            ],
            default_16_bit: vec![
                masks.entry(FallbackEncoder::Unescape16, &[])?,
                masks.entry(FallbackEncoder::Eval, &["ATOB"])?,
            ],
            optimal_b: vec![masks.entry('B', &[])?, masks.entry('b', &["ENTRIES"])?],
        };
        log::debug!(
            "Built definition tables: {} characters, {} constants, {} complex",
            tables.characters.len(),
            tables.constants.len(),
            tables.complex.len()
        );
        Ok(tables)
    }
}

fn simple() -> Vec<Simple> {
    let simple = |name, expr, level| Simple { name, expr, level };
    vec![
        simple("false", "![]", Level::Numeric),
        simple("true", "!![]", Level::Numeric),
        simple("undefined", "[][[]]", Level::Undefined),
        simple("NaN", "+[![]]", Level::Numeric),
        simple("Infinity", "+\"1e1000\"", Level::Numeric),
    ]
}

fn complex(masks: &Masks<'_>) -> BuildResult<Vec<(&'static str, Vec<Entry>)>> {
    let name = |text: &'static str, optimize: bool| -> BuildResult<Vec<Entry>> {
        let expr = if optimize {
            Expr::new(text).optimized()
        } else {
            Expr::new(text)
        };
        Ok(vec![masks.entry(Definition::Expr(expr), &["NAME"])?])
    };
    Ok(vec![
        ("Number", name("Number[\"name\"]", true)?),
        ("Object", name("Object[\"name\"]", true)?),
        ("RegExp", name("RegExp[\"name\"]", true)?),
        ("String", name("String[\"name\"]", false)?),
        ("Boolean", name("Boolean[\"name\"]", false)?),
        ("Function", name("Function[\"name\"]", false)?),
        ("Array", name("Array[\"name\"]", false)?),
    ])
}

fn constants(masks: &Masks<'_>) -> BuildResult<HashMap<&'static str, Definitions>> {
    let on = |text: &'static str, names: &[&str]| masks.entry(expr(text), names);
    let mut constants = HashMap::new();

    // Globals
    constants.insert("Array", fixed("[][CONSTRUCTOR]"));
    constants.insert("Boolean", fixed("(false)[CONSTRUCTOR]"));
    constants.insert("Date", fixed("Function(\"return Date\")()"));
    constants.insert("Function", fixed("ANY_FUNCTION[CONSTRUCTOR]"));
    constants.insert("Number", fixed("(0)[CONSTRUCTOR]"));
    constants.insert("Object", fixed("Function(\"return{}\")()[CONSTRUCTOR]"));
    constants.insert(
        "RegExp",
        fixed("Function(\"return/false/\")()[CONSTRUCTOR]"),
    );
    constants.insert("String", fixed("(\"\")[CONSTRUCTOR]"));
    constants.insert(
        "atob",
        Definitions::Entries(vec![on("Function(\"return atob\")()", &["ATOB"])?]),
    );
    constants.insert(
        "btoa",
        Definitions::Entries(vec![on("Function(\"return btoa\")()", &["ATOB"])?]),
    );
    constants.insert("escape", fixed("Function(\"return escape\")()"));
    constants.insert(
        "self",
        Definitions::Entries(vec![on("Function(\"return self\")()", &["SELF"])?]),
    );
    constants.insert("unescape", fixed("Function(\"return unescape\")()"));

    // Building blocks
    constants.insert(
        "ANY_FUNCTION",
        Definitions::Entries(vec![on("FILTER", &[])?, on("FILL", &["FILL"])?]),
    );
    constants.insert(
        "ARRAY_ITERATOR",
        Definitions::Entries(vec![on("[][\"entries\"]()", &["ENTRIES"])?]),
    );
    constants.insert("CONSTRUCTOR", fixed("\"constructor\""));
    constants.insert(
        "FILL",
        Definitions::Entries(vec![on("[][\"fill\"]", &["FILL"])?]),
    );
    constants.insert("FILTER", fixed("[][\"filter\"]"));
    constants.insert(
        "TO_STRING",
        Definitions::Entries(vec![
            on("\"toString\"", &[])?,
            on("\"to\" + String[\"name\"]", &["NAME"])?,
        ]),
    );

    // Function body extra padding: aligns the body of a function at the same
    // offset across engines. The number is the maximum overhead.
    constants.insert("FBEP_4_S", fixed("[[true][+!!(RP_5_N + ANY_FUNCTION)[\"40\"]]]"));
    constants.insert("FBEP_9_U", fixed("[false][+!(RP_5_N + ANY_FUNCTION)[\"40\"]]"));

    // Function header padding
    constants.insert("FHP_1_S", fixed("[[0][+!!(+(ANY_FUNCTION + [])[0] + true)]]"));
    constants.insert("FHP_3_NO", fixed("+(1 + [+(ANY_FUNCTION + [])[0]])"));
    constants.insert("FHP_5_N", fixed("!!(+(ANY_FUNCTION + [])[0] + true)"));

    // Regular padding. The number is the character overhead; the suffix tells
    // whether the value is a string (S), never undefined (N) or possibly
    // undefined (U), and a trailing O marks an outer plus.
    constants.insert("RP_1_NO", fixed("0"));
    constants.insert("RP_3_NO", fixed("NaN"));
    constants.insert("RP_4_N", fixed("true"));
    constants.insert("RP_5_N", fixed("false"));
    constants.insert("RP_6_SO", fixed("\"0false\""));

    Ok(constants)
}

fn characters(masks: &Masks<'_>) -> BuildResult<HashMap<char, Definitions>> {
    let on = |definition: Definition, names: &[&str]| masks.entry(definition, names);
    let mut characters = HashMap::new();

    for digit in 0..10u8 {
        characters.insert(
            char::from(b'0' + digit),
            Definitions::Static(Definition::Digit(digit)),
        );
    }

    for (ch, text) in [
        ('a', "\"false\"[1]"),
        ('d', "\"undefined\"[2]"),
        ('e', "\"true\"[3]"),
        ('f', "\"false\"[0]"),
        ('h', "(101)[TO_STRING](\"21\")[1]"),
        ('i', "([RP_5_N] + undefined)[\"10\"]"),
        ('k', "(20)[TO_STRING](\"21\")"),
        ('l', "\"false\"[2]"),
        ('n', "\"undefined\"[1]"),
        ('p', "(211)[TO_STRING](\"31\")[1]"),
        ('q', "(212)[TO_STRING](\"31\")[1]"),
        ('r', "\"true\"[1]"),
        ('s', "\"false\"[3]"),
        ('t', "\"true\"[0]"),
        ('u', "\"undefined\"[0]"),
        ('x', "(101)[TO_STRING](\"34\")[1]"),
        ('y', "(RP_3_NO + [Infinity])[\"10\"]"),
        ('z', "(35)[TO_STRING](\"36\")"),
        ('I', "\"Infinity\"[0]"),
        ('N', "\"NaN\"[0]"),
        ('O', "(RP_3_NO + Function(\"return{}\")())[\"11\"]"),
        ('"', "\"\"[\"fontcolor\"]()[\"12\"]"),
        ('+', "(+\"1e100\" + [])[2]"),
        (',', "([][\"slice\"][\"call\"](\"false\") + [])[1]"),
        ('-', "(+\".0000000001\" + [])[2]"),
        ('.', "(+\"11e20\" + [])[1]"),
        ('/', "\"0false\"[\"italics\"]()[\"10\"]"),
        ('<', "\"\"[\"italics\"]()[0]"),
        ('=', "\"\"[\"fontcolor\"]()[\"11\"]"),
        ('>', "\"\"[\"italics\"]()[2]"),
        ('?', "(RegExp() + [])[2]"),
    ] {
        characters.insert(ch, fixed(text));
    }

    let mut entries = |ch: char, list: Vec<Entry>| {
        characters.insert(ch, Definitions::Entries(list));
    };

    // Lowercase letters
    entries(
        'b',
        vec![
            on(fh("Number", 12), &[])?,
            on(expr("(ARRAY_ITERATOR + [])[2]"), &["ENTRIES"])?,
        ],
    );
    entries('c', vec![on(fh("ANY_FUNCTION", 3), &[])?]);
    entries('g', vec![on(fh("String", 14), &[])?]);
    entries(
        'j',
        vec![
            on(expr("(Function(\"return{}\")() + [])[\"10\"]"), &[])?,
            on(expr("(self + [])[3]"), &["SELF"])?,
            on(expr("(ARRAY_ITERATOR + [])[3]"), &["ENTRIES"])?,
        ],
    );
    entries(
        'm',
        vec![
            on(expr("(RP_6_SO + Function())[\"20\"]"), &[])?,
            on(fh("Number", 11), &["NO_IE_SRC"])?,
            on(fh("Number", 11), &["IE_SRC"])?,
        ],
    );
    entries('o', vec![on(fh("ANY_FUNCTION", 6), &[])?]);
    entries(
        'v',
        vec![on(fb("FILTER", 25), &[])?, on(fb("FILL", 23), &["FILL"])?],
    );
    // The window forms read `self`, so they only apply together with SELF
    entries(
        'w',
        vec![
            on(expr("(32)[TO_STRING](\"33\")"), &[])?,
            on(
                Definition::Nested(vec![
                    on(expr("(self + [])[\"slice\"](\"-2\")[0]"), &[])?,
                    on(expr("(self + [])[\"13\"]"), &["WINDOW"])?,
                    on(expr("(RP_4_N + self)[\"20\"]"), &["DOMWINDOW"])?,
                ]),
                &["SELF"],
            )?,
        ],
    );

    // Uppercase letters
    entries(
        'A',
        vec![
            on(fh("Array", 9), &[])?,
            on(expr("(RP_3_NO + ARRAY_ITERATOR)[11]"), &["ENTRIES"])?,
        ],
    );
    entries('B', vec![on(fh("Boolean", 9), &[])?]);
    entries(
        'C',
        vec![
            on(expr("escape(\"\"[\"italics\"]())[2]"), &[])?,
            on(Definition::Fallback, &["ATOB"])?,
        ],
    );
    entries(
        'D',
        vec![
            on(expr("escape(\"]\")[2]"), &[])?,
            on(expr("btoa(\"00\")[1]"), &["ATOB"])?,
        ],
    );
    entries(
        'E',
        vec![
            on(fh("RegExp", 12), &[])?,
            on(expr("btoa(\"01\")[2]"), &["ATOB"])?,
        ],
    );
    entries('F', vec![on(fh("Function", 9), &[])?]);
    entries(
        'G',
        vec![
            on(expr("(RP_5_N + Date())[\"30\"]"), &["GMT"])?,
            on(expr("btoa(\"0false\")[1]"), &["ATOB"])?,
        ],
    );
    entries('H', vec![on(expr("btoa(true)[1]"), &["ATOB"])?]);
    entries('J', vec![on(expr("btoa(true)[2]"), &["ATOB"])?]);
    entries('L', vec![on(expr("btoa(\".\")[0]"), &["ATOB"])?]);
    entries(
        'M',
        vec![
            on(expr("(RP_4_N + Date())[\"30\"]"), &["GMT"])?,
            on(expr("btoa(0)[0]"), &["ATOB"])?,
        ],
    );
    entries('P', vec![on(expr("btoa(\"\"[\"italics\"]())[0]"), &["ATOB"])?]);
    entries('Q', vec![on(expr("btoa(1)[1]"), &["ATOB"])?]);
    entries(
        'R',
        vec![
            on(fh("RegExp", 9), &[])?,
            on(expr("btoa(\"0true\")[2]"), &["ATOB"])?,
        ],
    );
    entries('S', vec![on(fh("String", 9), &[])?]);
    entries(
        'T',
        vec![
            on(expr("(RP_3_NO + Date())[\"30\"]"), &["GMT"])?,
            on(expr("btoa(NaN)[0]"), &["ATOB"])?,
        ],
    );
    entries(
        'U',
        vec![
            on(
                expr("(RP_3_NO + Function(\"return{}\")()[TO_STRING][\"call\"]())[\"11\"]"),
                &["UNDEFINED"],
            )?,
            on(expr("(RP_4_N + btoa(false))[\"10\"]"), &["ATOB"])?,
        ],
    );
    entries('V', vec![on(expr("btoa(undefined)[\"10\"]"), &["ATOB"])?]);
    entries(
        'W',
        vec![on(
            Definition::Nested(vec![
                on(expr("(self + RP_3_NO)[\"slice\"](\"-10\")[0]"), &[])?,
                on(expr("(RP_3_NO + self)[\"11\"]"), &["WINDOW"])?,
                on(expr("(self + [])[\"11\"]"), &["DOMWINDOW"])?,
            ]),
            &["SELF"],
        )?],
    );
    entries('X', vec![on(expr("btoa(\"1true\")[1]"), &["ATOB"])?]);
    entries('Y', vec![on(expr("btoa(\"a\")[0]"), &["ATOB"])?]);
    entries('Z', vec![on(expr("btoa(false)[0]"), &["ATOB"])?]);

    // Whitespace and punctuation
    entries(
        '\n',
        vec![
            on(expr("(Function() + [])[\"23\"]"), &[])?,
            on(expr("(Function() + [])[\"22\"]"), &["NO_SAFARI_LF"])?,
            on(expr("(RP_1_NO + FILTER)[\"20\"]"), &["FF_SAFARI_SRC"])?,
            on(expr("(RP_3_NO + FILL)[\"20\"]"), &["FF_SAFARI_SRC", "FILL"])?,
            on(expr("(ANY_FUNCTION + [])[0]"), &["IE_SRC"])?,
        ],
    );
    entries(
        '\u{1e}',
        vec![on(expr("(RP_5_N + atob(\"NaNfalse\"))[\"10\"]"), &["ATOB"])?],
    );
    entries(
        ' ',
        vec![
            on(fh("ANY_FUNCTION", 8), &[])?,
            on(expr("(RP_1_NO + FILTER)[\"20\"]"), &["V8_SRC"])?,
            on(expr("(RP_3_NO + FILTER)[\"20\"]"), &["V8_SRC", "FILL"])?,
            on(expr("(FILTER + [])[\"20\"]"), &["FF_SAFARI_SRC"])?,
            on(expr("(RP_3_NO + FILL)[\"21\"]"), &["FF_SAFARI_SRC", "FILL"])?,
        ],
    );
    entries(
        '%',
        vec![
            on(expr("escape(FILTER)[\"20\"]"), &[])?,
            on(expr("escape(false + FILL)[\"20\"]"), &["NO_IE_SRC", "FILL"])?,
            on(expr("escape(ANY_FUNCTION)[0]"), &["IE_SRC"])?,
            on(Definition::Fallback, &["ATOB"])?,
        ],
    );
    entries(
        '(',
        vec![on(fh("FILTER", 15), &[])?, on(fh("FILL", 13), &["FILL"])?],
    );
    entries(
        ')',
        vec![on(fh("FILTER", 16), &[])?, on(fh("FILL", 14), &["FILL"])?],
    );
    entries(
        ':',
        vec![
            on(expr("(RegExp() + [])[3]"), &[])?,
            on(Definition::Fallback, &["ATOB"])?,
        ],
    );
    entries(
        '[',
        vec![on(fb("FILTER", 20), &[])?, on(fb("FILL", 18), &["FILL"])?],
    );
    entries(
        '\\',
        vec![
            on(expr("\"\"[\"fontcolor\"]()[\"quote\"]()[\"13\"]"), &["QUOTE"])?,
            on(Definition::Fallback, &["ATOB"])?,
            on(expr("(ANY_FUNCTION + [])[\"quote\"]()[1]"), &["IE_SRC", "QUOTE"])?,
            on(
                expr("(FILTER + [])[\"quote\"]()[\"20\"]"),
                &["FF_SAFARI_SRC", "QUOTE"],
            )?,
            on(
                expr("(RP_3_NO + FILL)[\"quote\"]()[\"21\"]"),
                &["FF_SAFARI_SRC", "FILL", "QUOTE"],
            )?,
        ],
    );
    entries(
        ']',
        vec![on(fb("FILTER", 32), &[])?, on(fb("FILL", 30), &["FILL"])?],
    );
    entries(
        '^',
        vec![on(expr("atob(\"undefinedfalse\")[2]"), &["ATOB"])?],
    );
    entries(
        '{',
        vec![on(fh("FILTER", 18), &[])?, on(fh("FILL", 16), &["FILL"])?],
    );
    entries(
        '}',
        vec![on(fb("FILTER", 34), &[])?, on(fb("FILL", 32), &["FILL"])?],
    );

    // Latin-1 characters decoded from base64
    for (ch, text) in [
        ('\u{8a}', "(RP_4_N + atob(\"NaNundefined\"))[\"10\"]"),
        ('\u{8d}', "atob(\"0NaN\")[2]"),
        ('\u{96}', "atob(\"00false\")[3]"),
        ('\u{9e}', "atob(true)[2]"),
        ('£', "atob(NaN)[1]"),
        ('¥', "atob(\"0false\")[2]"),
        ('§', "atob(\"00undefined\")[2]"),
        ('©', "atob(\"falsefalse\")[1]"),
        ('®', "atob(\"NaNtrue\")[3]"),
        ('±', "atob(\"0false\")[3]"),
        ('¶', "atob(true)[0]"),
        ('º', "atob(\"undefinedfalse\")[0]"),
        ('»', "atob(true)[1]"),
        ('Ö', "atob(\"0NaN\")[1]"),
        ('Ú', "atob(\"0truefalse\")[1]"),
        ('Ý', "atob(\"0undefined\")[2]"),
        ('â', "atob(\"falsefalseundefined\")[\"11\"]"),
        ('é', "atob(\"0undefined\")[1]"),
        ('î', "atob(\"0truefalse\")[2]"),
        ('ö', "atob(\"0false\")[1]"),
        ('ø', "atob(\"undefinedundefined\")[\"10\"]"),
    ] {
        entries(ch, vec![on(expr(text), &["ATOB"])?]);
    }

    Ok(characters)
}
