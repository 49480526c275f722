use crate::error::Result;
use crate::registry::{CapabilityRegistry, CapabilitySpec, RegistryBuilder};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::Arc;

/// Answers availability questions about a target engine
pub trait EngineProbe: Send + Sync {
    fn check(&self, capability: &str) -> anyhow::Result<bool>;
}

/// Probe backed by a fixed list of capability names
#[derive(Debug, Clone, Default)]
pub struct FixedProbe {
    available: HashSet<String>,
}

impl FixedProbe {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            available: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl EngineProbe for FixedProbe {
    fn check(&self, capability: &str) -> anyhow::Result<bool> {
        Ok(self.available.contains(capability))
    }
}

static BUILTIN: Lazy<CapabilityRegistry> = Lazy::new(|| {
    builtin_builder(None)
        .build()
        .expect("builtin feature table is well-formed")
});

impl CapabilityRegistry {
    /// Registry of the builtin features, without probes (`AUTO` is empty)
    pub fn builtin() -> &'static Self {
        &BUILTIN
    }

    /// Builtin features, with availability answered by `probe`
    pub fn builtin_with_probe(probe: Arc<dyn EngineProbe>) -> Result<Self> {
        builtin_builder(Some(probe)).build()
    }
}

fn elementary(
    probe: &Option<Arc<dyn EngineProbe>>,
    name: &'static str,
    description: &str,
) -> CapabilitySpec {
    let spec = CapabilitySpec::elementary(name, description);
    match probe {
        Some(probe) => {
            let probe = Arc::clone(probe);
            spec.probe(move || probe.check(name))
        }
        None => spec,
    }
}

fn builtin_builder(probe: Option<Arc<dyn EngineProbe>>) -> RegistryBuilder {
    let p = &probe;
    RegistryBuilder::new()
        .capability(elementary(
            p,
            "NO_SAFARI_LF",
            "String representation of dynamically generated functions typical for most engines \
             except Safari: the character at index 22 is a line feed.",
        ))
        .capability(
            elementary(
                p,
                "NO_IE_SRC",
                "String representation of native functions with no characters before \
                 \"function\", typical for most engines except Internet Explorer.",
            )
            .excludes(&["IE_SRC"]),
        )
        .capability(
            elementary(
                p,
                "V8_SRC",
                "String representation of native functions found in V8 (Chrome, Opera, \
                 Android Browser, Node.js): a single space before \"[native code]\".",
            )
            .includes(&["NO_IE_SRC"])
            .excludes(&["FF_SAFARI_SRC"]),
        )
        .capability(
            elementary(
                p,
                "FF_SAFARI_SRC",
                "String representation of native functions found in Firefox and Safari: a \
                 line feed and four spaces before \"[native code]\".",
            )
            .includes(&["NO_IE_SRC"])
            .excludes(&["V8_SRC"]),
        )
        .capability(
            elementary(
                p,
                "IE_SRC",
                "String representation of native functions typical for Internet Explorer: a \
                 leading line feed before \"function\".",
            )
            .excludes(&["NO_IE_SRC"]),
        )
        .capability(elementary(
            p,
            "GMT",
            "The string representation of a Date object contains \"GMT\" after the first 25 \
             characters.",
        ))
        .capability(elementary(
            p,
            "SELF",
            "The global object property self exists. Not available in Node.js.",
        ))
        .capability(
            elementary(
                p,
                "WINDOW",
                "The global object converts to \"[object Window]\".",
            )
            .excludes(&["DOMWINDOW"]),
        )
        .capability(
            elementary(
                p,
                "DOMWINDOW",
                "The global object converts to \"[object DOMWindow]\". Only in Android Browser \
                 before 4.4.2.",
            )
            .excludes(&["WINDOW"]),
        )
        .capability(elementary(
            p,
            "ATOB",
            "The global functions atob and btoa exist.",
        ))
        .capability(elementary(
            p,
            "NAME",
            "Functions have a name property.",
        ))
        .capability(elementary(
            p,
            "UNDEFINED",
            "Object.prototype.toString.call() evaluates to \"[object Undefined]\".",
        ))
        .capability(elementary(
            p,
            "FILL",
            "The native function Array.prototype.fill exists.",
        ))
        .capability(elementary(
            p,
            "QUOTE",
            "The native function String.prototype.quote exists. Only in Firefox.",
        ))
        .capability(elementary(
            p,
            "ENTRIES",
            "Array.prototype.entries() converts to \"[object Array Iterator]\".",
        ))
        .capability(CapabilitySpec::composite(
            "DEFAULT",
            "Minimum feature level, compatible with all supported engines.",
        ))
        .capability(
            CapabilitySpec::composite(
                "COMPACT",
                "Features of all current browsers. Not compatible with Node.js or older \
                 browsers.",
            )
            .includes(&["ATOB", "GMT", "SELF", "UNDEFINED", "WINDOW"]),
        )
        .capability(
            CapabilitySpec::composite(
                "NO_IE",
                "Features available in all supported engines except Internet Explorer.",
            )
            .includes(&["GMT", "NAME", "NO_IE_SRC"]),
        )
        .capability(
            CapabilitySpec::composite("FF31", "Features available in Firefox 31 and later.")
                .includes(&[
                    "ATOB",
                    "ENTRIES",
                    "FF_SAFARI_SRC",
                    "FILL",
                    "GMT",
                    "NAME",
                    "NO_SAFARI_LF",
                    "QUOTE",
                    "SELF",
                    "UNDEFINED",
                    "WINDOW",
                ]),
        )
        .capability(
            CapabilitySpec::composite("IE9", "Features available in Internet Explorer 9.")
                .includes(&["IE_SRC", "NO_SAFARI_LF", "SELF", "UNDEFINED", "WINDOW"]),
        )
        .capability(
            CapabilitySpec::composite("IE10", "Features available in Internet Explorer 10.")
                .includes(&["ATOB", "IE_SRC", "NO_SAFARI_LF", "SELF", "UNDEFINED", "WINDOW"]),
        )
        .capability(
            CapabilitySpec::composite("IE11", "Features available in Internet Explorer 11.")
                .includes(&[
                    "ATOB",
                    "GMT",
                    "IE_SRC",
                    "NO_SAFARI_LF",
                    "SELF",
                    "UNDEFINED",
                    "WINDOW",
                ]),
        )
        // Describes the V8 releases the feature data was recorded on. Current V8 prints
        // `Function()` with a line feed before `)`, so index 22 holds `{` there
        // and NO_SAFARI_LF no longer holds.
        .capability(
            CapabilitySpec::composite(
                "NODE",
                "Features available in Node.js, also Chrome, Opera and Android Browser 4.1.2 \
                 or later.",
            )
            .includes(&["GMT", "NAME", "NO_SAFARI_LF", "UNDEFINED", "V8_SRC"]),
        )
}
