use crate::config::EncoderConfig;
use crate::definitions::Tables;
use crate::encoder::Encoder;
use crate::error::{EncoderError, Result};
use screw_features::{CapabilityRegistry, Mask};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Options for one encoding call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Treat the input as code and emit `Function(…)()` around it
    pub wrap_for_evaluation: bool,
    /// Names of capabilities the target engine is known to have
    pub capabilities: Vec<String>,
    pub config: EncoderConfig,
}

impl EncodeOptions {
    pub fn with_capabilities<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn wrapped(mut self) -> Self {
        self.wrap_for_evaluation = true;
        self
    }
}

/// Encoding session keeping one encoder per capability mask, so repeated
/// calls reuse resolved solutions
pub struct Screw {
    registry: Arc<CapabilityRegistry>,
    tables: Arc<Tables>,
    encoders: HashMap<Mask, Encoder>,
}

impl Screw {
    /// Session over the builtin capabilities and tables
    pub fn new() -> Self {
        Self {
            registry: Arc::new(CapabilityRegistry::builtin().clone()),
            tables: Tables::builtin(),
            encoders: HashMap::new(),
        }
    }

    /// Session over a custom registry, e.g. one built with an engine probe
    pub fn with_registry(registry: CapabilityRegistry) -> Result<Self> {
        let tables = Tables::build(&registry)?;
        Ok(Self {
            registry: Arc::new(registry),
            tables: Arc::new(tables),
            encoders: HashMap::new(),
        })
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Number of encoders created so far
    pub fn encoder_count(&self) -> usize {
        self.encoders.len()
    }

    /// Encoder for a capability set, created on first use
    pub fn encoder_for<I, S>(&mut self, names: I, config: &EncoderConfig) -> Result<&mut Encoder>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mask = self.registry.mask_of(names)?;
        self.registry.check_compatible(mask)?;
        let tables = &self.tables;
        let encoder = self.encoders.entry(mask).or_insert_with(|| {
            Encoder::with_tables(mask, Arc::clone(tables), config.clone())
        });
        if encoder.config() != config {
            encoder.set_config(config.clone());
        }
        Ok(encoder)
    }

    /// Encode `text` under the requested capabilities
    pub fn encode(&mut self, text: &str, options: &EncodeOptions) -> Result<String> {
        options
            .config
            .validate()
            .map_err(EncoderError::invalid_config)?;
        let encoder = self.encoder_for(&options.capabilities, &options.config)?;
        encoder.encode(text, options.wrap_for_evaluation)
    }
}

impl Default for Screw {
    fn default() -> Self {
        Self::new()
    }
}
