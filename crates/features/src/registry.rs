use crate::error::{CapabilityError, Result};
use crate::mask::Mask;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Name of the synthetic capability holding everything the probes reported
pub const AUTO: &str = "AUTO";

/// Runtime check for a single capability. `Err` counts as unavailable.
pub type Probe = Box<dyn Fn() -> anyhow::Result<bool> + Send + Sync>;

/// Declaration of one capability before the registry is built
pub struct CapabilitySpec {
    name: String,
    description: String,
    elementary: bool,
    probe: Option<Probe>,
    includes: Vec<String>,
    excludes: Vec<String>,
}

impl CapabilitySpec {
    /// A capability that owns a mask bit
    pub fn elementary(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, true)
    }

    /// A named union of other capabilities, without a bit of its own
    pub fn composite(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, false)
    }

    fn new(name: impl Into<String>, description: impl Into<String>, elementary: bool) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            elementary,
            probe: None,
            includes: Vec::new(),
            excludes: Vec::new(),
        }
    }

    /// Builder: capabilities implied whenever this one is required
    #[must_use]
    pub fn includes(mut self, names: &[&str]) -> Self {
        self.includes.extend(names.iter().map(|name| (*name).to_string()));
        self
    }

    /// Builder: capabilities that can never coexist with this one
    #[must_use]
    pub fn excludes(mut self, names: &[&str]) -> Self {
        self.excludes.extend(names.iter().map(|name| (*name).to_string()));
        self
    }

    /// Builder: attach a runtime probe
    #[must_use]
    pub fn probe<F>(mut self, probe: F) -> Self
    where
        F: Fn() -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.probe = Some(Box::new(probe));
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn is_elementary(&self) -> bool {
        self.elementary
    }

    fn run_probe(&self) -> bool {
        let Some(probe) = &self.probe else {
            return false;
        };
        match probe() {
            Ok(available) => available,
            Err(err) => {
                log::debug!("probe for feature {} failed: {err:#}", self.name);
                false
            }
        }
    }
}

impl fmt::Debug for CapabilitySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilitySpec")
            .field("name", &self.name)
            .field("elementary", &self.elementary)
            .field("probe", &self.probe.is_some())
            .field("includes", &self.includes)
            .field("excludes", &self.excludes)
            .finish_non_exhaustive()
    }
}

/// Read-only view of a registered capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityInfo {
    pub name: String,
    pub description: String,
    /// Closed mask: own bit plus every transitively included bit
    pub mask: Mask,
    pub elementary: bool,
    /// True when every bit of `mask` was reported available by the probes
    pub available: bool,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
}

/// Collects capability specs and builds an immutable registry
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    specs: Vec<CapabilitySpec>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability
    #[must_use]
    pub fn capability(mut self, spec: CapabilitySpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Two-pass build: assign bits and run probes, then close includes and excludes
    pub fn build(self) -> Result<CapabilityRegistry> {
        let mut index = HashMap::with_capacity(self.specs.len() + 1);
        let mut own_bits = Vec::with_capacity(self.specs.len());
        let mut available_mask = Mask::EMPTY;
        let mut bit_index = 0u32;

        for (position, spec) in self.specs.iter().enumerate() {
            if spec.name == AUTO || index.insert(spec.name.clone(), position).is_some() {
                return Err(CapabilityError::Duplicate(spec.name.clone()));
            }
            let mut own = Mask::EMPTY;
            if spec.elementary {
                if bit_index >= Mask::CAPACITY {
                    let count = self.specs.iter().filter(|s| s.elementary).count();
                    return Err(CapabilityError::TooMany {
                        count,
                        capacity: Mask::CAPACITY,
                    });
                }
                own = Mask::bit(bit_index);
                bit_index += 1;
                if spec.run_probe() {
                    available_mask |= own;
                }
            }
            own_bits.push(own);
        }

        let mut closure = Closure {
            specs: &self.specs,
            index: &index,
            own_bits: &own_bits,
            masks: vec![None; self.specs.len()],
            path: Vec::new(),
        };
        for position in 0..self.specs.len() {
            closure.close(position)?;
        }
        let masks: Vec<Mask> = closure.masks.into_iter().map(Option::unwrap_or_default).collect();

        let mut incompatible_masks = Vec::new();
        for (position, spec) in self.specs.iter().enumerate() {
            for exclude in &spec.excludes {
                let &excluded = index
                    .get(exclude)
                    .ok_or_else(|| CapabilityError::unknown(exclude))?;
                incompatible_masks.push(masks[position] | masks[excluded]);
            }
        }
        incompatible_masks.sort_unstable();
        incompatible_masks.dedup();

        let mut infos: Vec<CapabilityInfo> = self
            .specs
            .into_iter()
            .zip(&masks)
            .map(|(spec, &mask)| CapabilityInfo {
                available: available_mask.includes(mask),
                name: spec.name,
                description: spec.description,
                mask,
                elementary: spec.elementary,
                includes: spec.includes,
                excludes: spec.excludes,
            })
            .collect();

        let mut auto_includes: Vec<String> = infos
            .iter()
            .zip(&own_bits)
            .filter(|(_, own)| !own.is_empty() && available_mask.includes(**own))
            .map(|(info, _)| info.name.clone())
            .collect();
        auto_includes.sort();
        index.insert(AUTO.to_string(), infos.len());
        own_bits.push(Mask::EMPTY);
        infos.push(CapabilityInfo {
            name: AUTO.to_string(),
            description: "All features available in the current engine.".to_string(),
            mask: available_mask,
            elementary: false,
            available: true,
            includes: auto_includes,
            excludes: Vec::new(),
        });

        log::debug!(
            "built feature registry: {} features, {bit_index} elementary, {} incompatible pairs, available {available_mask}",
            infos.len(),
            incompatible_masks.len()
        );

        Ok(CapabilityRegistry {
            infos,
            index,
            own_bits,
            incompatible_masks,
            available_mask,
        })
    }
}

struct Closure<'a> {
    specs: &'a [CapabilitySpec],
    index: &'a HashMap<String, usize>,
    own_bits: &'a [Mask],
    masks: Vec<Option<Mask>>,
    path: Vec<usize>,
}

impl Closure<'_> {
    fn close(&mut self, position: usize) -> Result<Mask> {
        if let Some(mask) = self.masks[position] {
            return Ok(mask);
        }
        if let Some(start) = self.path.iter().position(|&p| p == position) {
            let chain: Vec<&str> = self.path[start..]
                .iter()
                .chain(std::iter::once(&position))
                .map(|&p| self.specs[p].name.as_str())
                .collect();
            return Err(CapabilityError::CircularInclude(chain.join(" > ")));
        }
        self.path.push(position);
        let specs = self.specs;
        let mut mask = self.own_bits[position];
        for include in &specs[position].includes {
            let &included = self
                .index
                .get(include)
                .ok_or_else(|| CapabilityError::unknown(include))?;
            mask |= self.close(included)?;
        }
        self.path.pop();
        self.masks[position] = Some(mask);
        Ok(mask)
    }
}

/// Immutable set of capabilities with their masks and incompatible pairs
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    infos: Vec<CapabilityInfo>,
    index: HashMap<String, usize>,
    own_bits: Vec<Mask>,
    incompatible_masks: Vec<Mask>,
    available_mask: Mask,
}

impl CapabilityRegistry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Look up a capability by name
    #[must_use]
    pub fn info(&self, name: &str) -> Option<&CapabilityInfo> {
        self.index.get(name).map(|&position| &self.infos[position])
    }

    /// All capabilities in declaration order, `AUTO` last
    pub fn iter(&self) -> impl Iterator<Item = &CapabilityInfo> {
        self.infos.iter()
    }

    /// Mask of everything the probes reported available
    #[must_use]
    pub const fn available_mask(&self) -> Mask {
        self.available_mask
    }

    #[must_use]
    pub fn incompatible_masks(&self) -> &[Mask] {
        &self.incompatible_masks
    }

    /// Union of the closed masks of the named capabilities
    pub fn mask_of<I, S>(&self, names: I) -> Result<Mask>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(Mask::EMPTY, |mask, name| {
            let name = name.as_ref();
            self.info(name)
                .map(|info| mask | info.mask)
                .ok_or_else(|| CapabilityError::unknown(name))
        })
    }

    /// False iff some registered incompatible pair is contained in `mask`
    #[must_use]
    pub fn is_mask_compatible(&self, mask: Mask) -> bool {
        self.conflict_in(mask).is_none()
    }

    /// Fail with the names of the first conflicting pair found in `mask`
    pub fn check_compatible(&self, mask: Mask) -> Result<()> {
        match self.conflict_in(mask) {
            None => Ok(()),
            Some(conflict) => Err(CapabilityError::Incompatible(
                self.elementary_names(conflict)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            )),
        }
    }

    pub fn are_compatible<I, S>(&self, names: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mask = self.mask_of(names)?;
        Ok(self.is_mask_compatible(mask))
    }

    pub fn are_available<I, S>(&self, names: I) -> Result<bool>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mask = self.mask_of(names)?;
        Ok(self.available_mask.includes(mask))
    }

    /// Names of the elementary capabilities whose own bits are set in `mask`
    #[must_use]
    pub fn elementary_names(&self, mask: Mask) -> Vec<&str> {
        self.infos
            .iter()
            .zip(&self.own_bits)
            .filter(|(_, own)| !own.is_empty() && mask.includes(**own))
            .map(|(info, _)| info.name.as_str())
            .collect()
    }

    fn conflict_in(&self, mask: Mask) -> Option<Mask> {
        self.incompatible_masks
            .iter()
            .copied()
            .find(|&incompatible| mask.includes(incompatible))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> CapabilityRegistry {
        CapabilityRegistry::builder()
            .capability(CapabilitySpec::elementary("A", "a").excludes(&["B"]))
            .capability(CapabilitySpec::elementary("B", "b").excludes(&["A"]))
            .capability(CapabilitySpec::elementary("C", "c").includes(&["A"]).probe(|| Ok(true)))
            .capability(CapabilitySpec::elementary("D", "d").probe(|| anyhow::bail!("boom")))
            .capability(CapabilitySpec::composite("CD", "c and d").includes(&["C", "D"]))
            .build()
            .expect("sample registry")
    }

    #[test]
    fn test_bits_follow_declaration_order() {
        let registry = sample();
        assert_eq!(registry.info("A").map(|i| i.mask), Some(Mask::bit(0)));
        assert_eq!(registry.info("B").map(|i| i.mask), Some(Mask::bit(1)));
        assert_eq!(
            registry.info("C").map(|i| i.mask),
            Some(Mask::bit(2) | Mask::bit(0))
        );
        assert_eq!(
            registry.info("CD").map(|i| i.mask),
            Some(Mask::bit(0) | Mask::bit(2) | Mask::bit(3))
        );
    }

    #[test]
    fn test_mutual_excludes_register_one_pair() {
        let registry = sample();
        assert_eq!(registry.incompatible_masks(), &[Mask::bit(0) | Mask::bit(1)]);
        assert!(!registry.are_compatible(["A", "B"]).unwrap());
        assert!(!registry.are_compatible(["C", "B"]).unwrap());
        assert!(registry.are_compatible(["C", "D"]).unwrap());
    }

    #[test]
    fn test_probe_errors_count_as_unavailable() {
        let registry = sample();
        assert_eq!(registry.available_mask(), Mask::bit(2));
        assert!(!registry.info("C").unwrap().available);
        assert!(!registry.info("D").unwrap().available);
        assert!(!registry.are_available(["D"]).unwrap());
    }

    #[test]
    fn test_auto_lists_probed_features() {
        let registry = sample();
        let auto = registry.info(AUTO).unwrap();
        assert_eq!(auto.includes, vec!["C".to_string()]);
        assert_eq!(auto.mask, Mask::bit(2));
        assert_eq!(registry.iter().last().map(|i| i.name.as_str()), Some(AUTO));
    }

    #[test]
    fn test_unknown_name() {
        let registry = sample();
        assert_eq!(
            registry.mask_of(["A", "nope"]),
            Err(CapabilityError::Unknown("nope".to_string()))
        );
    }

    #[test]
    fn test_check_compatible_names_conflict() {
        let registry = sample();
        let mask = registry.mask_of(["A", "B"]).unwrap();
        assert_eq!(
            registry.check_compatible(mask),
            Err(CapabilityError::Incompatible(vec![
                "A".to_string(),
                "B".to_string()
            ]))
        );
    }

    #[test]
    fn test_circular_include_is_reported() {
        let err = CapabilityRegistry::builder()
            .capability(CapabilitySpec::composite("X", "").includes(&["Y"]))
            .capability(CapabilitySpec::composite("Y", "").includes(&["X"]))
            .build()
            .unwrap_err();
        assert_eq!(err, CapabilityError::CircularInclude("X > Y > X".to_string()));
    }

    #[test]
    fn test_duplicate_and_reserved_names() {
        let err = CapabilityRegistry::builder()
            .capability(CapabilitySpec::elementary("X", ""))
            .capability(CapabilitySpec::elementary("X", ""))
            .build()
            .unwrap_err();
        assert_eq!(err, CapabilityError::Duplicate("X".to_string()));

        let err = CapabilityRegistry::builder()
            .capability(CapabilitySpec::composite(AUTO, ""))
            .build()
            .unwrap_err();
        assert_eq!(err, CapabilityError::Duplicate(AUTO.to_string()));
    }

    #[test]
    fn test_too_many_elementary_features() {
        let mut builder = CapabilityRegistry::builder();
        for index in 0..=Mask::CAPACITY {
            builder = builder.capability(CapabilitySpec::elementary(format!("F{index}"), ""));
        }
        assert_eq!(
            builder.build().unwrap_err(),
            CapabilityError::TooMany {
                count: 65,
                capacity: 64
            }
        );
    }
}
