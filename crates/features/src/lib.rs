//! # Screw Features
//!
//! Capability model for restricted-alphabet encoding: every engine trait that
//! changes which encodings are valid gets a bit in a [`Mask`].
//!
//! ## Architecture
//!
//! ```text
//! CapabilitySpec[]
//!     │
//!     ├──> Pass 1: assign bits to elementary features, run probes once
//!     │
//!     ├──> Pass 2: close includes transitively, register exclude pairs
//!     │
//!     └──> CapabilityRegistry (immutable)
//!            ├─ mask_of(names)
//!            ├─ is_mask_compatible(mask)
//!            └─ available_mask() / AUTO
//! ```
//!
//! ## Example
//!
//! ```rust
//! use screw_features::CapabilityRegistry;
//!
//! let registry = CapabilityRegistry::builtin();
//! let mask = registry.mask_of(["NODE"]).unwrap();
//! assert!(registry.is_mask_compatible(mask));
//! assert!(!registry.are_compatible(["V8_SRC", "FF_SAFARI_SRC"]).unwrap());
//! ```

mod builtin;
mod error;
mod mask;
mod registry;

pub use builtin::{EngineProbe, FixedProbe};
pub use error::{CapabilityError, Result};
pub use mask::Mask;
pub use registry::{
    CapabilityInfo, CapabilityRegistry, CapabilitySpec, Probe, RegistryBuilder, AUTO,
};
