//! Phase-tagged configuration options.
//!
//! # Data Flow
//! ```text
//! with_*() builder
//!     → PlugOption { phase, key, boxed value }
//!     → Plug::new sorts nothing; it walks the list once per phase
//!     → field::set_field on the API (Api phase) or server (Server phase)
//! ```
//!
//! # Design Decisions
//! - An option is consumed exactly once and never retained
//! - Options for the same key are independent writes: the last one wins
//! - Defaults are a composite option, not protected values
//! - No option validates its value; the receiving target does

pub mod catalog;
pub mod defaults;

use std::fmt;

use crate::field::{set_field, FieldKey, FieldValue, Patchable};

pub use catalog::*;

/// Which target an option mutates, and in which ordering group it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Applied to the API before it is installed into the server.
    Api,
    /// Applied to the server after the API is installed.
    Server,
}

/// One pending field write.
pub struct FieldWrite {
    pub key: FieldKey,
    pub value: FieldValue,
}

impl FieldWrite {
    pub fn new<T: std::any::Any + Send>(key: FieldKey, value: T) -> Self {
        Self {
            key,
            value: FieldValue::new(value),
        }
    }

    /// Apply to `target`; `false` if the target lacks the field.
    pub fn apply(self, target: &mut dyn Patchable) -> bool {
        set_field(target, self.key, self.value)
    }
}

impl fmt::Debug for FieldWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldWrite")
            .field("key", &self.key)
            .field("value", &self.value)
            .finish()
    }
}

/// A single configuration intent.
#[derive(Debug)]
pub enum PlugOption {
    /// Write one field on the API.
    Api(FieldWrite),
    /// Write one field on the server.
    Server(FieldWrite),
    /// Write the fixed default table for a phase.
    Defaults(Phase),
    /// Run the server's embedded API configuration routine.
    ConfigureApi,
}

impl PlugOption {
    pub fn phase(&self) -> Phase {
        match self {
            PlugOption::Api(_) => Phase::Api,
            PlugOption::Server(_) => Phase::Server,
            PlugOption::Defaults(phase) => *phase,
            PlugOption::ConfigureApi => Phase::Server,
        }
    }

    /// The key written by a single-field option.
    pub fn key(&self) -> Option<FieldKey> {
        match self {
            PlugOption::Api(write) | PlugOption::Server(write) => Some(write.key),
            PlugOption::Defaults(_) | PlugOption::ConfigureApi => None,
        }
    }

    /// Perform this option's field writes on `target`.
    ///
    /// Returns the number of fields actually written. `ConfigureApi` writes
    /// nothing; the Plug runs it through the server capability instead.
    pub fn write_to(self, target: &mut dyn Patchable) -> usize {
        match self {
            PlugOption::Api(write) | PlugOption::Server(write) => usize::from(write.apply(target)),
            PlugOption::Defaults(Phase::Api) => defaults::api_defaults()
                .into_iter()
                .map(|write| usize::from(write.apply(target)))
                .sum(),
            PlugOption::Defaults(Phase::Server) => defaults::server_defaults()
                .into_iter()
                .map(|write| usize::from(write.apply(target)))
                .sum(),
            PlugOption::ConfigureApi => 0,
        }
    }
}
