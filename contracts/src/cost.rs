//! # Construction Cost Schedule
//!
//! A deterministic, gas-style price list for bringing a registry into
//! existence. It makes the factory's whole point measurable: an instance
//! that points at a shared template must be cheaper than one that carries
//! its own copy.
//!
//! | Item | Units |
//! |---|---|
//! | creating any registry | [`CREATE_BASE`] |
//! | each byte of deployed template code | [`CODE_BYTE`] |
//! | each persistent index write | [`STORAGE_WRITE`] |

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::template::RegistryTemplate;

/// Flat charge for creating any registry.
pub const CREATE_BASE: u64 = 32_000;

/// Charge per byte of template code written.
pub const CODE_BYTE: u64 = 200;

/// Charge per persistent index entry written.
pub const STORAGE_WRITE: u64 = 20_000;

/// Size of a template reference (its code hash).
pub const TEMPLATE_REFERENCE_BYTES: u64 = 32;

/// Construction cost in schedule units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cost(pub u64);

impl Cost {
    pub fn units(&self) -> u64 {
        self.0
    }

    /// Fraction of `baseline` saved by paying `self` instead, in percent.
    pub fn savings_vs(&self, baseline: Cost) -> f64 {
        if baseline.0 == 0 {
            return 0.0;
        }
        100.0 - (self.0 as f64 / baseline.0 as f64) * 100.0
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} units", self.0)
    }
}

/// Cost of deploying a registry that carries its own copy of `template`.
pub fn full_deployment(template: &RegistryTemplate) -> Cost {
    Cost(CREATE_BASE.saturating_add(CODE_BYTE.saturating_mul(template.code_size())))
}

/// Cost of a factory instance: a template reference plus the caller index
/// entry.
pub fn instance_creation() -> Cost {
    Cost(CREATE_BASE + CODE_BYTE * TEMPLATE_REFERENCE_BYTES + STORAGE_WRITE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateDefinition;

    #[test]
    fn instance_is_cheaper_even_for_minimal_template() {
        let template = RegistryTemplate::compile(TemplateDefinition::new("A", "B")).unwrap();
        assert!(instance_creation() < full_deployment(&template));
    }

    #[test]
    fn full_deployment_grows_with_template() {
        let small = RegistryTemplate::compile(TemplateDefinition::new("A", "B")).unwrap();
        let large =
            RegistryTemplate::compile(TemplateDefinition::new("A much longer pass name", "LONGER"))
                .unwrap();
        assert!(full_deployment(&small) < full_deployment(&large));
    }

    #[test]
    fn savings_percentage() {
        assert_eq!(Cost(50).savings_vs(Cost(100)), 50.0);
        assert_eq!(Cost(50).savings_vs(Cost(0)), 0.0);
    }
}
