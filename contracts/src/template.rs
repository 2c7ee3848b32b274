//! # Registry Templates
//!
//! A [`RegistryTemplate`] is the immutable logic definition every credential
//! registry runs against: collection naming, the role schema, and a code
//! hash identifying the combination. The factory compiles one template and
//! hands each instance an `Arc` to it; only the per-instance state is new.

use humanpass_protocol::config::{MAX_TEMPLATE_NAME_LENGTH, MAX_TEMPLATE_SYMBOL_LENGTH};
use humanpass_protocol::crypto::sha256;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::roles::Role;

/// Errors raised while compiling a template.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template name must not be empty")]
    EmptyName,

    #[error("template name is {0} bytes, the limit is {max}", max = MAX_TEMPLATE_NAME_LENGTH)]
    NameTooLong(usize),

    #[error("template symbol must not be empty")]
    EmptySymbol,

    #[error("template symbol is {0} bytes, the limit is {max}", max = MAX_TEMPLATE_SYMBOL_LENGTH)]
    SymbolTooLong(usize),

    #[error("could not encode template: {0}")]
    Encoding(String),
}

/// The operator-supplied part of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    /// Collection name, e.g. "Human Pass".
    pub name: String,
    /// Collection symbol, e.g. "HPASS".
    pub symbol: String,
}

impl TemplateDefinition {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
        }
    }
}

/// One entry of the compiled role schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    pub role: Role,
    pub id: [u8; 32],
    pub admin_role_id: [u8; 32],
}

/// A compiled, immutable registry template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryTemplate {
    definition: TemplateDefinition,
    role_schema: Vec<RoleDefinition>,
    code_hash: [u8; 32],
}

impl RegistryTemplate {
    /// Validate `definition` and compile it into a template.
    pub fn compile(definition: TemplateDefinition) -> Result<Self, TemplateError> {
        let name_len = definition.name.len();
        if definition.name.trim().is_empty() {
            return Err(TemplateError::EmptyName);
        }
        if name_len > MAX_TEMPLATE_NAME_LENGTH {
            return Err(TemplateError::NameTooLong(name_len));
        }

        let symbol_len = definition.symbol.len();
        if definition.symbol.trim().is_empty() {
            return Err(TemplateError::EmptySymbol);
        }
        if symbol_len > MAX_TEMPLATE_SYMBOL_LENGTH {
            return Err(TemplateError::SymbolTooLong(symbol_len));
        }

        let role_schema: Vec<RoleDefinition> = Role::ALL
            .iter()
            .map(|role| RoleDefinition {
                role: *role,
                id: role.id(),
                admin_role_id: role.admin_role().id(),
            })
            .collect();

        let encoded = bincode::serialize(&(&definition, &role_schema))
            .map_err(|e| TemplateError::Encoding(e.to_string()))?;
        let code_hash = sha256(&encoded);

        Ok(Self {
            definition,
            role_schema,
            code_hash,
        })
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn symbol(&self) -> &str {
        &self.definition.symbol
    }

    pub fn definition(&self) -> &TemplateDefinition {
        &self.definition
    }

    pub fn role_schema(&self) -> &[RoleDefinition] {
        &self.role_schema
    }

    /// SHA-256 over the definition and role schema.
    pub fn code_hash(&self) -> [u8; 32] {
        self.code_hash
    }

    pub fn code_hash_hex(&self) -> String {
        hex::encode(self.code_hash)
    }

    /// Bytes a full, independent deployment has to write for this template.
    pub fn code_size(&self) -> u64 {
        // Serializing an in-memory struct of plain data cannot fail; fall
        // back to the hash length so the size is never understated as zero.
        bincode::serialized_size(self).unwrap_or(self.code_hash.len() as u64)
    }
}
