//! # Credential Registry Contract
//!
//! A registry of soulbound credentials: each holder owns at most one, an
//! issuer can only mint to itself, and nothing ever changes hands.
//!
//! ## Lifecycle of a credential id
//!
//! ```text
//! NonExistent --mint--> Live --burn--> NonExistent --mint--> Live ...
//! ```
//!
//! There is no `Live -> Live` transition. Every custody-changing entry point
//! (`transfer_from`, `safe_transfer_from`, `approve`,
//! `set_approval_for_all`) funnels into one function that always returns
//! [`RegistryError::NonTransferable`], and those entry points take `&self`,
//! so they cannot touch state even by accident.
//!
//! ## Security Model
//!
//! - **Initialization**: registries produced by the factory start empty and
//!   get their admin and issuer through a one-shot [`initialize`].
//! - **Mint gating**: callers need the `Issuer` role and may only name
//!   themselves as holder.
//! - **Burn authorization**: decided per credential by its
//!   [`RevocationMode`].
//! - **Atomicity**: every operation validates completely before its first
//!   write, so a failed call leaves no trace.
//!
//! [`initialize`]: CredentialRegistry::initialize

use chrono::{DateTime, Utc};
use humanpass_protocol::identity::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::cost::{self, Cost};
use crate::roles::{Role, RoleSet};
use crate::template::{RegistryTemplate, TemplateDefinition, TemplateError};

/// Roles that count as the issuing side for burns.
const ISSUER_SIDE: [Role; 3] = [Role::Admin, Role::Issuer, Role::Burner];

/// First id handed out by [`CredentialRegistry::issue`].
const FIRST_CREDENTIAL_ID: CredentialId = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Every way a registry operation can be refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// `initialize` was already called on this registry.
    #[error("registry already initialized")]
    AlreadyInitialized,

    /// A mutating call arrived before `initialize`.
    #[error("registry not initialized")]
    NotInitialized,

    /// The caller lacks the role the operation requires.
    #[error("unauthorized: caller lacks the {0} role")]
    Unauthorized(Role),

    /// An issuer tried to mint a credential naming someone else.
    #[error("issuers may only mint credentials naming themselves as holder")]
    SelfIssuanceViolation,

    /// The recipient already holds a live credential.
    #[error("holder {0} already has a live credential")]
    DuplicateHolder(Address),

    /// The requested id belongs to a live credential.
    #[error("credential id {0} is already live")]
    DuplicateId(CredentialId),

    /// No live credential has this id.
    #[error("credential {0} not found")]
    NotFound(CredentialId),

    /// The caller may not burn this credential under its revocation mode.
    #[error("access denied: caller may not burn credential {0}")]
    Forbidden(CredentialId),

    /// The credential's revocation mode forbids burning altogether.
    #[error("burning is not allowed for credential {0}")]
    NotAllowed(CredentialId),

    /// Credentials never change custody.
    #[error("credentials are non-transferable")]
    NonTransferable,

    /// `grant_role`/`revoke_role` was asked to touch the admin role.
    #[error("the admin role only changes through an admin transfer")]
    AdminRoleManaged,
}

impl RegistryError {
    /// Stable, machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::AlreadyInitialized => "AlreadyInitialized",
            RegistryError::NotInitialized => "NotInitialized",
            RegistryError::Unauthorized(_) => "Unauthorized",
            RegistryError::SelfIssuanceViolation => "SelfIssuanceViolation",
            RegistryError::DuplicateHolder(_) => "DuplicateHolder",
            RegistryError::DuplicateId(_) => "DuplicateId",
            RegistryError::NotFound(_) => "NotFound",
            RegistryError::Forbidden(_) => "Forbidden",
            RegistryError::NotAllowed(_) => "NotAllowed",
            RegistryError::NonTransferable => "NonTransferable",
            RegistryError::AdminRoleManaged => "AdminRoleManaged",
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Identifier of a credential within one registry.
pub type CredentialId = u64;

/// Who may burn a credential. Fixed at mint time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RevocationMode {
    /// Admin, issuers, and burners.
    IssuerOnly,
    /// The holder, plus everyone `IssuerOnly` allows.
    Both,
    /// Nobody. The credential is permanent.
    Neither,
}

impl RevocationMode {
    /// Wire code used by the reference ABI.
    pub fn code(&self) -> u8 {
        match self {
            RevocationMode::IssuerOnly => 1,
            RevocationMode::Both => 2,
            RevocationMode::Neither => 3,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(RevocationMode::IssuerOnly),
            2 => Some(RevocationMode::Both),
            3 => Some(RevocationMode::Neither),
            _ => None,
        }
    }
}

impl fmt::Display for RevocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevocationMode::IssuerOnly => write!(f, "IssuerOnly"),
            RevocationMode::Both => write!(f, "Both"),
            RevocationMode::Neither => write!(f, "Neither"),
        }
    }
}

impl FromStr for RevocationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(code) = s.parse::<u8>() {
            return Self::from_code(code).ok_or_else(|| format!("unknown revocation code: {code}"));
        }
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "issueronly" => Ok(RevocationMode::IssuerOnly),
            "both" => Ok(RevocationMode::Both),
            "neither" => Ok(RevocationMode::Neither),
            _ => Err(format!("unknown revocation mode: {s}")),
        }
    }
}

/// One issued pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub holder: Address,
    pub mode: RevocationMode,
    /// The issuer that minted it. Always equal to `holder` under
    /// self-issuance, kept separately so history survives policy changes.
    pub issuer: Address,
    pub issued_at: DateTime<Utc>,
}

/// Things that happened, recorded after the operation committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryEvent {
    Initialized {
        admin: Address,
        issuer: Address,
    },
    Issued {
        id: CredentialId,
        holder: Address,
        issuer: Address,
        mode: RevocationMode,
    },
    Revoked {
        id: CredentialId,
        holder: Address,
        by: Address,
    },
    RoleGranted {
        role: Role,
        account: Address,
        by: Address,
    },
    RoleRevoked {
        role: Role,
        account: Address,
        by: Address,
    },
}

/// The per-instance mutable state. Everything else a registry needs comes
/// from its shared [`RegistryTemplate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryState {
    credentials: HashMap<CredentialId, Credential>,
    holder_index: HashMap<Address, CredentialId>,
    roles: RoleSet,
    initialized: bool,
    next_id: CredentialId,
    #[serde(skip)]
    pending_events: Vec<RegistryEvent>,
}

impl RegistryState {
    /// Fresh, uninitialized state.
    pub fn new() -> Self {
        Self {
            credentials: HashMap::new(),
            holder_index: HashMap::new(),
            roles: RoleSet::new(),
            initialized: false,
            next_id: FIRST_CREDENTIAL_ID,
            pending_events: Vec::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Live credentials, sorted by id.
    pub fn credentials(&self) -> Vec<&Credential> {
        let mut out: Vec<&Credential> = self.credentials.values().collect();
        out.sort_by_key(|c| c.id);
        out
    }
}

impl Default for RegistryState {
    fn default() -> Self {
        Self::new()
    }
}

/// A mutating registry operation, as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RegistryCall {
    Initialize {
        admin: Address,
        issuer: Address,
    },
    Mint {
        to: Address,
        id: CredentialId,
        mode: RevocationMode,
    },
    Issue {
        to: Address,
        mode: RevocationMode,
    },
    Burn {
        id: CredentialId,
    },
    TransferAdminRole {
        new_admin: Address,
    },
    GrantRole {
        role: Role,
        account: Address,
    },
    RevokeRole {
        role: Role,
        account: Address,
    },
    TransferFrom {
        from: Address,
        to: Address,
        id: CredentialId,
    },
    SafeTransferFrom {
        from: Address,
        to: Address,
        id: CredentialId,
    },
    Approve {
        spender: Address,
        id: CredentialId,
    },
    SetApprovalForAll {
        operator: Address,
        approved: bool,
    },
}

impl RegistryCall {
    /// Short operation name for logs and metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            RegistryCall::Initialize { .. } => "initialize",
            RegistryCall::Mint { .. } => "mint",
            RegistryCall::Issue { .. } => "issue",
            RegistryCall::Burn { .. } => "burn",
            RegistryCall::TransferAdminRole { .. } => "transfer_admin_role",
            RegistryCall::GrantRole { .. } => "grant_role",
            RegistryCall::RevokeRole { .. } => "revoke_role",
            RegistryCall::TransferFrom { .. } => "transfer_from",
            RegistryCall::SafeTransferFrom { .. } => "safe_transfer_from",
            RegistryCall::Approve { .. } => "approve",
            RegistryCall::SetApprovalForAll { .. } => "set_approval_for_all",
        }
    }
}

/// What a successful [`RegistryCall`] produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallOutcome {
    Completed,
    Issued { id: CredentialId },
}

// ---------------------------------------------------------------------------
// CredentialRegistry
// ---------------------------------------------------------------------------

/// A credential registry: shared template logic bound to isolated state.
#[derive(Debug, Clone)]
pub struct CredentialRegistry {
    template: Arc<RegistryTemplate>,
    state: RegistryState,
}

impl CredentialRegistry {
    /// Bind existing state to a shared template. This is all the factory
    /// does per instance.
    pub fn bind(template: Arc<RegistryTemplate>, state: RegistryState) -> Self {
        Self { template, state }
    }

    /// Deploy a fully independent registry that compiles and owns its own
    /// template, returning it with the construction cost paid.
    pub fn deploy(definition: TemplateDefinition) -> Result<(Self, Cost), TemplateError> {
        let template = RegistryTemplate::compile(definition)?;
        let paid = cost::full_deployment(&template);
        Ok((Self::bind(Arc::new(template), RegistryState::new()), paid))
    }

    // -- Setup ---------------------------------------------------------------

    /// One-time setup: `admin` becomes the sole admin, `issuer` gets the
    /// issuer and burner roles.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyInitialized`] on every call after the
    /// first; nothing changes.
    pub fn initialize(&mut self, admin: Address, issuer: Address) -> Result<(), RegistryError> {
        if self.state.initialized {
            return Err(RegistryError::AlreadyInitialized);
        }

        self.state.roles.replace_all(Role::Admin, admin);
        self.state.roles.grant(Role::Issuer, issuer);
        self.state.roles.grant(Role::Burner, issuer);
        self.state.initialized = true;

        info!(admin = %admin.short(), issuer = %issuer.short(), "registry initialized");
        self.record(RegistryEvent::Initialized { admin, issuer });
        Ok(())
    }

    // -- Issuance ------------------------------------------------------------

    /// Mint credential `id` to `to`.
    ///
    /// # Errors
    ///
    /// Checked in this order: [`NotInitialized`], [`Unauthorized`] (caller
    /// is not an issuer), [`SelfIssuanceViolation`] (`to != caller`),
    /// [`DuplicateHolder`], [`DuplicateId`].
    ///
    /// [`NotInitialized`]: RegistryError::NotInitialized
    /// [`Unauthorized`]: RegistryError::Unauthorized
    /// [`SelfIssuanceViolation`]: RegistryError::SelfIssuanceViolation
    /// [`DuplicateHolder`]: RegistryError::DuplicateHolder
    /// [`DuplicateId`]: RegistryError::DuplicateId
    pub fn mint(
        &mut self,
        caller: &Address,
        to: Address,
        id: CredentialId,
        mode: RevocationMode,
    ) -> Result<(), RegistryError> {
        self.check_issuance(caller, &to)?;
        if self.state.credentials.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }

        self.insert_credential(*caller, to, id, mode);
        Ok(())
    }

    /// Mint to `to` under the next free registry-assigned id.
    ///
    /// Same authorization as [`mint`](Self::mint); cannot collide with a
    /// caller-chosen id because live ids are skipped.
    pub fn issue(
        &mut self,
        caller: &Address,
        to: Address,
        mode: RevocationMode,
    ) -> Result<CredentialId, RegistryError> {
        self.check_issuance(caller, &to)?;

        let mut id = self.state.next_id;
        while self.state.credentials.contains_key(&id) {
            id = id.wrapping_add(1);
        }
        self.state.next_id = id.wrapping_add(1);

        self.insert_credential(*caller, to, id, mode);
        Ok(id)
    }

    fn check_issuance(&self, caller: &Address, to: &Address) -> Result<(), RegistryError> {
        if !self.state.initialized {
            return Err(RegistryError::NotInitialized);
        }
        if !self.state.roles.has(Role::Issuer, caller) {
            return Err(RegistryError::Unauthorized(Role::Issuer));
        }
        if to != caller {
            return Err(RegistryError::SelfIssuanceViolation);
        }
        if self.state.holder_index.contains_key(to) {
            return Err(RegistryError::DuplicateHolder(*to));
        }
        Ok(())
    }

    fn insert_credential(
        &mut self,
        issuer: Address,
        holder: Address,
        id: CredentialId,
        mode: RevocationMode,
    ) {
        let credential = Credential {
            id,
            holder,
            mode,
            issuer,
            issued_at: Utc::now(),
        };
        self.state.credentials.insert(id, credential);
        self.state.holder_index.insert(holder, id);

        info!(id, holder = %holder.short(), %mode, "credential issued");
        self.record(RegistryEvent::Issued {
            id,
            holder,
            issuer,
            mode,
        });
    }

    // -- Revocation ----------------------------------------------------------

    /// Burn credential `id`, freeing the id and the holder slot.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] if `id` is not live,
    /// [`RegistryError::NotAllowed`] under [`RevocationMode::Neither`], and
    /// [`RegistryError::Forbidden`] when the caller is outside the mode's
    /// allowed set.
    pub fn burn(&mut self, caller: &Address, id: CredentialId) -> Result<(), RegistryError> {
        let credential = self
            .state
            .credentials
            .get(&id)
            .ok_or(RegistryError::NotFound(id))?;

        let issuer_side = self.state.roles.has_any(&ISSUER_SIDE, caller);
        let permitted = match credential.mode {
            RevocationMode::Neither => return Err(RegistryError::NotAllowed(id)),
            RevocationMode::IssuerOnly => issuer_side,
            RevocationMode::Both => issuer_side || credential.holder == *caller,
        };
        if !permitted {
            return Err(RegistryError::Forbidden(id));
        }

        let holder = credential.holder;
        self.state.credentials.remove(&id);
        self.state.holder_index.remove(&holder);

        info!(id, holder = %holder.short(), by = %caller.short(), "credential revoked");
        self.record(RegistryEvent::Revoked {
            id,
            holder,
            by: *caller,
        });
        Ok(())
    }

    // -- Roles ---------------------------------------------------------------

    /// Hand the admin role to `new_admin`. The admin count is one before and
    /// after; there is no intermediate state.
    pub fn transfer_admin_role(
        &mut self,
        caller: &Address,
        new_admin: Address,
    ) -> Result<(), RegistryError> {
        self.require_admin(caller)?;
        if new_admin == *caller {
            return Ok(());
        }

        let previous = self.state.roles.replace_all(Role::Admin, new_admin);

        info!(from = %caller.short(), to = %new_admin.short(), "admin role transferred");
        for account in previous {
            self.record(RegistryEvent::RoleRevoked {
                role: Role::Admin,
                account,
                by: *caller,
            });
        }
        self.record(RegistryEvent::RoleGranted {
            role: Role::Admin,
            account: new_admin,
            by: *caller,
        });
        Ok(())
    }

    /// Add `account` to `role` (issuer or burner). Admin only.
    pub fn grant_role(
        &mut self,
        caller: &Address,
        role: Role,
        account: Address,
    ) -> Result<(), RegistryError> {
        self.require_admin(caller)?;
        if role == Role::Admin {
            return Err(RegistryError::AdminRoleManaged);
        }

        if self.state.roles.grant(role, account) {
            info!(%role, account = %account.short(), "role granted");
            self.record(RegistryEvent::RoleGranted {
                role,
                account,
                by: *caller,
            });
        }
        Ok(())
    }

    /// Remove `account` from `role` (issuer or burner). Admin only.
    pub fn revoke_role(
        &mut self,
        caller: &Address,
        role: Role,
        account: Address,
    ) -> Result<(), RegistryError> {
        self.require_admin(caller)?;
        if role == Role::Admin {
            return Err(RegistryError::AdminRoleManaged);
        }

        if self.state.roles.revoke(role, &account) {
            info!(%role, account = %account.short(), "role revoked");
            self.record(RegistryEvent::RoleRevoked {
                role,
                account,
                by: *caller,
            });
        }
        Ok(())
    }

    fn require_admin(&self, caller: &Address) -> Result<(), RegistryError> {
        if !self.state.initialized {
            return Err(RegistryError::NotInitialized);
        }
        if !self.state.roles.has(Role::Admin, caller) {
            return Err(RegistryError::Unauthorized(Role::Admin));
        }
        Ok(())
    }

    // -- Custody -------------------------------------------------------------

    /// Always fails: credentials are soulbound.
    pub fn transfer_from(
        &self,
        caller: &Address,
        _from: &Address,
        _to: &Address,
        id: CredentialId,
    ) -> Result<(), RegistryError> {
        self.reject_custody_change(caller, "transfer_from", Some(id))
    }

    /// Always fails: credentials are soulbound.
    pub fn safe_transfer_from(
        &self,
        caller: &Address,
        _from: &Address,
        _to: &Address,
        id: CredentialId,
    ) -> Result<(), RegistryError> {
        self.reject_custody_change(caller, "safe_transfer_from", Some(id))
    }

    /// Always fails: there is nothing an approved spender could do.
    pub fn approve(
        &self,
        caller: &Address,
        _spender: &Address,
        id: CredentialId,
    ) -> Result<(), RegistryError> {
        self.reject_custody_change(caller, "approve", Some(id))
    }

    /// Always fails, whatever `approved` says.
    pub fn set_approval_for_all(
        &self,
        caller: &Address,
        _operator: &Address,
        _approved: bool,
    ) -> Result<(), RegistryError> {
        self.reject_custody_change(caller, "set_approval_for_all", None)
    }

    /// The single exit for every custody change. Add new transfer-like entry
    /// points by calling this, never by writing to `holder`.
    fn reject_custody_change(
        &self,
        caller: &Address,
        operation: &'static str,
        id: Option<CredentialId>,
    ) -> Result<(), RegistryError> {
        debug!(operation, ?id, caller = %caller.short(), "custody change rejected");
        Err(RegistryError::NonTransferable)
    }

    // -- Dispatch ------------------------------------------------------------

    /// Run any [`RegistryCall`] as `caller`.
    pub fn execute(
        &mut self,
        caller: &Address,
        call: RegistryCall,
    ) -> Result<CallOutcome, RegistryError> {
        match call {
            RegistryCall::Initialize { admin, issuer } => self.initialize(admin, issuer)?,
            RegistryCall::Mint { to, id, mode } => self.mint(caller, to, id, mode)?,
            RegistryCall::Issue { to, mode } => {
                let id = self.issue(caller, to, mode)?;
                return Ok(CallOutcome::Issued { id });
            }
            RegistryCall::Burn { id } => self.burn(caller, id)?,
            RegistryCall::TransferAdminRole { new_admin } => {
                self.transfer_admin_role(caller, new_admin)?
            }
            RegistryCall::GrantRole { role, account } => self.grant_role(caller, role, account)?,
            RegistryCall::RevokeRole { role, account } => {
                self.revoke_role(caller, role, account)?
            }
            RegistryCall::TransferFrom { from, to, id } => {
                self.transfer_from(caller, &from, &to, id)?
            }
            RegistryCall::SafeTransferFrom { from, to, id } => {
                self.safe_transfer_from(caller, &from, &to, id)?
            }
            RegistryCall::Approve { spender, id } => self.approve(caller, &spender, id)?,
            RegistryCall::SetApprovalForAll { operator, approved } => {
                self.set_approval_for_all(caller, &operator, approved)?
            }
        }
        Ok(CallOutcome::Completed)
    }

    /// Run `call` as `caller`, then hand the new state to `commit`.
    ///
    /// If `commit` fails the registry is put back exactly as it was before
    /// the call and its events are dropped, so a call is never visible in
    /// memory without having been committed.
    pub fn execute_committed<E, F>(
        &mut self,
        caller: &Address,
        call: RegistryCall,
        commit: F,
    ) -> Result<(CallOutcome, Vec<RegistryEvent>), E>
    where
        E: From<RegistryError>,
        F: FnOnce(&RegistryState) -> Result<(), E>,
    {
        let before = self.state.clone();
        let outcome = self.execute(caller, call)?;
        let events = self.take_events();
        if let Err(err) = commit(&self.state) {
            debug!(events = events.len(), "registry call rolled back");
            self.state = before;
            return Err(err);
        }
        Ok((outcome, events))
    }

    // -- Queries -------------------------------------------------------------

    /// Holder of live credential `id`.
    pub fn owner_of(&self, id: CredentialId) -> Result<Address, RegistryError> {
        self.state
            .credentials
            .get(&id)
            .map(|c| c.holder)
            .ok_or(RegistryError::NotFound(id))
    }

    /// The live credential held by `holder`, if any.
    pub fn holder_credential_id(&self, holder: &Address) -> Option<CredentialId> {
        self.state.holder_index.get(holder).copied()
    }

    /// Revocation mode of live credential `id`.
    pub fn revocation_mode(&self, id: CredentialId) -> Result<RevocationMode, RegistryError> {
        self.state
            .credentials
            .get(&id)
            .map(|c| c.mode)
            .ok_or(RegistryError::NotFound(id))
    }

    pub fn credential(&self, id: CredentialId) -> Option<&Credential> {
        self.state.credentials.get(&id)
    }

    /// 1 if `holder` has a live credential, else 0.
    pub fn balance_of(&self, holder: &Address) -> u64 {
        u64::from(self.state.holder_index.contains_key(holder))
    }

    /// Number of live credentials.
    pub fn total_supply(&self) -> u64 {
        self.state.credentials.len() as u64
    }

    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.state.roles.has(role, account)
    }

    pub fn role_member_count(&self, role: Role) -> usize {
        self.state.roles.member_count(role)
    }

    /// Number of admins. 1 for every initialized registry.
    pub fn admin_holder_count(&self) -> usize {
        self.role_member_count(Role::Admin)
    }

    pub fn role_members(&self, role: Role) -> Vec<Address> {
        self.state.roles.members(role)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.initialized
    }

    pub fn name(&self) -> &str {
        self.template.name()
    }

    pub fn symbol(&self) -> &str {
        self.template.symbol()
    }

    pub fn code_hash(&self) -> [u8; 32] {
        self.template.code_hash()
    }

    pub fn template(&self) -> &Arc<RegistryTemplate> {
        &self.template
    }

    pub fn state(&self) -> &RegistryState {
        &self.state
    }

    // -- Events --------------------------------------------------------------

    /// Drain events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<RegistryEvent> {
        std::mem::take(&mut self.state.pending_events)
    }

    fn record(&mut self, event: RegistryEvent) {
        self.state.pending_events.push(event);
    }
}
