use serde::Serialize;

/// A row from `ci_installations`: a GitHub App installation Turbine has
/// observed, keyed by GitHub's installation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct Installation {
    pub installation_id: i64,
    pub account_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResourceKind {
    Personal,
    Organization,
    /// Enabled by the user but no longer backed by any account visible to
    /// them (removed from the org, account renamed or transferred).
    Orphaned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResourceState {
    /// Turbine has never observed an installation for this account.
    New,
    Disabled,
    Enabled,
}

/// One entry in the user-facing console listing: a GitHub account merged
/// with Turbine's installation record for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    /// GitHub account id; 0 on orphaned entries, where the account is no
    /// longer visible.
    pub account_id: i64,
    /// Turbine's installation id; 0 until the installation is observed.
    pub installation_id: i64,
    pub kind: ResourceKind,
    pub name: String,
    pub can_disable: bool,
    pub state: ResourceState,
}
