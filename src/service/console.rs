use crate::database::installation::{InstallationRegistry, UserInstallations};
use crate::error::app_error::AppError;
use crate::github::{GithubIdentity, IdentityProvider, OrgMembership};
use crate::models::installation::{Installation, Resource, ResourceKind, ResourceState};
use crate::models::user::User;
use std::collections::HashSet;

/// Console operations over a logged-in user: the reconciled resource
/// listing, and the enable/disable transitions.
pub struct ConsoleService<'a> {
    registry: &'a dyn InstallationRegistry,
    user_installations: &'a dyn UserInstallations,
    github: &'a dyn IdentityProvider,
}

impl<'a> ConsoleService<'a> {
    pub fn new(
        registry: &'a dyn InstallationRegistry,
        user_installations: &'a dyn UserInstallations,
        github: &'a dyn IdentityProvider,
    ) -> Self {
        ConsoleService {
            registry,
            user_installations,
            github,
        }
    }

    /// Reconcile the user's GitHub view with Turbine's installation records.
    /// Read-only: any upstream failure aborts with no partial result, and a
    /// retry is always safe.
    pub async fn list_resources(&self, user: &User) -> Result<Vec<Resource>, AppError> {
        let token = user.credential().ok_or(AppError::Unauthorized)?;

        let identity = self.github.identity(token).await?;
        let memberships = self.github.active_org_memberships(token).await?;
        let enabled_ids = self.user_installations.enabled_installation_ids(user.id).await?;

        let mut account_ids = Vec::with_capacity(memberships.len() + 1);
        account_ids.push(identity.account_id);
        account_ids.extend(memberships.iter().map(|m| m.account_id));

        let registry = self.registry.list_installations(&account_ids).await?;

        Ok(merge_resources(&identity, &memberships, &registry, &enabled_ids))
    }

    /// Mark an installation enabled for this user, then in the registry.
    /// Idempotent on the user side; a registry failure after the user-side
    /// write is reported and healed by the next reconciliation.
    pub async fn enable(&self, user: &User, installation_id: i64) -> Result<(), AppError> {
        // TODO check the user's plan quota before enabling
        self.user_installations.record_enabled(user.id, installation_id).await?;
        self.registry.set_installation_enabled(installation_id, true).await?;

        Ok(())
    }

    /// Disable an installation. Only the user who enabled it may disable
    /// it; anything else is rejected before any write happens.
    pub async fn disable(&self, user: &User, installation_id: i64) -> Result<(), AppError> {
        if !self.user_installations.installation_enabled_by_user(user.id, installation_id).await {
            return Err(AppError::Forbidden("installation not enabled for this user".to_string()));
        }

        self.user_installations.record_disabled(user.id, installation_id).await?;
        self.registry.set_installation_enabled(installation_id, false).await?;

        Ok(())
    }
}

/// Merge the user's identity and org memberships with the registry rows for
/// those accounts and the user's enabled set.
///
/// The personal account seeds the list, followed by org memberships in
/// provider order. A registry match moves an entry from New to Disabled; an
/// enabled-set match upgrades it to Enabled and claims the id. Whatever the
/// enabled set has left after that no longer corresponds to any visible
/// account and comes back as an Orphaned entry.
///
/// Duplicate account ids in `memberships` are not deduplicated: the
/// provider does not send them, and if it ever does the listing should show
/// it rather than hide it.
pub fn merge_resources(
    identity: &GithubIdentity,
    memberships: &[OrgMembership],
    registry: &[Installation],
    enabled_ids: &[i64],
) -> Vec<Resource> {
    let mut resources = Vec::with_capacity(memberships.len() + 1);

    resources.push(Resource {
        account_id: identity.account_id,
        installation_id: 0,
        kind: ResourceKind::Personal,
        name: identity.login.clone(),
        can_disable: true,
        state: ResourceState::New,
    });

    for membership in memberships {
        resources.push(Resource {
            account_id: membership.account_id,
            installation_id: 0,
            kind: ResourceKind::Organization,
            name: membership.login.clone(),
            can_disable: false,
            state: ResourceState::New,
        });
    }

    let mut unclaimed: HashSet<i64> = enabled_ids.iter().copied().collect();

    for resource in &mut resources {
        for installation in registry {
            if installation.account_id != resource.account_id {
                continue;
            }

            resource.installation_id = installation.installation_id;
            resource.state = ResourceState::Disabled;
            if unclaimed.remove(&installation.installation_id) {
                resource.state = ResourceState::Enabled;
            }
        }
    }

    // Enabled installations the user can no longer see, e.g. after being
    // removed from an organization.
    for installation_id in unclaimed {
        resources.push(Resource {
            account_id: 0,
            installation_id,
            kind: ResourceKind::Orphaned,
            name: format!("Unknown, Installation ID {}", installation_id),
            can_disable: false,
            state: ResourceState::Enabled,
        });
    }

    resources
}
