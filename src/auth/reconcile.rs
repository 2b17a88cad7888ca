//! Identity reconciliation: map a provider identity to exactly one local user.
//!
//! Identity is keyed first by `(provider, subject_id)`. Only when no link exists yet
//! is the email used, either to attach the provider to an existing user or to
//! create a new user. The store's uniqueness constraints arbitrate concurrent
//! callbacks; a loser re-reads the winner's row instead of failing.

use thiserror::Error;
use tracing::{error, info, warn};

use super::models::{OAuthProvider, User};
use super::oauth::{OAuthError, ProviderApi, ProviderProfile};
use super::store::{CredentialStore, StoreError};
use crate::common::random::generate_placeholder_password;
use crate::common::{safe_email_log, ApiError};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{0} did not provide a verified email address")]
    MissingEmail(OAuthProvider),

    #[error("OAuth account points at missing user {0}")]
    DanglingLink(i64),

    #[error("provider lookup failed: {0}")]
    Provider(#[from] OAuthError),

    #[error("credential store failed: {0}")]
    Store(#[from] StoreError),
}

impl From<ReconcileError> for ApiError {
    fn from(e: ReconcileError) -> Self {
        match e {
            ReconcileError::MissingEmail(provider) => {
                warn!(provider = %provider, "OAuth login rejected: no verified email");
                ApiError::BadRequest(format!(
                    "Your {} account has no verified email address",
                    provider
                ))
            }
            ReconcileError::Provider(e) => e.into(),
            other => {
                error!(error = %other, "Failed to reconcile OAuth identity");
                ApiError::InternalServer("Failed to process user".into())
            }
        }
    }
}

/// Provider identity with a resolved email, ready to reconcile
#[derive(Debug, Clone)]
pub struct ProviderIdentity {
    pub provider: OAuthProvider,
    pub subject_id: String,
    pub email: String,
    pub name: String,
    /// Serialized provider profile snapshot
    pub profile: String,
}

/// Which branch of reconciliation produced the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The provider identity was already linked
    ExistingLink,
    /// A user with the same email existed and got a new link
    LinkedByEmail,
    /// A new user and link were created
    Created,
}

impl Reconciliation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reconciliation::ExistingLink => "existing_link",
            Reconciliation::LinkedByEmail => "linked_by_email",
            Reconciliation::Created => "created",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconciledUser {
    pub user: User,
    pub outcome: Reconciliation,
}

/// Fetches the provider profile and fills in the email from the secondary lookup
/// when the profile hides it.
pub async fn resolve_identity(
    lookup: &dyn ProviderApi,
    provider: OAuthProvider,
    access_token: &str,
) -> Result<ProviderIdentity, ReconcileError> {
    let ProviderProfile {
        subject_id,
        email,
        name,
        raw,
        ..
    } = lookup.fetch_profile(provider, access_token).await?;

    let email = match email {
        Some(email) => email,
        None => lookup
            .fetch_verified_primary_email(provider, access_token)
            .await?
            .filter(|e| !e.trim().is_empty())
            .ok_or(ReconcileError::MissingEmail(provider))?,
    };

    let name = if name.trim().is_empty() {
        email.split('@').next().unwrap_or_default().to_string()
    } else {
        name
    };

    Ok(ProviderIdentity {
        provider,
        subject_id,
        email,
        name,
        profile: raw.to_string(),
    })
}

pub struct IdentityReconciler<'a> {
    store: &'a CredentialStore,
}

impl<'a> IdentityReconciler<'a> {
    pub fn new(store: &'a CredentialStore) -> Self {
        Self { store }
    }

    /// Provider lookup followed by [`reconcile`](Self::reconcile).
    pub async fn sign_in(
        &self,
        lookup: &dyn ProviderApi,
        provider: OAuthProvider,
        access_token: &str,
    ) -> Result<ReconciledUser, ReconcileError> {
        let identity = resolve_identity(lookup, provider, access_token).await?;
        self.reconcile(&identity).await
    }

    pub async fn reconcile(
        &self,
        identity: &ProviderIdentity,
    ) -> Result<ReconciledUser, ReconcileError> {
        if let Some(resolved) = self.resolve_existing_link(identity).await? {
            return Ok(resolved);
        }

        let (user, outcome) = match self.store.get_user_by_email(&identity.email).await? {
            Some(user) => (user, Reconciliation::LinkedByEmail),
            None => self.create_user_for(identity).await?,
        };

        self.link(user, outcome, identity).await
    }

    async fn resolve_existing_link(
        &self,
        identity: &ProviderIdentity,
    ) -> Result<Option<ReconciledUser>, ReconcileError> {
        let account = match self
            .store
            .get_oauth_account(identity.provider, &identity.subject_id)
            .await?
        {
            Some(account) => account,
            None => return Ok(None),
        };

        let user = self
            .store
            .get_user_by_id(account.user_id)
            .await?
            .ok_or(ReconcileError::DanglingLink(account.user_id))?;

        Ok(Some(ReconciledUser {
            user,
            outcome: Reconciliation::ExistingLink,
        }))
    }

    async fn create_user_for(
        &self,
        identity: &ProviderIdentity,
    ) -> Result<(User, Reconciliation), ReconcileError> {
        let password = generate_placeholder_password();
        match self
            .store
            .create_user(&identity.name, &identity.email, &password)
            .await
        {
            Ok(user) => Ok((user, Reconciliation::Created)),
            Err(StoreError::AlreadyExists(_)) => {
                // Lost a race with a concurrent signup for the same email
                warn!(
                    email = %safe_email_log(&identity.email),
                    "Email claimed concurrently, linking to the existing user"
                );
                let user = self
                    .store
                    .get_user_by_email(&identity.email)
                    .await?
                    .ok_or(StoreError::NotFound("user"))?;
                Ok((user, Reconciliation::LinkedByEmail))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn link(
        &self,
        user: User,
        outcome: Reconciliation,
        identity: &ProviderIdentity,
    ) -> Result<ReconciledUser, ReconcileError> {
        match self
            .store
            .create_oauth_account(
                user.id,
                identity.provider,
                &identity.subject_id,
                &identity.profile,
            )
            .await
        {
            Ok(_) => {
                info!(
                    user_id = user.id,
                    provider = %identity.provider,
                    outcome = outcome.as_str(),
                    "OAuth identity reconciled"
                );
                Ok(ReconciledUser { user, outcome })
            }
            Err(StoreError::AlreadyExists(_)) => {
                // A concurrent callback linked this identity first
                warn!(
                    provider = %identity.provider,
                    provider_id = %identity.subject_id,
                    "OAuth identity linked concurrently, resolving existing link"
                );
                self.resolve_existing_link(identity)
                    .await?
                    .ok_or(ReconcileError::Store(StoreError::NotFound("oauth account")))
            }
            Err(e) => Err(e.into()),
        }
    }
}
