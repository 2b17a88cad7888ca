// Application state shared across all modules

use std::sync::Arc;

use crate::auth::oauth::{OAuthClient, ProviderApi};
use crate::auth::reset::ResetDelivery;
use crate::auth::store::CredentialStore;
use crate::auth::tokens::TokenService;
use crate::common::config::AppConfig;

/// Application state: the credential store handle, token service and OAuth plumbing.
///
/// Built once in `main` and shared as `Extension<Arc<AppState>>`. Nothing in here is
/// mutated after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: CredentialStore,
    pub tokens: TokenService,
    pub oauth: OAuthClient,
    pub provider_api: Arc<dyn ProviderApi>,
    pub reset_delivery: Arc<dyn ResetDelivery>,
}
