use std::sync::Arc;

use tracing::debug;

use crate::{
    config::ServiceConfig,
    error::ServiceError,
    identity::EffectiveIdentity,
    zendesk::{HelpCenterApi, ZendeskClient, ZendeskCredentials},
};

/// Must return a new client on every call; clients carry credentials and are
/// never shared between requests.
pub trait ClientFactory: Send + Sync {
    fn create_client(
        &self,
        identity: &EffectiveIdentity,
    ) -> Result<Arc<dyn HelpCenterApi>, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct ZendeskClientFactory {
    config: Arc<ServiceConfig>,
}

impl ZendeskClientFactory {
    pub fn new(config: Arc<ServiceConfig>) -> Self {
        Self { config }
    }

    pub fn credentials_for(&self, identity: &EffectiveIdentity) -> ZendeskCredentials {
        ZendeskCredentials {
            subdomain: self.config.subdomain.clone(),
            username: format!("{}/token", identity.effective_username),
            token: self.config.service_token.clone(),
        }
    }

    pub fn create_client_from_config(&self) -> Result<Arc<dyn HelpCenterApi>, ServiceError> {
        self.create_client(&EffectiveIdentity::service(&self.config))
    }

    fn build(&self, identity: &EffectiveIdentity) -> Result<ZendeskClient, ServiceError> {
        ZendeskClient::new(&self.config.api_base_url, self.credentials_for(identity))
    }
}

impl ClientFactory for ZendeskClientFactory {
    fn create_client(
        &self,
        identity: &EffectiveIdentity,
    ) -> Result<Arc<dyn HelpCenterApi>, ServiceError> {
        debug!(
            subdomain = %self.config.subdomain,
            username = %identity.effective_username,
            "Creating Zendesk client"
        );
        let client: Arc<dyn HelpCenterApi> = Arc::new(self.build(identity)?);
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> ZendeskClientFactory {
        ZendeskClientFactory::new(Arc::new(ServiceConfig {
            subdomain: "acme".to_string(),
            service_username: "service@acme.test".to_string(),
            service_token: "secret".to_string(),
            allow_per_request_identity: true,
            api_base_url: "https://acme.zendesk.com".to_string(),
        }))
    }

    fn identity(username: &str) -> EffectiveIdentity {
        EffectiveIdentity {
            requested_email: Some(username.to_string()),
            is_override_allowed: true,
            effective_username: username.to_string(),
        }
    }

    #[test]
    fn binds_token_suffixed_username() {
        let client = factory().build(&identity("user@acme.test")).expect("client");
        assert_eq!(
            client.credentials(),
            &ZendeskCredentials {
                subdomain: "acme".to_string(),
                username: "user@acme.test/token".to_string(),
                token: "secret".to_string(),
            }
        );
    }

    #[test]
    fn never_reuses_a_client() {
        let factory = factory();
        let identity = identity("user@acme.test");
        let first = factory.create_client(&identity).expect("first");
        let second = factory.create_client(&identity).expect("second");
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn config_variant_uses_service_identity() {
        let factory = factory();
        let credentials =
            factory.credentials_for(&EffectiveIdentity::service(&factory.config));
        assert_eq!(credentials.username, "service@acme.test/token");
        assert!(factory.create_client_from_config().is_ok());
    }
}
