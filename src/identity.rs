use std::sync::Arc;

use tracing::{debug, info};

use crate::config::ServiceConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveIdentity {
    pub requested_email: Option<String>,
    pub is_override_allowed: bool,
    pub effective_username: String,
}

impl EffectiveIdentity {
    pub fn service(config: &ServiceConfig) -> Self {
        Self {
            requested_email: None,
            is_override_allowed: config.allow_per_request_identity,
            effective_username: config.service_username.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentityResolver {
    config: Arc<ServiceConfig>,
}

impl IdentityResolver {
    pub fn new(config: Arc<ServiceConfig>) -> Self {
        info!(
            subdomain = %config.subdomain,
            username = %config.service_username,
            allow_user_email = config.allow_per_request_identity,
            "Zendesk configuration loaded"
        );
        Self { config }
    }

    pub fn resolve(&self, requested_email: Option<&str>) -> EffectiveIdentity {
        let requested_email = requested_email
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(ToString::to_string);
        let is_override_allowed = self.config.allow_per_request_identity;

        let effective_username = match (&requested_email, is_override_allowed) {
            (Some(email), true) => email.clone(),
            _ => self.config.service_username.clone(),
        };

        debug!(
            requested_email = requested_email.as_deref().unwrap_or(""),
            effective_username = %effective_username,
            is_override_allowed,
            "Resolved request identity"
        );

        EffectiveIdentity {
            requested_email,
            is_override_allowed,
            effective_username,
        }
    }
}

// Explicit email, then the caller's own when overrides are allowed, else
// Zendesk's default.
pub fn requester_email_for_ticket(
    identity: &EffectiveIdentity,
    explicit_email: Option<&str>,
) -> Option<String> {
    if let Some(explicit) = explicit_email.filter(|email| !email.is_empty()) {
        debug!(explicit_requester_email = %explicit, "Using explicitly provided requester email");
        return Some(explicit.to_string());
    }

    if identity.is_override_allowed {
        if let Some(email) = &identity.requested_email {
            debug!(user_email = %email, "Using user email as requester email");
            return Some(email.clone());
        }
    }

    debug!("No requester email set, using Zendesk default");
    None
}
