use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    client_factory::ClientFactory,
    config::ServiceConfig,
    error::ServiceError,
    identity::{EffectiveIdentity, IdentityResolver},
    models::{Article, ArticleSearchParams, NewTicket, Ticket},
    zendesk::HelpCenterApi,
};

#[derive(Default)]
pub struct StubApi {
    pub articles: Vec<Article>,
    pub article: Option<Article>,
    pub fail_with: Option<(u16, String)>,
    pub searches: Mutex<Vec<ArticleSearchParams>>,
    pub lookups: Mutex<Vec<(String, u64)>>,
    pub tickets: Mutex<Vec<NewTicket>>,
}

impl StubApi {
    fn failure(&self) -> Result<(), ServiceError> {
        match &self.fail_with {
            Some((status, message)) => Err(ServiceError::Upstream {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HelpCenterApi for StubApi {
    async fn search_articles(
        &self,
        params: &ArticleSearchParams,
    ) -> Result<Vec<Article>, ServiceError> {
        self.searches.lock().unwrap().push(params.clone());
        self.failure()?;
        Ok(self.articles.clone())
    }

    async fn show_article(
        &self,
        locale: &str,
        article_id: u64,
    ) -> Result<Option<Article>, ServiceError> {
        self.lookups
            .lock()
            .unwrap()
            .push((locale.to_string(), article_id));
        self.failure()?;
        Ok(self.article.clone())
    }

    async fn create_ticket(&self, ticket: &NewTicket) -> Result<Ticket, ServiceError> {
        self.tickets.lock().unwrap().push(ticket.clone());
        self.failure()?;
        Ok(Ticket {
            id: 1001,
            url: Some("https://acme.zendesk.com/api/v2/tickets/1001.json".to_string()),
            subject: Some(ticket.subject.clone()),
            status: Some("new".to_string()),
            priority: Some("normal".to_string()),
            ticket_type: None,
            created_at: None,
            updated_at: None,
        })
    }
}

pub struct StubFactory {
    pub api: Arc<StubApi>,
    pub identities: Mutex<Vec<String>>,
}

impl StubFactory {
    pub fn new(api: StubApi) -> Self {
        Self {
            api: Arc::new(api),
            identities: Mutex::new(Vec::new()),
        }
    }
}

impl ClientFactory for StubFactory {
    fn create_client(
        &self,
        identity: &EffectiveIdentity,
    ) -> Result<Arc<dyn HelpCenterApi>, ServiceError> {
        self.identities
            .lock()
            .unwrap()
            .push(identity.effective_username.clone());
        Ok(self.api.clone() as Arc<dyn HelpCenterApi>)
    }
}

pub struct PanickingFactory;

impl ClientFactory for PanickingFactory {
    fn create_client(
        &self,
        _identity: &EffectiveIdentity,
    ) -> Result<Arc<dyn HelpCenterApi>, ServiceError> {
        panic!("client construction exploded");
    }
}

pub fn service_config(allow_per_request_identity: bool) -> Arc<ServiceConfig> {
    Arc::new(ServiceConfig {
        subdomain: "acme".to_string(),
        service_username: "service@acme.test".to_string(),
        service_token: "secret".to_string(),
        allow_per_request_identity,
        api_base_url: "https://acme.zendesk.com".to_string(),
    })
}

pub fn resolver(allow_per_request_identity: bool) -> IdentityResolver {
    IdentityResolver::new(service_config(allow_per_request_identity))
}
