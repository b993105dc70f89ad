//! The scope is bound to the future, not the worker thread: interleaved
//! requests each see only their own, and tasks created with `tokio::spawn`
//! inside a scope do not inherit it.

use std::{future::Future, sync::Arc};

use tracing::{info_span, Instrument, Span};
use uuid::Uuid;

use crate::{error::ServiceError, identity::EffectiveIdentity};

tokio::task_local! {
    static REQUEST_SCOPE: Arc<RequestScope>;
}

#[derive(Debug)]
pub struct RequestScope {
    #[cfg(test)]
    request_id: Uuid,
    identity: EffectiveIdentity,
    logger: Span,
}

impl RequestScope {
    pub fn new(identity: EffectiveIdentity) -> Self {
        let request_id = Uuid::new_v4();
        let logger = info_span!(
            "mcp_request",
            request_id = %request_id,
            effective_username = %identity.effective_username,
        );
        Self {
            #[cfg(test)]
            request_id,
            identity,
            logger,
        }
    }

    #[cfg(test)]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn identity(&self) -> &EffectiveIdentity {
        &self.identity
    }

    pub fn logger(&self) -> &Span {
        &self.logger
    }
}

pub async fn run_in_scope<F, T>(scope: RequestScope, body: F) -> T
where
    F: Future<Output = T>,
{
    let span = scope.logger.clone();
    REQUEST_SCOPE
        .scope(Arc::new(scope), body.instrument(span))
        .await
}

pub fn current_scope() -> Result<Arc<RequestScope>, ServiceError> {
    REQUEST_SCOPE
        .try_with(Arc::clone)
        .map_err(|_| ServiceError::NoActiveScope)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn identity(username: &str) -> EffectiveIdentity {
        EffectiveIdentity {
            requested_email: Some(username.to_string()),
            is_override_allowed: true,
            effective_username: username.to_string(),
        }
    }

    async fn observe_repeatedly(expected: &str, rounds: usize, pause_ms: u64) -> usize {
        let mut seen = 0;
        for _ in 0..rounds {
            let scope = current_scope().expect("scope inside body");
            assert_eq!(scope.identity().effective_username, expected);
            seen += 1;
            tokio::time::sleep(Duration::from_millis(pause_ms)).await;
            tokio::task::yield_now().await;
        }
        seen
    }

    #[tokio::test]
    async fn current_scope_fails_outside_any_scope() {
        let err = current_scope().unwrap_err();
        assert!(matches!(err, ServiceError::NoActiveScope));
    }

    #[tokio::test]
    async fn interleaved_scopes_stay_isolated() {
        let first = run_in_scope(
            RequestScope::new(identity("alice@acme.test")),
            observe_repeatedly("alice@acme.test", 20, 1),
        );
        let second = run_in_scope(
            RequestScope::new(identity("bob@acme.test")),
            observe_repeatedly("bob@acme.test", 20, 2),
        );

        let (a, b) = tokio::join!(first, second);
        assert_eq!((a, b), (20, 20));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn scopes_on_separate_tasks_stay_isolated() {
        let mut handles = Vec::new();
        for i in 0..16 {
            let username = format!("user{i}@acme.test");
            handles.push(tokio::spawn(async move {
                let expected = username.clone();
                run_in_scope(RequestScope::new(identity(&username)), async move {
                    observe_repeatedly(&expected, 10, (i % 3) as u64).await
                })
                .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.expect("task"), 10);
        }
    }

    #[tokio::test]
    async fn scope_is_torn_down_after_body() {
        run_in_scope(RequestScope::new(identity("alice@acme.test")), async {
            assert!(current_scope().is_ok());
        })
        .await;
        assert!(matches!(current_scope(), Err(ServiceError::NoActiveScope)));
    }

    #[tokio::test]
    async fn scope_is_torn_down_after_failed_body() {
        let result: Result<(), &str> =
            run_in_scope(RequestScope::new(identity("alice@acme.test")), async {
                tokio::task::yield_now().await;
                Err("upstream failed")
            })
            .await;
        assert!(result.is_err());
        assert!(current_scope().is_err());
    }

    #[tokio::test]
    async fn nested_scope_shadows_outer_one() {
        run_in_scope(RequestScope::new(identity("outer@acme.test")), async {
            run_in_scope(RequestScope::new(identity("inner@acme.test")), async {
                let scope = current_scope().expect("inner");
                assert_eq!(scope.identity().effective_username, "inner@acme.test");
            })
            .await;
            let scope = current_scope().expect("outer");
            assert_eq!(scope.identity().effective_username, "outer@acme.test");
        })
        .await;
    }

    #[tokio::test]
    async fn each_scope_gets_its_own_request_id() {
        let a = RequestScope::new(identity("a@acme.test"));
        let b = RequestScope::new(identity("a@acme.test"));
        assert_ne!(a.request_id(), b.request_id());
    }
}
