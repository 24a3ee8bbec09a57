//! # Mock Framework
//!
//! Utilities for testing clients and the orchestrator in isolation.
//!
//! Use [`create_mock_client`] to get a client and a receiver.
//! Then use helpers like [`expect_create`] or [`expect_action`] to assert behavior.
//! [`spawn_relay`] puts a mock client in front of a real collection actor to
//! delay or fail chosen requests. [`ScriptedGateway`] stands in for the
//! payment provider.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::actor_framework::{Entity, Filter, ResourceClient, ResourceRequest};
use crate::domain::GatewayCorrelation;
use crate::gateway::{GatewayError, PaymentGateway};

type Reply<R, T> = oneshot::Sender<Result<R, <T as Entity>::Error>>;

/// Creates a mock client and a receiver for asserting requests.
///
/// The client sends to a channel the test controls, so the test plays the
/// collection actor: it inspects each request and decides the reply
/// (success, failure, or no reply at all).
pub fn create_mock_client<T: Entity>(buffer_size: usize) -> (ResourceClient<T>, mpsc::Receiver<ResourceRequest<T>>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (ResourceClient::new(sender), receiver)
}

/// Helper to verify that the next message is a Create request
pub async fn expect_create<T: Entity>(
    receiver: &mut mpsc::Receiver<ResourceRequest<T>>,
) -> Option<(T::CreateParams, Reply<T::Id, T>)> {
    match receiver.recv().await {
        Some(ResourceRequest::Create { params, respond_to }) => Some((params, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is an Insert request
pub async fn expect_insert<T: Entity>(
    receiver: &mut mpsc::Receiver<ResourceRequest<T>>,
) -> Option<(T::Id, T::CreateParams, Reply<T::Id, T>)> {
    match receiver.recv().await {
        Some(ResourceRequest::Insert { id, params, respond_to }) => Some((id, params, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is a Get request
pub async fn expect_get<T: Entity>(
    receiver: &mut mpsc::Receiver<ResourceRequest<T>>,
) -> Option<(T::Id, Reply<Option<T>, T>)> {
    match receiver.recv().await {
        Some(ResourceRequest::Get { id, respond_to }) => Some((id, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is an Action request
pub async fn expect_action<T: Entity>(
    receiver: &mut mpsc::Receiver<ResourceRequest<T>>,
) -> Option<(T::Id, T::Action, Reply<T::ActionResult, T>)> {
    match receiver.recv().await {
        Some(ResourceRequest::Action { id, action, respond_to }) => Some((id, action, respond_to)),
        _ => None,
    }
}

/// Helper to verify that the next message is a Query request
pub async fn expect_query<T: Entity>(
    receiver: &mut mpsc::Receiver<ResourceRequest<T>>,
) -> Option<(Filter<T>, Reply<Vec<T>, T>)> {
    match receiver.recv().await {
        Some(ResourceRequest::Query { filter, respond_to }) => Some((filter, respond_to)),
        _ => None,
    }
}

/// What a relay does with one request.
pub enum Intercept<E> {
    Forward,
    /// Holds the request, and every request queued behind it, before forwarding.
    Delay(Duration),
    /// Answers with the error without touching the store.
    Fail(E),
}

/// Relays requests from a mock client's receiver to a real store, one at a
/// time and in arrival order. `intercept` sees each request first.
///
/// Replies to callers that already timed out are dropped, while the request
/// itself is still applied, the way a slow store behaves.
pub fn spawn_relay<T, F>(
    mut receiver: mpsc::Receiver<ResourceRequest<T>>,
    store: ResourceClient<T>,
    mut intercept: F,
) -> JoinHandle<()>
where
    T: Entity,
    F: FnMut(&ResourceRequest<T>) -> Intercept<T::Error> + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(request) = receiver.recv().await {
            match intercept(&request) {
                Intercept::Forward => {}
                Intercept::Delay(delay) => tokio::time::sleep(delay).await,
                Intercept::Fail(error) => {
                    fail(request, error);
                    continue;
                }
            }
            forward(&store, request).await;
        }
    })
}

async fn forward<T: Entity>(store: &ResourceClient<T>, request: ResourceRequest<T>) {
    match request {
        ResourceRequest::Create { params, respond_to } => {
            let _ = respond_to.send(store.create(params).await);
        }
        ResourceRequest::Insert { id, params, respond_to } => {
            let _ = respond_to.send(store.insert(id, params).await);
        }
        ResourceRequest::Get { id, respond_to } => {
            let _ = respond_to.send(store.get(id).await);
        }
        ResourceRequest::Update { id, patch, respond_to } => {
            let _ = respond_to.send(store.update(id, patch).await);
        }
        ResourceRequest::Action { id, action, respond_to } => {
            let _ = respond_to.send(store.perform_action(id, action).await);
        }
        ResourceRequest::Query { filter, respond_to } => {
            let _ = respond_to.send(store.query(filter).await);
        }
    }
}

fn fail<T: Entity>(request: ResourceRequest<T>, error: T::Error) {
    match request {
        ResourceRequest::Create { respond_to, .. } | ResourceRequest::Insert { respond_to, .. } => {
            let _ = respond_to.send(Err(error));
        }
        ResourceRequest::Get { respond_to, .. } => {
            let _ = respond_to.send(Err(error));
        }
        ResourceRequest::Update { respond_to, .. } => {
            let _ = respond_to.send(Err(error));
        }
        ResourceRequest::Action { respond_to, .. } => {
            let _ = respond_to.send(Err(error));
        }
        ResourceRequest::Query { respond_to, .. } => {
            let _ = respond_to.send(Err(error));
        }
    }
}

/// One recorded `initiate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCall {
    pub phone: String,
    pub amount: u64,
    pub order_reference: String,
}

/// Payment gateway that replays queued results.
///
/// Once the script runs out every call succeeds with fresh ids
/// (`ws_CO_<n>`). An optional delay holds each call before answering.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Result<GatewayCorrelation, GatewayError>>>,
    calls: Mutex<Vec<GatewayCall>>,
    delay: Option<Duration>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(self, result: Result<GatewayCorrelation, GatewayError>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn correlation(n: usize) -> GatewayCorrelation {
    GatewayCorrelation {
        merchant_request_id: format!("29115-34620561-{n}"),
        checkout_request_id: format!("ws_CO_{n}"),
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initiate(&self, phone: &str, amount: u64, order_reference: &str) -> Result<GatewayCorrelation, GatewayError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(GatewayCall {
                phone: phone.to_string(),
                amount,
                order_reference: order_reference.to_string(),
            });
            calls.len()
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(correlation(n)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Role, UserCreate, UserProfile};
    use crate::user_actor::{UserAction, UserError};

    #[tokio::test]
    async fn test_mock_client() {
        let (client, mut receiver) = create_mock_client::<UserProfile>(10);

        let create_task = tokio::spawn(async move {
            let user = UserCreate { display_name: "Test".to_string(), email: "test@example.com".to_string() };
            client.create(user).await
        });

        let (payload, responder) = expect_create(&mut receiver).await.expect("Expected Create request");
        assert_eq!(payload.display_name, "Test");
        responder.send(Ok("user_1".to_string())).unwrap();

        let result = create_task.await.unwrap();
        assert_eq!(result, Ok("user_1".to_string()));
    }

    #[tokio::test]
    async fn test_mock_action_failure() {
        let (client, mut receiver) = create_mock_client::<UserProfile>(10);

        let task = tokio::spawn(async move { client.perform_action("ghost".into(), UserAction::SetRole(Role::Admin)).await });

        let (id, action, responder) = expect_action(&mut receiver).await.expect("Expected Action request");
        assert_eq!(id, "ghost");
        assert!(matches!(action, UserAction::SetRole(Role::Admin)));
        responder.send(Err(UserError::NotFound("ghost".into()))).unwrap();

        assert_eq!(task.await.unwrap(), Err(UserError::NotFound("ghost".into())));
    }

    #[tokio::test]
    async fn test_relay_fails_and_forwards() {
        use crate::actor_framework::ResourceActor;

        let (actor, store) = ResourceActor::<UserProfile>::new(10, || "unused".to_string());
        tokio::spawn(actor.run());
        let (client, receiver) = create_mock_client::<UserProfile>(10);
        spawn_relay(receiver, store.clone(), |request| match request {
            ResourceRequest::Action { .. } => Intercept::Fail(UserError::NotFound("blocked".into())),
            _ => Intercept::Forward,
        });

        let user = UserCreate { display_name: "Test".to_string(), email: "test@example.com".to_string() };
        assert_eq!(client.insert("uid_1".into(), user).await, Ok("uid_1".to_string()));
        assert!(store.get("uid_1".into()).await.unwrap().is_some());

        let blocked = client.perform_action("uid_1".into(), UserAction::SetRole(Role::Admin)).await;
        assert_eq!(blocked, Err(UserError::NotFound("blocked".into())));
        assert_eq!(store.get("uid_1".into()).await.unwrap().unwrap().role, Role::Customer);
    }

    #[tokio::test]
    async fn test_scripted_gateway() {
        let gateway = ScriptedGateway::new().push(Err(GatewayError::Timeout));
        assert_eq!(gateway.initiate("254712345678", 400, "order_1").await, Err(GatewayError::Timeout));
        assert_eq!(gateway.initiate("254712345678", 400, "order_1").await, Ok(correlation(2)));
        assert_eq!(gateway.calls().len(), 2);
        assert_eq!(gateway.calls()[0].amount, 400);
    }
}
