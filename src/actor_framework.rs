use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::hash::Hash;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

/// Default bound on a single store round trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// 1. THE ABSTRACTION (Traits with Hooks, Params, and Actions)
// =============================================================================

/// Failure of the storage layer itself, independent of the entity stored.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store request timed out after {0:?}")]
    Timeout(Duration),
}

/// Trait that any document must implement to be managed by a [`ResourceActor`].
///
/// Every request against a collection is handled by a single actor task, one at a
/// time, so each hook and action runs atomically with respect to its collection.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Collection name used in logs.
    const COLLECTION: &'static str;

    type Id: Eq + Hash + Clone + Send + Sync + Display + Debug;
    type CreateParams: Send + Sync + Debug;
    type Patch: Send + Sync + Debug;
    type Action: Send + Sync + Debug;
    type ActionResult: Send + Sync + Debug;
    type Error: std::error::Error + Clone + Send + Sync + From<StorageError> + 'static;

    /// Construct the full document from the generated id and the creation params.
    fn from_create_params(id: Self::Id, params: Self::CreateParams) -> Result<Self, Self::Error>;

    fn not_found(id: &Self::Id) -> Self::Error;
    fn already_exists(id: &Self::Id) -> Self::Error;

    // --- Lifecycle Hooks ---

    fn on_create(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
    fn on_update(&mut self, patch: Self::Patch) -> Result<(), Self::Error>;

    /// Apply a domain-specific atomic mutation.
    fn handle_action(&mut self, action: Self::Action) -> Result<Self::ActionResult, Self::Error>;
}

// =============================================================================
// 2. THE GENERIC MESSAGES
// =============================================================================

pub type Response<T, E> = oneshot::Sender<Result<T, E>>;

/// Field filter evaluated inside the actor for `Query` requests.
pub struct Filter<T>(Box<dyn Fn(&T) -> bool + Send + Sync>);

impl<T> Filter<T> {
    pub fn new(predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self(Box::new(predicate))
    }

    pub fn all() -> Self {
        Self::new(|_| true)
    }

    pub fn matches(&self, item: &T) -> bool {
        (self.0)(item)
    }
}

impl<T> Debug for Filter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Filter(..)")
    }
}

#[derive(Debug)]
pub enum ResourceRequest<T: Entity> {
    Create {
        params: T::CreateParams,
        respond_to: Response<T::Id, T::Error>,
    },
    Insert {
        id: T::Id,
        params: T::CreateParams,
        respond_to: Response<T::Id, T::Error>,
    },
    Get {
        id: T::Id,
        respond_to: Response<Option<T>, T::Error>,
    },
    Update {
        id: T::Id,
        patch: T::Patch,
        respond_to: Response<T, T::Error>,
    },
    Action {
        id: T::Id,
        action: T::Action,
        respond_to: Response<T::ActionResult, T::Error>,
    },
    Query {
        filter: Filter<T>,
        respond_to: Response<Vec<T>, T::Error>,
    },
}

// =============================================================================
// 3. THE GENERIC ACTOR SERVER
// =============================================================================

pub struct ResourceActor<T: Entity> {
    receiver: mpsc::Receiver<ResourceRequest<T>>,
    store: HashMap<T::Id, T>,
    next_id_fn: Box<dyn Fn() -> T::Id + Send + Sync>,
}

impl<T: Entity> ResourceActor<T> {
    pub fn new(
        buffer_size: usize,
        next_id_fn: impl Fn() -> T::Id + Send + Sync + 'static,
    ) -> (Self, ResourceClient<T>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            receiver,
            store: HashMap::new(),
            next_id_fn: Box::new(next_id_fn),
        };
        (actor, ResourceClient::new(sender))
    }

    #[instrument(name = "resource_actor", skip(self), fields(collection = T::COLLECTION))]
    pub async fn run(mut self) {
        info!("Collection actor starting");
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                ResourceRequest::Create { params, respond_to } => {
                    let id = (self.next_id_fn)();
                    let _ = respond_to.send(self.insert(id, params));
                }
                ResourceRequest::Insert { id, params, respond_to } => {
                    let _ = respond_to.send(self.insert(id, params));
                }
                ResourceRequest::Get { id, respond_to } => {
                    let _ = respond_to.send(Ok(self.store.get(&id).cloned()));
                }
                ResourceRequest::Update { id, patch, respond_to } => {
                    let _ = respond_to.send(self.update(&id, patch));
                }
                ResourceRequest::Action { id, action, respond_to } => {
                    let result = match self.store.get_mut(&id) {
                        Some(item) => item.handle_action(action),
                        None => Err(T::not_found(&id)),
                    };
                    let _ = respond_to.send(result);
                }
                ResourceRequest::Query { filter, respond_to } => {
                    let items: Vec<T> = self
                        .store
                        .values()
                        .filter(|item| filter.matches(item))
                        .cloned()
                        .collect();
                    debug!(matched = items.len(), "Query evaluated");
                    let _ = respond_to.send(Ok(items));
                }
            }
        }
        info!("Collection actor stopped");
    }

    fn insert(&mut self, id: T::Id, params: T::CreateParams) -> Result<T::Id, T::Error> {
        if self.store.contains_key(&id) {
            return Err(T::already_exists(&id));
        }
        let mut item = T::from_create_params(id.clone(), params)?;
        item.on_create()?;
        self.store.insert(id.clone(), item);
        debug!(id = %id, "Document created");
        Ok(id)
    }

    fn update(&mut self, id: &T::Id, patch: T::Patch) -> Result<T, T::Error> {
        let item = self.store.get_mut(id).ok_or_else(|| T::not_found(id))?;
        // Hooks mutate a copy so a rejected patch leaves the stored document intact.
        let mut updated = item.clone();
        updated.on_update(patch)?;
        *item = updated.clone();
        Ok(updated)
    }
}

// =============================================================================
// 4. THE GENERIC CLIENT
// =============================================================================

pub struct ResourceClient<T: Entity> {
    sender: mpsc::Sender<ResourceRequest<T>>,
    timeout: Duration,
}

impl<T: Entity> Clone for ResourceClient<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            timeout: self.timeout,
        }
    }
}

impl<T: Entity> ResourceClient<T> {
    pub fn new(sender: mpsc::Sender<ResourceRequest<T>>) -> Self {
        Self {
            sender,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Bound every round trip (enqueue plus reply) by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn call<R>(
        &self,
        request: impl FnOnce(Response<R, T::Error>) -> ResourceRequest<T>,
    ) -> Result<R, T::Error> {
        let (respond_to, response) = oneshot::channel();
        let round_trip = async {
            self.sender
                .send(request(respond_to))
                .await
                .map_err(|_| StorageError::Unavailable("Actor closed".to_string()))?;
            response
                .await
                .map_err(|_| StorageError::Unavailable("Actor dropped".to_string()))
        };
        match tokio::time::timeout(self.timeout, round_trip).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!(collection = T::COLLECTION, timeout = ?self.timeout, "Store request timed out");
                Err(StorageError::Timeout(self.timeout).into())
            }
        }
    }

    pub async fn create(&self, params: T::CreateParams) -> Result<T::Id, T::Error> {
        self.call(|respond_to| ResourceRequest::Create { params, respond_to }).await
    }

    pub async fn insert(&self, id: T::Id, params: T::CreateParams) -> Result<T::Id, T::Error> {
        self.call(|respond_to| ResourceRequest::Insert { id, params, respond_to }).await
    }

    pub async fn get(&self, id: T::Id) -> Result<Option<T>, T::Error> {
        self.call(|respond_to| ResourceRequest::Get { id, respond_to }).await
    }

    pub async fn update(&self, id: T::Id, patch: T::Patch) -> Result<T, T::Error> {
        self.call(|respond_to| ResourceRequest::Update { id, patch, respond_to }).await
    }

    pub async fn perform_action(&self, id: T::Id, action: T::Action) -> Result<T::ActionResult, T::Error> {
        self.call(|respond_to| ResourceRequest::Action { id, action, respond_to }).await
    }

    pub async fn query(&self, filter: Filter<T>) -> Result<Vec<T>, T::Error> {
        self.call(|respond_to| ResourceRequest::Query { filter, respond_to }).await
    }
}

// =============================================================================
// 5. EXAMPLE USAGE (Test)
// =============================================================================
