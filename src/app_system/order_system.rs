use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::actor_framework::{ResourceActor, DEFAULT_STORE_TIMEOUT};
use crate::api::AppState;
use crate::clients::{OrderClient, ProductClient, UserClient};
use crate::config::AppConfig;
use crate::domain::{Order, Product, UserProfile};
use crate::gateway::PaymentGateway;
use crate::orchestrator::{spawn_sweeper, OrderOrchestrator, DEFAULT_GATEWAY_TIMEOUT};
use crate::roles::AccessControl;

const CHANNEL_BUFFER: usize = 256;

/// Timeouts and periods the system is started with.
#[derive(Debug, Clone)]
pub struct SystemSettings {
    pub store_timeout: Duration,
    pub gateway_timeout: Duration,
    pub pending_payment_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            store_timeout: DEFAULT_STORE_TIMEOUT,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
            pending_payment_ttl: Duration::from_secs(900),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl From<&AppConfig> for SystemSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            store_timeout: config.store_timeout,
            gateway_timeout: config.gateway_timeout,
            pending_payment_ttl: config.pending_payment_ttl,
            sweep_interval: config.sweep_interval,
        }
    }
}

/// The main application system that owns every actor and background task.
///
/// Responsible for starting up actors, wiring them together, and handling shutdown.
pub struct OrderSystem {
    pub product_client: ProductClient,
    pub order_client: OrderClient,
    pub user_client: UserClient,
    pub orchestrator: OrderOrchestrator,
    pub access: AccessControl,
    shutdown: CancellationToken,
    sweeper: JoinHandle<()>,
    handles: Vec<JoinHandle<()>>,
}

impl OrderSystem {
    pub fn new(settings: SystemSettings, gateway: Arc<dyn PaymentGateway>) -> Self {
        // 1. Inventory ledger
        let product_id_counter = Arc::new(AtomicU64::new(1));
        let next_product_id = move || {
            let id = product_id_counter.fetch_add(1, Ordering::SeqCst);
            format!("product_{id}")
        };
        let (product_actor, product_resource_client) = ResourceActor::<Product>::new(CHANNEL_BUFFER, next_product_id);
        let product_client = ProductClient::new(product_resource_client.with_timeout(settings.store_timeout));
        let product_handle = tokio::spawn(product_actor.run());

        // 2. Order store
        let (order_actor, order_resource_client) =
            ResourceActor::<Order>::new(CHANNEL_BUFFER, || uuid::Uuid::new_v4().to_string());
        let order_client = OrderClient::new(order_resource_client.with_timeout(settings.store_timeout));
        let order_handle = tokio::spawn(order_actor.run());

        // 3. User profiles (ids come from the auth provider)
        let (user_actor, user_resource_client) =
            ResourceActor::<UserProfile>::new(CHANNEL_BUFFER, || uuid::Uuid::new_v4().to_string());
        let user_client = UserClient::new(user_resource_client.with_timeout(settings.store_timeout));
        let user_handle = tokio::spawn(user_actor.run());

        // 4. Orchestration and access control
        let orchestrator = OrderOrchestrator::new(product_client.clone(), order_client.clone(), gateway)
            .with_gateway_timeout(settings.gateway_timeout);
        let access = AccessControl::with_default_providers(user_client.clone());

        // 5. Stale order sweeper
        let shutdown = CancellationToken::new();
        let sweeper = spawn_sweeper(
            orchestrator.clone(),
            settings.sweep_interval,
            settings.pending_payment_ttl,
            shutdown.clone(),
        );

        Self {
            product_client,
            order_client,
            user_client,
            orchestrator,
            access,
            shutdown,
            sweeper,
            handles: vec![product_handle, order_handle, user_handle],
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            orchestrator: self.orchestrator.clone(),
            products: self.product_client.clone(),
            orders: self.order_client.clone(),
            users: self.user_client.clone(),
            access: self.access.clone(),
        }
    }

    /// Stops the sweeper, then waits for every collection actor to drain.
    ///
    /// Actors stop once all clients are dropped, so any `AppState` handed out
    /// must be dropped before calling this.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        info!("Shutting down system...");
        self.shutdown.cancel();
        if let Err(e) = self.sweeper.await {
            error!(error = %e, "Sweeper task failed");
        }

        drop(self.orchestrator);
        drop(self.access);
        drop(self.product_client);
        drop(self.order_client);
        drop(self.user_client);

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Actor task failed");
                anyhow::bail!("Actor task failed: {e}");
            }
        }

        info!("System shutdown complete.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_framework::ScriptedGateway;

    #[tokio::test]
    async fn test_startup_and_shutdown() {
        let system = OrderSystem::new(SystemSettings::default(), Arc::new(ScriptedGateway::new()));
        let id = system
            .product_client
            .create_product(crate::domain::ProductCreate::new("Speaker", rust_decimal::Decimal::new(4999, 2), 4))
            .await
            .unwrap();
        assert_eq!(id, "product_1");

        let shutdown = tokio::time::timeout(Duration::from_secs(5), system.shutdown()).await;
        assert!(matches!(shutdown, Ok(Ok(()))));
    }
}
