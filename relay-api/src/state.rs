use std::sync::Arc;
use relay_order::{DeliveryOrchestrator, NotificationService, WalletService};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<DeliveryOrchestrator>,
    pub wallet: Arc<WalletService>,
    pub notifications: Arc<NotificationService>,
    pub auth: AuthConfig,
}
