pub mod models;
pub mod paging;
pub mod status;
pub mod codes;
pub mod ledger;
pub mod reports;
pub mod state_machine;
pub mod wallet;
pub mod notifications;
pub mod orchestrator;

pub use models::{DeliveryDraft, CreatedDelivery, StatusUpdate};
pub use codes::DeliveryCodeAllocator;
pub use ledger::LedgerPoster;
pub use state_machine::DeliveryStateMachine;
pub use wallet::WalletService;
pub use notifications::NotificationService;
pub use orchestrator::DeliveryOrchestrator;
