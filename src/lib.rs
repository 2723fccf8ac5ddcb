pub mod config;
pub mod error;
pub mod ledger;
pub mod server;
pub mod storage;

pub use config::AppConfig;
pub use error::LedgerError;
pub use ledger::AuditLedger;
