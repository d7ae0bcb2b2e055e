pub mod connection;
pub mod directory;
pub mod engine;
pub mod migrations;
pub mod outbox;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use directory::SqlSupplierDirectory;
pub use engine::TenderEngine;
pub use outbox::{
    relay_pending, OutboxBridge, OutboxMessage, OutboxStatus, RelayReport, SqlOutboxRepository,
};
pub use repositories::{RepositoryError, SqlTenderStore};
