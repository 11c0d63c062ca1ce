pub mod db;
pub mod ledger;

pub use db::{create_db, run_migrations, DbPool};
pub use ledger::SqliteLedger;
