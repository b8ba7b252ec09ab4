pub mod config;
pub mod error;
pub mod generator;
pub mod loader;
pub mod order;
pub mod summary;

pub use config::SequenceConfig;
pub use error::{LoadError, SequenceError};
pub use generator::SequenceGenerator;
pub use loader::{load_blocks, load_trigger_table, parse_blocks, parse_trigger_table};
pub use order::{BLOCK_ORDERS, block_order};
pub use summary::{BlockSummary, SequenceSummary};
