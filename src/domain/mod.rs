pub mod account;
pub mod amount;
pub mod asset;
pub mod transaction;

pub use account::{deposit_account_id, UserDirectoryEntry, WatchedAccount};
pub use asset::AssetRecord;
pub use transaction::{IncomingTransaction, OutgoingTransaction, TransactionStatus};
