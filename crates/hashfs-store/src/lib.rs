//! hashfs-store: the vault's backing key-value store
//!
//! One directory per vault namespace, four collections inside:
//! ```text
//! <base>/<namespace>/
//!   files/      encrypted content blobs, one file per blob key
//!   meta/       the encrypted metadata index
//!   chains/     encrypted version chains
//!   integrity/  small bookkeeping values
//!   .txn/       staged transaction journals (transient)
//! ```
//!
//! Single-key writes are atomic (temp → rename). Multi-key writes go
//! through [`Transaction`], which stages payloads plus a manifest under
//! `.txn/` and commits by renaming the manifest into place; committed
//! stages are replayed on open, uncommitted ones discarded.

pub mod health;
pub mod store;
pub mod txn;

pub use health::{is_healthy, probe};
pub use store::{BlobStore, Collection};
pub use txn::Transaction;
