//! Ingress: transactions, watching, grouping and dispatch
//!
//! Files land in `<sftp_root>/<qe>/ingress`. The `run` command first moves
//! them into an ingress transaction, then either drains the transaction once
//! or watches it for arrivals. Screening group members are held back by the
//! grouping engine until their group is complete; everything else is
//! dispatched as a standalone workflow.

pub mod dispatch;
pub mod entry;
pub mod group;
pub mod transaction;
pub mod watcher;

pub use dispatch::WorkflowDispatcher;
pub use entry::{IngressEntry, IngressSource};
pub use group::{group_key, GroupCompleteFn, ScreeningIngressGroup, ScreeningIngressGroups, DEFAULT_GROUP_SIZE};
pub use transaction::{
    prepare_ingress_tx, sha256_file, tx_id_now, IngressObservability, IngressTransaction, IngressTxEntry,
    INGRESS_DIR, INGRESS_TX_DIR, OBSERVABILITY_FILE,
};
pub use watcher::IngressWatcher;
