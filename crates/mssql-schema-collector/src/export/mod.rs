//! Export side: document model, batching and delivery.

mod accumulator;
mod document;
mod transport;

pub use accumulator::{BatchAccumulator, ColumnLimits};
pub use document::{DatabaseMetadata, ExportDocument, ExportEnvelope};
pub use transport::{ChannelSubmitter, NdjsonSubmitter, Submitter};
