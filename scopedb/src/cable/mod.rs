//! Batching ingestion cables.
//!
//! A cable accumulates records handed over by any number of senders and ingests them in
//! batches, flushing once the estimated batch size exceeds its threshold or when its flush
//! interval elapses. Rate limited batches are retried until they succeed, every other
//! failure is reported to each record of the batch.

mod arrow;
mod base;
mod raw;
mod worker;

pub use self::arrow::ArrowStrategy;
pub use base::{BatchStrategy, Cable, CableHandle, CableSender, SendCompletion};
pub use raw::{RawDataStrategy, RawRecord};

/// Cable ingesting Arrow record batches.
pub type ArrowBatchCable = Cable<ArrowStrategy>;

/// Cable ingesting JSON values.
pub type RawDataBatchCable = Cable<RawDataStrategy>;

pub type ArrowBatchCableHandle = CableHandle<ArrowStrategy>;

pub type RawDataBatchCableHandle = CableHandle<RawDataStrategy>;
