//! Transfer sink.
//!
//! Moves a link's retrieved artifacts to remote storage. The sink is told
//! only the local directory; the destination comes from configuration.
//!
//! The production implementation is [`RcloneSink`], which delegates to the
//! `rclone` sync client. Tests use [`crate::testing::MockSink`].

mod error;
mod rclone;
mod traits;
mod types;

pub use error::SinkError;
pub use rclone::{parse_remotes, RcloneSink};
pub use traits::TransferSink;
pub use types::{DestinationCheck, TransferReceipt};
