//! Appender SPI and the built-in appenders.

use async_trait::async_trait;

use crate::error::Result;

mod buffered;
mod collector;
mod flow;
mod jsonl;

pub use buffered::BufferedAppender;
pub use collector::{InstrumentInfo, MeterCollectorAppender, Series};
pub use flow::{BatchStage, FloodStage, FlowAppender, FlowSink, Stage};
pub use jsonl::{JsonlAppender, read_jsonl};

/// A sink for one event domain. Appenders run on the domain's dispatch
/// worker; a returned error is reported on the side channel and never
/// stops fan-out to the remaining appenders.
#[async_trait]
pub trait Appender<E>: Send + Sync {
    fn name(&self) -> &str;

    async fn append(&self, event: &E) -> Result<()>;
}
