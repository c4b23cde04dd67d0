//! State stream: observe the pipeline as a `Stream` of states.
//!
//! The first item is the state at subscription time; afterwards one item is
//! yielded per published change. A slow consumer skips intermediate states
//! and always catches up to the latest one, which is all a renderer needs.

use crate::orchestrator::Pipeline;
use crate::state::PipelineState;
use std::pin::Pin;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;

/// A boxed stream of pipeline states.
pub type PipelineStateStream = Pin<Box<dyn Stream<Item = PipelineState> + Send>>;

impl Pipeline {
    /// Stream of states, starting with the current one.
    ///
    /// The stream ends when every clone of the pipeline has been dropped.
    pub fn state_stream(&self) -> PipelineStateStream {
        Box::pin(WatchStream::new(self.subscribe()))
    }
}
