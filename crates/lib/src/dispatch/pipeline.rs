//! Chains of notification stages.

use std::sync::Arc;

use crate::Result;
use crate::dispatch::{
    ConnectionToken, DispatchError, NotificationReceiver, PipelineStage,
};
use crate::notification::Notification;

/// An ordered chain of connected stages.
///
/// Construction connects each stage's output to the next stage's input.
/// Dropping the pipeline disconnects the stages in reverse order, so a
/// partially torn down chain never forwards into a stage that has already
/// been detached from its own downstream.
pub struct Pipeline {
    stages: Vec<Arc<dyn PipelineStage>>,
    connections: Vec<ConnectionToken>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages.len())
            .field("connections", &self.connections.len())
            .finish()
    }
}

impl Pipeline {
    /// Connects `stages` front to back.
    ///
    /// Fails with [`DispatchError::TooFewStages`] for fewer than two
    /// stages; a one-stage "pipeline" would silently connect nothing.
    pub fn new(stages: Vec<Arc<dyn PipelineStage>>) -> Result<Self> {
        if stages.len() < 2 {
            return Err(DispatchError::TooFewStages {
                count: stages.len(),
            }
            .into());
        }
        let mut connections = Vec::with_capacity(stages.len() - 1);
        for pair in stages.windows(2) {
            let receiver: Arc<dyn NotificationReceiver> = pair[1].clone();
            connections.push(pair[0].connect(receiver));
        }
        Ok(Self {
            stages,
            connections,
        })
    }

    /// The entry stage.
    pub fn head(&self) -> &Arc<dyn PipelineStage> {
        &self.stages[0]
    }

    /// The exit stage.
    pub fn tail(&self) -> &Arc<dyn PipelineStage> {
        &self.stages[self.stages.len() - 1]
    }

    /// Number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl NotificationReceiver for Pipeline {
    /// Feeds the head of the chain.
    fn receive(&self, notification: Notification) -> Result<()> {
        self.stages[0].receive(notification)
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Reverse order: the stage closest to the output detaches first.
        for (stage, token) in self
            .stages
            .iter()
            .zip(self.connections.drain(..))
            .rev()
        {
            let _ = stage.disconnect(token);
        }
    }
}
