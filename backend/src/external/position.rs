//! Position sources for continuous boundary capture
//!
//! A source yields GPS samples until it ends or fails. Failure is reported
//! as [`PositionError`] so the capture flow can fall back to manual point
//! placement instead of losing the session.

use async_trait::async_trait;
use shared::PositionSample;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PositionError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("position source unavailable: {0}")]
    Unavailable(String),
}

/// Stream of position samples
#[async_trait]
pub trait PositionSource: Send {
    /// Next sample, `Ok(None)` once the source has ended
    async fn next_sample(&mut self) -> Result<Option<PositionSample>, PositionError>;
}

/// Producer half of a [`ChannelPositionSource`]
#[derive(Clone)]
pub struct PositionFeed {
    tx: mpsc::Sender<Result<PositionSample, PositionError>>,
}

impl PositionFeed {
    /// Push a sample; false once the consuming session is gone
    pub async fn send(&self, sample: PositionSample) -> bool {
        self.tx.send(Ok(sample)).await.is_ok()
    }

    /// Report that the device lost its fix or access was revoked
    pub async fn fail(&self, error: PositionError) -> bool {
        self.tx.send(Err(error)).await.is_ok()
    }
}

/// Position source fed over a channel, e.g. by a GNSS receiver task
pub struct ChannelPositionSource {
    rx: mpsc::Receiver<Result<PositionSample, PositionError>>,
}

impl ChannelPositionSource {
    pub fn channel(buffer: usize) -> (PositionFeed, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (PositionFeed { tx }, Self { rx })
    }
}

#[async_trait]
impl PositionSource for ChannelPositionSource {
    async fn next_sample(&mut self) -> Result<Option<PositionSample>, PositionError> {
        match self.rx.recv().await {
            Some(Ok(sample)) => Ok(Some(sample)),
            Some(Err(error)) => Err(error),
            None => Ok(None),
        }
    }
}
