use async_trait::async_trait;
use bytes::Bytes;

use super::{RenderError, RenderPage, RenderWorker, WorkerLauncher};

/// A valid 1x1 transparent PNG.
pub const STUB_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Stub launcher that needs no browser.
///
/// Optimized for maximum throughput - every render returns the same static PNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubLauncher;

/// Worker created by [`StubLauncher`].
#[derive(Debug)]
pub struct StubWorker {
    id: u64,
    closed: bool,
}

#[async_trait]
impl WorkerLauncher for StubLauncher {
    type Worker = StubWorker;

    #[inline]
    async fn launch(&self, id: u64) -> Result<StubWorker, RenderError> {
        Ok(StubWorker { id, closed: false })
    }

    #[inline]
    fn name(&self) -> &'static str {
        "stub"
    }
}

#[async_trait]
impl RenderWorker for StubWorker {
    #[inline]
    fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    async fn is_live(&self) -> bool {
        !self.closed
    }

    #[inline]
    async fn render(&mut self, _page: &RenderPage) -> Result<Bytes, RenderError> {
        if self.closed {
            return Err(RenderError::Closed);
        }
        Ok(Bytes::from_static(STUB_PNG))
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}
