//! Browser session adapter.
//!
//! The engine depends on this minimal interface only; DOM specifics live in
//! the CDP implementation. One session per application, never shared, never
//! pooled — each carries its own browser and is the unit of isolation.

pub mod cdp;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ChallengeInfo, ScanOutcome, SubmitOutcome};

pub use cdp::{CdpSession, CdpSessionFactory};

#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Scan visible fillable fields, or report a challenge sentinel when the
    /// page shows a bot check instead of a form.
    async fn scan_fields(&mut self) -> Result<ScanOutcome>;

    async fn detect_challenge(&mut self) -> Result<Option<ChallengeInfo>>;

    /// Fill one field by its scan handle. Returns false when the element
    /// vanished or refused the value.
    async fn fill_field(&mut self, handle: &str, value: &str) -> Result<bool>;

    async fn submit(&mut self) -> Result<SubmitOutcome>;

    /// Release the session. Must never fail; close problems are logged and
    /// swallowed because cleanup always has to complete.
    async fn close(&mut self);
}

/// Opens a fresh session per application.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>>;
}
