//! Explicit per-batch context
//!
//! Organization, project and acting user travel with every resolver and task
//! call together with the batch cancellation token.

use crate::error::Cancelled;
use crate::types::Background;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Context of one `apply` call
#[derive(Debug, Clone)]
pub struct ApplyContext {
    /// Organization id
    pub org_id: u64,
    /// Project id
    pub project_id: u64,
    /// Acting user
    pub user_id: String,
    cancel: CancellationToken,
}

impl ApplyContext {
    /// Create context
    #[must_use]
    pub fn new(org_id: u64, project_id: u64, user_id: impl Into<String>) -> Self {
        Self {
            org_id,
            project_id,
            user_id: user_id.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Create context from the envelope background
    #[must_use]
    pub fn from_background(background: &Background, cancel: CancellationToken) -> Self {
        Self {
            org_id: background.org_id,
            project_id: background.project_id,
            user_id: background.user_id.clone(),
            cancel,
        }
    }

    /// With cancellation token
    #[inline]
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Context sharing identity with a child token
    ///
    /// Cancelling the child leaves `self` live; cancelling `self` cancels the child.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            ..self.clone()
        }
    }

    /// Check if cancellation has been requested
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel the batch
    #[inline]
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run an external call unless the batch is cancelled
    ///
    /// An already cancelled token wins without polling `call`, so no request
    /// is issued after cancellation was observed.
    ///
    /// # Errors
    /// `Cancelled` if the token fires first
    pub async fn guard<F: Future>(&self, call: F) -> Result<F::Output, Cancelled> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Cancelled),
            out = call => Ok(out),
        }
    }
}
