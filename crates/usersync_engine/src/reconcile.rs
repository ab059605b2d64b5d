//! Batch reconciliation.
//!
//! The engine keeps no state between calls. The caller owns the
//! [`BatchCursor`] and decides whether to request the next page, so an
//! interrupted run resumes by replaying the last offset.

use crate::dispatcher::ChangeDispatcher;
use crate::error::{SyncError, SyncResult};
use crate::http::HttpClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use usersync_core::{AccountId, AccountRecord, AccountStore};

/// Default page size.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Position in the account set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCursor {
    /// Accounts to skip.
    pub offset: usize,
    /// Accounts to fetch.
    pub batch_size: usize,
}

impl BatchCursor {
    /// Creates a cursor.
    pub fn new(offset: usize, batch_size: usize) -> Self {
        Self { offset, batch_size }
    }

    /// The first page.
    pub fn start(batch_size: usize) -> Self {
        Self::new(0, batch_size)
    }

    /// The cursor for the page after one that returned `fetched` accounts.
    pub fn advance(self, fetched: usize) -> Self {
        Self::new(self.offset + fetched, self.batch_size)
    }
}

impl Default for BatchCursor {
    fn default() -> Self {
        Self::start(DEFAULT_BATCH_SIZE)
    }
}

/// Result of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// True when the page was short (end of the account set).
    pub completed: bool,
    /// Accounts accepted by at least one destination.
    pub synced_count: usize,
    /// `offset` plus the accounts fetched in this page.
    pub total_processed: usize,
    /// Accounts fetched in this page.
    pub batch_size_actual: usize,
    /// Per-account errors, including partial delivery failures.
    pub errors: Vec<String>,
    /// Human-readable summary.
    pub message: String,
}

/// Result of a full run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAllReport {
    /// Accounts accepted by at least one destination.
    pub success: usize,
    /// Accounts no destination accepted.
    pub failed: usize,
    /// Accounts processed.
    pub total: usize,
}

/// Reconciliation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Accounts in the local store.
    pub total_accounts: usize,
    /// Destinations with both a URL and a key.
    pub active_destinations: usize,
    /// Whether lifecycle dispatch is switched on.
    pub enabled: bool,
}

/// Replays the local account set to every destination, page by page.
pub struct ReconciliationEngine<C: HttpClient, S: AccountStore> {
    dispatcher: Arc<ChangeDispatcher<C>>,
    store: S,
}

impl<C: HttpClient, S: AccountStore> ReconciliationEngine<C, S> {
    /// Creates an engine.
    pub fn new(dispatcher: Arc<ChangeDispatcher<C>>, store: S) -> Self {
        Self { dispatcher, store }
    }

    /// The dispatcher.
    pub fn dispatcher(&self) -> &Arc<ChangeDispatcher<C>> {
        &self.dispatcher
    }

    /// Processes one page.
    ///
    /// Every account in the page is attempted. An account counts as synced if
    /// any destination accepted it; each failed delivery is appended to the
    /// error list either way.
    pub fn run_batch(&self, cursor: BatchCursor) -> SyncResult<BatchReport> {
        if cursor.batch_size == 0 {
            return Err(SyncError::InvalidBatchSize(0));
        }

        let accounts = self.store.list(cursor.offset, cursor.batch_size)?;
        if accounts.is_empty() {
            return Ok(BatchReport {
                completed: true,
                synced_count: 0,
                total_processed: cursor.offset,
                batch_size_actual: 0,
                errors: Vec::new(),
                message: "All users synced".to_string(),
            });
        }

        let mut synced = 0;
        let mut errors = Vec::new();
        {
            let _scope = self.dispatcher.guard().suppress_all();
            for account in &accounts {
                if self.push(account, &mut errors) {
                    synced += 1;
                }
            }
        }

        let fetched = accounts.len();
        tracing::info!(
            offset = cursor.offset,
            fetched,
            synced,
            errors = errors.len(),
            "reconciliation batch finished"
        );

        Ok(BatchReport {
            completed: fetched < cursor.batch_size,
            synced_count: synced,
            total_processed: cursor.offset + fetched,
            batch_size_actual: fetched,
            errors,
            message: format!(
                "Synced {} users (total: {})",
                synced,
                cursor.offset + synced
            ),
        })
    }

    /// Pushes a single account to every destination.
    pub fn sync_account(&self, id: AccountId) -> SyncResult<crate::DispatchReport> {
        let account = self
            .store
            .get(id)?
            .ok_or(SyncError::AccountNotFound(id))?;
        let _scope = self.dispatcher.guard().suppress_all();
        let settings = self.dispatcher.settings().snapshot();
        let event = self.dispatcher.reconcile_event(&account, &settings);
        Ok(self.dispatcher.dispatch(&event))
    }

    /// Walks every page from the start.
    pub fn sync_all(&self, batch_size: usize) -> SyncResult<SyncAllReport> {
        let mut cursor = BatchCursor::start(batch_size);
        let mut report = SyncAllReport::default();
        loop {
            let page = self.run_batch(cursor)?;
            report.success += page.synced_count;
            report.failed += page.batch_size_actual - page.synced_count;
            report.total += page.batch_size_actual;
            if page.completed {
                return Ok(report);
            }
            cursor = cursor.advance(page.batch_size_actual);
        }
    }

    /// Account and destination counts.
    pub fn status(&self) -> SyncResult<SyncStatus> {
        let settings = self.dispatcher.settings().snapshot();
        Ok(SyncStatus {
            total_accounts: self.store.count()?,
            active_destinations: settings.active_destinations().count(),
            enabled: settings.enabled,
        })
    }

    /// Returns true if any destination accepted the account.
    fn push(&self, account: &AccountRecord, errors: &mut Vec<String>) -> bool {
        let settings = self.dispatcher.settings().snapshot();
        let event = self.dispatcher.reconcile_event(account, &settings);
        let report = self.dispatcher.dispatch(&event);

        if report.is_empty() {
            errors.push(account_error(account, "no remote sites configured"));
            return false;
        }
        for failure in report.failures() {
            errors.push(account_error(account, &failure.describe()));
        }
        report.accepted()
    }
}

fn account_error(account: &AccountRecord, reason: &str) -> String {
    format!("User {} ({}): {}", account.login, account.id, reason)
}
