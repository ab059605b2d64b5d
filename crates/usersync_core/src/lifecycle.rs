//! Lifecycle notifications raised by the host.

use crate::account::{AccountId, AccountRecord};

/// The kind of local account mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Account was created.
    Created,
    /// Account profile was updated.
    Updated,
    /// Account is about to be deleted.
    Deleted,
    /// Account role set changed.
    RoleChanged,
}

impl MutationKind {
    /// All mutation kinds, in a fixed order.
    pub const ALL: [MutationKind; 4] = [
        MutationKind::Created,
        MutationKind::Updated,
        MutationKind::Deleted,
        MutationKind::RoleChanged,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            MutationKind::Created => 0,
            MutationKind::Updated => 1,
            MutationKind::Deleted => 2,
            MutationKind::RoleChanged => 3,
        }
    }
}

/// A notification that a local account changed.
///
/// Carries a snapshot of the account as of the mutation. For
/// [`MutationKind::Deleted`] the host raises the notification before the
/// record is removed.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountMutated {
    /// What happened.
    pub kind: MutationKind,
    /// The account snapshot.
    pub account: AccountRecord,
}

impl AccountMutated {
    /// Creates a notification.
    pub fn new(kind: MutationKind, account: AccountRecord) -> Self {
        Self { kind, account }
    }

    /// The affected account's ID.
    pub fn id(&self) -> AccountId {
        self.account.id
    }
}

/// Receives lifecycle notifications from the host.
pub trait LifecycleListener: Send + Sync {
    /// Called after (or, for deletions, just before) a local mutation.
    fn notify(&self, event: &AccountMutated);
}
