//! Account storage boundary.

use crate::account::{AccountId, AccountRecord};
use crate::error::{CoreError, CoreResult};
use crate::lifecycle::{AccountMutated, LifecycleListener, MutationKind};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Access to the host application's accounts.
///
/// Implementations are expected to raise lifecycle notifications for the
/// mutations they perform, the same way the host does for local edits.
pub trait AccountStore: Send + Sync {
    /// Gets an account by internal ID.
    fn get(&self, id: AccountId) -> CoreResult<Option<AccountRecord>>;

    /// Finds an account by login.
    fn find_by_login(&self, login: &str) -> CoreResult<Option<AccountRecord>>;

    /// Finds an account by email.
    fn find_by_email(&self, email: &str) -> CoreResult<Option<AccountRecord>>;

    /// Creates an account and returns its new ID. `account.id` is ignored.
    fn create(&self, account: AccountRecord) -> CoreResult<AccountId>;

    /// Replaces an existing account (matched by `account.id`).
    fn update(&self, account: &AccountRecord) -> CoreResult<()>;

    /// Deletes an account. Returns false if it did not exist.
    fn delete(&self, id: AccountId) -> CoreResult<bool>;

    /// Lists up to `limit` accounts in ascending ID order, skipping `offset`.
    fn list(&self, offset: usize, limit: usize) -> CoreResult<Vec<AccountRecord>>;

    /// Total number of accounts.
    fn count(&self) -> CoreResult<usize>;
}

impl<S: AccountStore + ?Sized> AccountStore for Arc<S> {
    fn get(&self, id: AccountId) -> CoreResult<Option<AccountRecord>> {
        (**self).get(id)
    }

    fn find_by_login(&self, login: &str) -> CoreResult<Option<AccountRecord>> {
        (**self).find_by_login(login)
    }

    fn find_by_email(&self, email: &str) -> CoreResult<Option<AccountRecord>> {
        (**self).find_by_email(email)
    }

    fn create(&self, account: AccountRecord) -> CoreResult<AccountId> {
        (**self).create(account)
    }

    fn update(&self, account: &AccountRecord) -> CoreResult<()> {
        (**self).update(account)
    }

    fn delete(&self, id: AccountId) -> CoreResult<bool> {
        (**self).delete(id)
    }

    fn list(&self, offset: usize, limit: usize) -> CoreResult<Vec<AccountRecord>> {
        (**self).list(offset, limit)
    }

    fn count(&self) -> CoreResult<usize> {
        (**self).count()
    }
}

/// An in-memory account store that raises lifecycle notifications.
pub struct MemoryAccountStore {
    accounts: RwLock<BTreeMap<AccountId, AccountRecord>>,
    next_id: AtomicU64,
    listeners: RwLock<Vec<Arc<dyn LifecycleListener>>>,
}

impl MemoryAccountStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Creates a store pre-filled with accounts, without raising notifications.
    pub fn with_accounts(accounts: impl IntoIterator<Item = AccountRecord>) -> CoreResult<Self> {
        let store = Self::new();
        for account in accounts {
            store.insert(account)?;
        }
        Ok(store)
    }

    /// Registers a lifecycle listener.
    pub fn subscribe(&self, listener: Arc<dyn LifecycleListener>) {
        self.listeners.write().push(listener);
    }

    /// Returns all accounts in ID order.
    pub fn all(&self) -> Vec<AccountRecord> {
        self.accounts.read().values().cloned().collect()
    }

    fn emit(&self, kind: MutationKind, account: &AccountRecord) {
        let listeners = self.listeners.read().clone();
        if listeners.is_empty() {
            return;
        }
        let event = AccountMutated::new(kind, account.clone());
        for listener in listeners {
            listener.notify(&event);
        }
    }

    fn check_unique(
        accounts: &BTreeMap<AccountId, AccountRecord>,
        candidate: &AccountRecord,
        except: Option<AccountId>,
    ) -> CoreResult<()> {
        for existing in accounts.values() {
            if Some(existing.id) == except {
                continue;
            }
            if existing.login == candidate.login {
                return Err(CoreError::DuplicateIdentity {
                    field: "login",
                    value: candidate.login.clone(),
                });
            }
            if existing.email.eq_ignore_ascii_case(&candidate.email) {
                return Err(CoreError::DuplicateIdentity {
                    field: "email",
                    value: candidate.email.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate(account: &AccountRecord) -> CoreResult<()> {
        if account.login.trim().is_empty() {
            return Err(CoreError::invalid_account("login is empty"));
        }
        if account.email.trim().is_empty() {
            return Err(CoreError::invalid_account("email is empty"));
        }
        Ok(())
    }

    fn insert(&self, mut account: AccountRecord) -> CoreResult<AccountRecord> {
        Self::validate(&account)?;
        let mut accounts = self.accounts.write();
        Self::check_unique(&accounts, &account, None)?;
        account.id = AccountId(self.next_id.fetch_add(1, Ordering::SeqCst));
        accounts.insert(account.id, account.clone());
        Ok(account)
    }
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountStore for MemoryAccountStore {
    fn get(&self, id: AccountId) -> CoreResult<Option<AccountRecord>> {
        Ok(self.accounts.read().get(&id).cloned())
    }

    fn find_by_login(&self, login: &str) -> CoreResult<Option<AccountRecord>> {
        Ok(self
            .accounts
            .read()
            .values()
            .find(|a| a.login == login)
            .cloned())
    }

    fn find_by_email(&self, email: &str) -> CoreResult<Option<AccountRecord>> {
        Ok(self
            .accounts
            .read()
            .values()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn create(&self, account: AccountRecord) -> CoreResult<AccountId> {
        let account = self.insert(account)?;
        self.emit(MutationKind::Created, &account);
        Ok(account.id)
    }

    fn update(&self, account: &AccountRecord) -> CoreResult<()> {
        Self::validate(account)?;
        let roles_changed = {
            let mut accounts = self.accounts.write();
            let previous_roles = match accounts.get(&account.id) {
                Some(existing) => existing.roles.clone(),
                None => return Err(CoreError::AccountNotFound { id: account.id.0 }),
            };
            Self::check_unique(&accounts, account, Some(account.id))?;
            accounts.insert(account.id, account.clone());
            previous_roles != account.roles
        };

        self.emit(MutationKind::Updated, account);
        if roles_changed {
            self.emit(MutationKind::RoleChanged, account);
        }
        Ok(())
    }

    fn delete(&self, id: AccountId) -> CoreResult<bool> {
        let Some(snapshot) = self.get(id)? else {
            return Ok(false);
        };
        self.emit(MutationKind::Deleted, &snapshot);
        Ok(self.accounts.write().remove(&id).is_some())
    }

    fn list(&self, offset: usize, limit: usize) -> CoreResult<Vec<AccountRecord>> {
        Ok(self
            .accounts
            .read()
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn count(&self) -> CoreResult<usize> {
        Ok(self.accounts.read().len())
    }
}
