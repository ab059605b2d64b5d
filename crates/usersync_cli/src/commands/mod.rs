//! CLI command implementations.

pub mod connections;
pub mod keygen;
pub mod reconcile;
pub mod serve;
pub mod sites;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use usersync_core::{AccountRecord, MemoryAccountStore, ReentrancyGuard, SettingsHandle, SyncSettings};
use usersync_engine::{ChangeDispatcher, ReconciliationEngine, ReqwestClient};

/// Paths shared by every command.
pub struct Context {
    settings_path: PathBuf,
    accounts_path: Option<PathBuf>,
}

impl Context {
    /// Creates a context.
    pub fn new(settings_path: PathBuf, accounts_path: Option<PathBuf>) -> Self {
        Self {
            settings_path,
            accounts_path,
        }
    }

    /// Loads the settings file, falling back to defaults when it is absent.
    pub fn load_settings(&self) -> Result<SyncSettings, Box<dyn std::error::Error>> {
        if !self.settings_path.exists() {
            tracing::warn!(path = %self.settings_path.display(), "settings file not found, using defaults");
            return Ok(SyncSettings::default());
        }
        Ok(SyncSettings::load(&self.settings_path)?)
    }

    /// Writes the settings file.
    pub fn save_settings(&self, settings: &SyncSettings) -> Result<(), Box<dyn std::error::Error>> {
        settings.save(&self.settings_path)?;
        tracing::debug!(path = %self.settings_path.display(), "settings saved");
        Ok(())
    }

    /// Builds the local account store from the accounts file, if any.
    pub fn load_store(&self) -> Result<Arc<MemoryAccountStore>, Box<dyn std::error::Error>> {
        let Some(path) = &self.accounts_path else {
            return Ok(Arc::new(MemoryAccountStore::new()));
        };
        let accounts = read_accounts(path)?;
        tracing::info!(count = accounts.len(), path = %path.display(), "loaded accounts");
        Ok(Arc::new(MemoryAccountStore::with_accounts(accounts)?))
    }

    /// Builds a dispatcher over real HTTP.
    pub fn dispatcher(
        &self,
    ) -> Result<Arc<ChangeDispatcher<ReqwestClient>>, Box<dyn std::error::Error>> {
        let settings = SettingsHandle::new(self.load_settings()?);
        let client = ReqwestClient::new()?;
        Ok(Arc::new(ChangeDispatcher::new(
            settings,
            client,
            Arc::new(ReentrancyGuard::default()),
        )))
    }

    /// Builds a reconciliation engine over the local store.
    pub fn engine(
        &self,
    ) -> Result<ReconciliationEngine<ReqwestClient, Arc<MemoryAccountStore>>, Box<dyn std::error::Error>>
    {
        Ok(ReconciliationEngine::new(self.dispatcher()?, self.load_store()?))
    }
}

fn read_accounts(path: &Path) -> Result<Vec<AccountRecord>, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read accounts file {:?}: {}", path, e))?;
    Ok(serde_json::from_str(&text)?)
}
