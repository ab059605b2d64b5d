//! The change receiver.

use crate::auth::CredentialGuard;
use crate::error::ServerResult;
use crate::request::InboundRequest;
use serde_json::Value;
use std::sync::Arc;
use usersync_core::{AccountRecord, AccountStore, PayloadCipher, ReentrancyGuard, SettingsHandle};
use usersync_protocol::{Action, ChangeEvent, Envelope, ReceiveResponse};

/// Applies inbound change events to the local account store.
pub struct Receiver<S: AccountStore> {
    store: S,
    settings: SettingsHandle,
    guard: Arc<ReentrancyGuard>,
    credentials: Arc<CredentialGuard>,
}

impl<S: AccountStore> Receiver<S> {
    /// Creates a receiver.
    pub fn new(
        store: S,
        settings: SettingsHandle,
        guard: Arc<ReentrancyGuard>,
        credentials: Arc<CredentialGuard>,
    ) -> Self {
        Self {
            store,
            settings,
            guard,
            credentials,
        }
    }

    /// The account store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Authenticates and applies a request.
    pub fn receive(&self, request: &InboundRequest) -> ServerResult<ReceiveResponse> {
        self.credentials.authorize(request)?;
        self.apply_body(&request.body)
    }

    /// Applies a raw body. Lifecycle dispatch stays suppressed on every path
    /// out of this function.
    pub fn apply_body(&self, body: &[u8]) -> ServerResult<ReceiveResponse> {
        let _scope = self.guard.suppress_all();
        let settings = self.settings.snapshot();

        let value: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
        let cipher = settings.encryption_key().map(PayloadCipher::new);
        let value = Envelope::open(value, cipher.as_ref())?;
        let event = ChangeEvent::from_value(&value)?;

        let existing = match self.store.find_by_login(&event.user_login)? {
            Some(account) => Some(account),
            None => self.store.find_by_email(&event.user_email)?,
        };

        let response = match event.action {
            Action::Create | Action::Update => {
                self.upsert(existing, &event, settings.sync_meta, settings.sync_roles)?
            }
            Action::Delete => match existing {
                Some(account) => ReceiveResponse::deleted(self.store.delete(account.id)?),
                None => ReceiveResponse::not_found(),
            },
        };

        tracing::info!(
            login = %event.user_login,
            action = event.action.as_str(),
            success = response.success,
            "inbound change applied"
        );
        Ok(response)
    }

    fn upsert(
        &self,
        existing: Option<AccountRecord>,
        event: &ChangeEvent,
        sync_meta: bool,
        sync_roles: bool,
    ) -> ServerResult<ReceiveResponse> {
        let created = existing.is_none();
        let mut account = existing
            .unwrap_or_else(|| AccountRecord::new(&event.user_login, &event.user_email));
        account.email = event.user_email.clone();

        let fields = [
            (&mut account.first_name, &event.first_name),
            (&mut account.last_name, &event.last_name),
            (&mut account.display_name, &event.display_name),
            (&mut account.url, &event.user_url),
            (&mut account.description, &event.description),
        ];
        for (target, supplied) in fields {
            if let Some(value) = supplied.as_deref().filter(|v| !v.is_empty()) {
                *target = value.to_string();
            }
        }

        if sync_meta {
            if let Some(meta) = &event.user_meta {
                for (key, value) in meta {
                    account.metadata.insert(key.clone(), value.clone());
                }
            }
        }

        if sync_roles {
            if let Some(roles) = event.roles.as_ref().filter(|r| !r.is_empty()) {
                account.set_roles(roles.iter().cloned());
            }
        }

        if created {
            let id = self.store.create(account)?;
            Ok(ReceiveResponse::created(id.get()))
        } else {
            self.store.update(&account)?;
            Ok(ReceiveResponse::updated(account.id.get()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::http::Method;
    use parking_lot::Mutex;
    use serde_json::json;
    use usersync_core::{
        AccountId, AccountMutated, LifecycleListener, MemoryAccountStore, MutationKind,
        SyncSettings, SystemClock,
    };
    use usersync_protocol::ApplyAction;

    /// Records whether each notification arrived while suppressed.
    struct Probe {
        guard: Arc<ReentrancyGuard>,
        seen: Mutex<Vec<(MutationKind, bool)>>,
    }

    impl LifecycleListener for Probe {
        fn notify(&self, event: &AccountMutated) {
            self.seen
                .lock()
                .push((event.kind, self.guard.is_suppressed(event.kind)));
        }
    }

    struct Fixture {
        receiver: Receiver<Arc<MemoryAccountStore>>,
        store: Arc<MemoryAccountStore>,
        settings: SettingsHandle,
        guard: Arc<ReentrancyGuard>,
        probe: Arc<Probe>,
    }

    fn fixture() -> Fixture {
        let mut settings = SyncSettings::default();
        settings.api_key = "k".into();
        settings.rate_limit = 0;
        let settings = SettingsHandle::new(settings);
        let guard = Arc::new(ReentrancyGuard::default());
        let store = Arc::new(
            MemoryAccountStore::with_accounts([
                AccountRecord::new("alice", "alice@example.com").with_role("subscriber"),
                AccountRecord::new("bob", "bob@example.com"),
            ])
            .unwrap(),
        );
        let probe = Arc::new(Probe {
            guard: guard.clone(),
            seen: Mutex::new(Vec::new()),
        });
        store.subscribe(probe.clone());
        let credentials = Arc::new(CredentialGuard::new(
            settings.clone(),
            &ServerConfig::default(),
            Arc::new(SystemClock),
        ));
        Fixture {
            receiver: Receiver::new(store.clone(), settings.clone(), guard.clone(), credentials),
            store,
            settings,
            guard,
            probe,
        }
    }

    fn apply(f: &Fixture, body: Value) -> ServerResult<ReceiveResponse> {
        f.receiver.apply_body(body.to_string().as_bytes())
    }

    #[test]
    fn update_by_login() {
        let f = fixture();
        let response = apply(
            &f,
            json!({"user_login": "alice", "user_email": "alice@example.com", "first_name": "Alice"}),
        )
        .unwrap();
        assert_eq!(response.action, Some(ApplyAction::Updated));
        assert_eq!(response.user_id, Some(1));
        assert_eq!(f.store.get(AccountId(1)).unwrap().unwrap().first_name, "Alice");
    }

    #[test]
    fn falls_back_to_email() {
        let f = fixture();
        let response = apply(
            &f,
            json!({"action": "update", "user_login": "robert", "user_email": "bob@example.com"}),
        )
        .unwrap();
        assert_eq!(response.action, Some(ApplyAction::Updated));
        assert_eq!(response.user_id, Some(2));
        assert_eq!(f.store.count().unwrap(), 2);
    }

    #[test]
    fn creates_when_nothing_matches() {
        let f = fixture();
        let response = apply(
            &f,
            json!({
                "action": "create",
                "user_login": "carol",
                "user_email": "carol@example.com",
                "roles": ["editor"],
                "user_meta": {"nickname": "caz"}
            }),
        )
        .unwrap();
        assert_eq!(response.action, Some(ApplyAction::Created));
        let carol = f.store.find_by_login("carol").unwrap().unwrap();
        assert_eq!(carol.roles, vec!["editor".to_string()]);
        assert_eq!(carol.metadata["nickname"], json!("caz"));
    }

    #[test]
    fn roles_replaced_and_empty_fields_ignored() {
        let f = fixture();
        apply(
            &f,
            json!({
                "user_login": "alice",
                "user_email": "alice@example.com",
                "first_name": "",
                "roles": ["editor", "author", "editor"]
            }),
        )
        .unwrap();
        let alice = f.store.find_by_login("alice").unwrap().unwrap();
        assert_eq!(alice.roles, vec!["editor".to_string(), "author".to_string()]);

        apply(
            &f,
            json!({"user_login": "alice", "user_email": "alice@example.com", "roles": []}),
        )
        .unwrap();
        let alice = f.store.find_by_login("alice").unwrap().unwrap();
        assert_eq!(alice.roles.len(), 2);
    }

    #[test]
    fn toggles_gate_meta_and_roles() {
        let f = fixture();
        f.settings.update(|s| {
            s.sync_meta = false;
            s.sync_roles = false;
        });
        apply(
            &f,
            json!({
                "user_login": "alice",
                "user_email": "alice@example.com",
                "roles": ["administrator"],
                "meta": {"nickname": "al"}
            }),
        )
        .unwrap();
        let alice = f.store.find_by_login("alice").unwrap().unwrap();
        assert_eq!(alice.roles, vec!["subscriber".to_string()]);
        assert!(alice.metadata.is_empty());
    }

    #[test]
    fn delete_and_not_found() {
        let f = fixture();
        let response = apply(
            &f,
            json!({"action": "delete", "user_login": "bob", "user_email": "bob@example.com"}),
        )
        .unwrap();
        assert_eq!(response, ReceiveResponse::deleted(true));
        assert!(f.store.find_by_login("bob").unwrap().is_none());

        let response = apply(
            &f,
            json!({"action": "delete", "user_login": "bob", "user_email": "bob@example.com"}),
        )
        .unwrap();
        assert_eq!(response, ReceiveResponse::not_found());
    }

    #[test]
    fn validation_errors() {
        let f = fixture();
        let err = apply(&f, json!({"user_login": "alice"})).unwrap_err();
        assert_eq!(err.code(), "invalid_data");

        let err = apply(
            &f,
            json!({"action": "merge", "user_login": "alice", "user_email": "alice@example.com"}),
        )
        .unwrap_err();
        assert_eq!(err.code(), "invalid_action");

        let err = f.receiver.apply_body(b"not json").unwrap_err();
        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn encrypted_envelopes() {
        let f = fixture();
        f.settings.update(|s| s.encryption_key = "shared".into());
        let sealed = PayloadCipher::new("shared")
            .encrypt(r#"{"user_login":"dave","user_email":"dave@example.com"}"#)
            .unwrap();
        let response = apply(&f, json!({ "encrypted": sealed })).unwrap();
        assert_eq!(response.action, Some(ApplyAction::Created));

        let foreign = PayloadCipher::new("other")
            .encrypt(r#"{"user_login":"erin","user_email":"erin@example.com"}"#)
            .unwrap();
        let err = apply(&f, json!({ "encrypted": foreign })).unwrap_err();
        assert_eq!(err.code(), "decryption_failed");
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn encrypted_without_local_key_is_invalid_data() {
        let f = fixture();
        let err = apply(&f, json!({"encrypted": "AAAA"})).unwrap_err();
        assert_eq!(err.code(), "invalid_data");
    }

    #[test]
    fn notifications_suppressed_and_guard_restored() {
        let f = fixture();
        apply(
            &f,
            json!({"user_login": "alice", "user_email": "alice@example.com", "roles": ["editor"]}),
        )
        .unwrap();
        let seen = f.probe.seen.lock().clone();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|(_, suppressed)| *suppressed));
        assert!(!f.guard.is_engaged());

        apply(&f, json!({"user_login": "alice"})).unwrap_err();
        assert!(!f.guard.is_engaged());
    }

    #[test]
    fn receive_authenticates_first() {
        let f = fixture();
        let request = InboundRequest::new(Method::POST, "/wp-json/sync/v1/user")
            .header("X-API-Key", "wrong")
            .body(br#"{"user_login":"zed","user_email":"zed@example.com"}"#.to_vec());
        let err = f.receiver.receive(&request).unwrap_err();
        assert_eq!(err.code(), "invalid_api_key");
        assert!(f.store.find_by_login("zed").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_an_apply_failure() {
        let f = fixture();
        let err = apply(
            &f,
            json!({"user_login": "alice", "user_email": "bob@example.com"}),
        )
        .unwrap_err();
        assert_eq!(err.code(), "apply_failed");
        assert!(!f.guard.is_engaged());
    }
}
