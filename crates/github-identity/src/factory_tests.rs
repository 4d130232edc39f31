//! Tests for the configuration factory.

use super::*;
use crate::auth::{InstallationId, SignedAssertion};
use crate::error::ExchangeFailure;
use crate::resolver::AppAuthInput;
use async_trait::async_trait;
use chrono::Duration;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const TEST_PRIVATE_KEY_PEM: &str = include_str!("../testdata/app_key.pem");

// ============================================================================
// Test doubles
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct ExchangeCall {
    base_url: String,
    installation_id: String,
    issuer: String,
    lifetime_minutes: i64,
}

enum ExchangeBehaviour {
    Token(&'static str),
    Status(u16),
    Hang,
}

/// Records every exchange and answers according to `behaviour`.
struct MockExchanger {
    behaviour: ExchangeBehaviour,
    calls: Arc<Mutex<Vec<ExchangeCall>>>,
    polled: Arc<AtomicUsize>,
}

impl MockExchanger {
    fn new(behaviour: ExchangeBehaviour) -> Self {
        Self {
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
            polled: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl TokenExchanger for MockExchanger {
    async fn exchange(
        &self,
        base_url: &str,
        installation_id: &InstallationId,
        assertion: &SignedAssertion,
    ) -> Result<InstallationToken, AuthError> {
        self.polled.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(ExchangeCall {
            base_url: base_url.to_string(),
            installation_id: installation_id.to_string(),
            issuer: assertion.issuer().to_string(),
            lifetime_minutes: (assertion.expires_at() - assertion.issued_at()).num_minutes(),
        });

        match self.behaviour {
            ExchangeBehaviour::Token(value) => Ok(InstallationToken::new(
                value,
                Utc::now() + Duration::hours(1),
            )),
            ExchangeBehaviour::Status(status) => Err(ExchangeFailure::Status {
                status,
                body: "rejected".to_string(),
            }
            .into()),
            ExchangeBehaviour::Hang => std::future::pending().await,
        }
    }
}

/// Serves one in-memory key regardless of path and counts reads.
struct StaticKeySource {
    pem: &'static str,
    reads: Arc<AtomicUsize>,
}

impl StaticKeySource {
    fn new(pem: &'static str) -> Self {
        Self {
            pem,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl PrivateKeySource for StaticKeySource {
    fn read_private_key(&self, _path: &str) -> Result<Zeroizing<Vec<u8>>, ConfigError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(Zeroizing::new(self.pem.as_bytes().to_vec()))
    }
}

struct Harness {
    factory: ConfigFactory,
    calls: Arc<Mutex<Vec<ExchangeCall>>>,
    polled: Arc<AtomicUsize>,
    key_reads: Arc<AtomicUsize>,
}

fn harness(behaviour: ExchangeBehaviour, pem: &'static str) -> Harness {
    let exchanger = MockExchanger::new(behaviour);
    let key_source = StaticKeySource::new(pem);
    let calls = Arc::clone(&exchanger.calls);
    let polled = Arc::clone(&exchanger.polled);
    let key_reads = Arc::clone(&key_source.reads);

    Harness {
        factory: ConfigFactory::with_components(exchanger, key_source),
        calls,
        polled,
        key_reads,
    }
}

fn app_input(id: &str, installation_id: &str, pem_file: &str) -> RawConfigInput {
    RawConfigInput {
        app_auth: Some(AppAuthInput {
            id: id.to_string(),
            installation_id: installation_id.to_string(),
            pem_file: pem_file.to_string(),
        }),
        organization: Some("acme".to_string()),
        ..RawConfigInput::default()
    }
}

// ============================================================================
// Static token and anonymous paths
// ============================================================================

mod static_token_tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token_makes_no_network_call() {
        let h = harness(ExchangeBehaviour::Token("unused"), TEST_PRIVATE_KEY_PEM);
        let input = RawConfigInput {
            token: Some("abc".to_string()),
            owner: Some("alice".to_string()),
            ..RawConfigInput::default()
        };

        let context = h
            .factory
            .configure(input, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(context.identity().effective_token(), "abc");
        assert_eq!(context.identity().owner(), "alice");
        assert!(context.identity().is_individual());
        assert_eq!(context.token_expires_at(), None);
        assert_eq!(h.polled.load(Ordering::SeqCst), 0);
        assert_eq!(h.key_reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_anonymous_configuration() {
        let h = harness(ExchangeBehaviour::Token("unused"), TEST_PRIVATE_KEY_PEM);
        let input = RawConfigInput {
            organization: Some("acme".to_string()),
            ..RawConfigInput::default()
        };

        let context = h
            .factory
            .configure(input, CancellationToken::new())
            .await
            .unwrap();

        assert!(context.identity().is_anonymous());
        assert_eq!(context.identity().owner(), "acme");
        assert!(!context.identity().is_individual());
    }
}

// ============================================================================
// App authentication path
// ============================================================================

mod app_auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_exchanged_token_becomes_identity_token() {
        let h = harness(ExchangeBehaviour::Token("ghs_installation"), TEST_PRIVATE_KEY_PEM);

        let context = h
            .factory
            .configure(app_input("123", "456", "/keys/app.pem"), CancellationToken::new())
            .await
            .unwrap();

        let identity = context.identity();
        assert_eq!(identity.effective_token(), "ghs_installation");
        assert!(!identity.is_anonymous());
        assert_eq!(identity.owner(), "acme");
        assert!(context.token_expires_at().is_some());

        let calls = h.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![ExchangeCall {
                base_url: "https://api.github.com/".to_string(),
                installation_id: "456".to_string(),
                issuer: "123".to_string(),
                lifetime_minutes: 10,
            }]
        );
    }

    #[tokio::test]
    async fn test_custom_assertion_lifetime_is_used() {
        let h = harness(ExchangeBehaviour::Token("ghs_installation"), TEST_PRIVATE_KEY_PEM);
        let builder = CredentialAssertionBuilder::with_lifetime(Duration::minutes(5)).unwrap();
        let factory = h.factory.with_assertion_builder(builder);

        factory
            .configure(app_input("123", "456", "/keys/app.pem"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(h.calls.lock().unwrap()[0].lifetime_minutes, 5);
    }

    /// app_auth = {id: "1", installation_id: "2", pem_file: ""}
    #[tokio::test]
    async fn test_missing_pem_file_fails_before_network() {
        let h = harness(ExchangeBehaviour::Token("unused"), TEST_PRIVATE_KEY_PEM);

        let error = h
            .factory
            .configure(app_input("1", "2", ""), CancellationToken::new())
            .await
            .unwrap_err();

        match error {
            IdentityError::Config(config_error) => {
                assert_eq!(config_error.field(), Some("pem_file"))
            }
            other => panic!("Expected MissingField, got {:?}", other),
        }
        assert_eq!(h.polled.load(Ordering::SeqCst), 0);
        assert_eq!(h.key_reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_each_missing_field_is_reported() {
        for (input, field) in [
            (app_input("", "2", "k.pem"), "id"),
            (app_input("1", "", "k.pem"), "installation_id"),
        ] {
            let h = harness(ExchangeBehaviour::Token("unused"), TEST_PRIVATE_KEY_PEM);
            let error = h
                .factory
                .configure(input, CancellationToken::new())
                .await
                .unwrap_err();

            assert!(
                matches!(&error, IdentityError::Config(e) if e.field() == Some(field)),
                "expected missing {}, got {:?}",
                field,
                error
            );
            assert_eq!(h.polled.load(Ordering::SeqCst), 0);
        }
    }

    /// Valid app_auth, exchange returns a non-success response
    #[tokio::test]
    async fn test_rejected_exchange_returns_auth_error() {
        let h = harness(ExchangeBehaviour::Status(401), TEST_PRIVATE_KEY_PEM);

        let error = h
            .factory
            .configure(app_input("1", "2", "/keys/app.pem"), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            IdentityError::Auth(AuthError::ExchangeFailed(ExchangeFailure::Status {
                status: 401,
                ..
            }))
        ));
        assert_eq!(h.polled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_key_fails_before_network() {
        let h = harness(ExchangeBehaviour::Token("unused"), "not a pem key");

        let error = h
            .factory
            .configure(app_input("1", "2", "/keys/app.pem"), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            IdentityError::Config(ConfigError::InvalidKey { .. })
        ));
        assert_eq!(h.polled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unreadable_key_file() {
        let factory = ConfigFactory::with_components(
            MockExchanger::new(ExchangeBehaviour::Token("unused")),
            FilePrivateKeySource,
        );

        let error = factory
            .configure(
                app_input("1", "2", "/definitely/not/here/app.pem"),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match error {
            IdentityError::Config(ConfigError::KeyFileUnreadable { path, .. }) => {
                assert_eq!(path, "/definitely/not/here/app.pem")
            }
            other => panic!("Expected KeyFileUnreadable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_token_and_app_auth_conflict() {
        let h = harness(ExchangeBehaviour::Token("unused"), TEST_PRIVATE_KEY_PEM);
        let input = RawConfigInput {
            token: Some("abc".to_string()),
            ..app_input("1", "2", "/keys/app.pem")
        };

        let error = h
            .factory
            .configure(input, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            IdentityError::Config(ConfigError::ConflictingCredentials)
        ));
        assert_eq!(h.polled.load(Ordering::SeqCst), 0);
    }
}

// ============================================================================
// Cancellation
// ============================================================================

mod cancellation_tests {
    use super::*;

    #[tokio::test]
    async fn test_already_cancelled_signal_aborts_exchange() {
        let h = harness(ExchangeBehaviour::Hang, TEST_PRIVATE_KEY_PEM);
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let error = h
            .factory
            .configure(app_input("1", "2", "/keys/app.pem"), cancellation)
            .await
            .unwrap_err();

        assert!(matches!(error, IdentityError::Auth(AuthError::Cancelled)));
        assert_eq!(h.polled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_exchange() {
        let h = harness(ExchangeBehaviour::Hang, TEST_PRIVATE_KEY_PEM);
        let cancellation = CancellationToken::new();

        let trigger = cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let error = h
            .factory
            .configure(app_input("1", "2", "/keys/app.pem"), cancellation)
            .await
            .unwrap_err();

        assert!(matches!(error, IdentityError::Auth(AuthError::Cancelled)));
        assert_eq!(h.polled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_signal_is_attached_to_context() {
        let h = harness(ExchangeBehaviour::Token("unused"), TEST_PRIVATE_KEY_PEM);
        let cancellation = CancellationToken::new();

        let context = h
            .factory
            .configure(RawConfigInput::default(), cancellation.clone())
            .await
            .unwrap();
        let per_operation = context.child_cancellation();

        assert!(!context.is_cancelled());
        cancellation.cancel();

        assert!(context.is_cancelled());
        assert!(context.cancellation().is_cancelled());
        assert!(per_operation.is_cancelled());
    }

    #[tokio::test]
    async fn test_child_cancellation_does_not_cancel_provider() {
        let h = harness(ExchangeBehaviour::Token("unused"), TEST_PRIVATE_KEY_PEM);

        let context = h
            .factory
            .configure(RawConfigInput::default(), CancellationToken::new())
            .await
            .unwrap();

        context.child_cancellation().cancel();
        assert!(!context.is_cancelled());
    }
}

// ============================================================================
// Downstream helpers
// ============================================================================

mod context_tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;

    async fn context_with_token(token: Option<&str>) -> ProviderContext {
        let h = harness(ExchangeBehaviour::Token("unused"), TEST_PRIVATE_KEY_PEM);
        let input = RawConfigInput {
            token: token.map(str::to_string),
            insecure: true,
            ..RawConfigInput::default()
        };
        h.factory
            .configure(input, CancellationToken::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_authorize_adds_bearer_token() {
        let context = context_with_token(Some("ghp_abc")).await;
        let client = context.http_client().unwrap();

        let request = context
            .authorize(client.get("https://api.github.com/user"))
            .build()
            .unwrap();

        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer ghp_abc"
        );
    }

    #[tokio::test]
    async fn test_anonymous_requests_carry_no_authorization() {
        let context = context_with_token(None).await;
        let client = context.http_client().unwrap();

        let request = context
            .authorize(client.get("https://api.github.com/zen"))
            .build()
            .unwrap();

        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_shared_identity_is_same_allocation() {
        let context = context_with_token(Some("ghp_abc")).await;
        let clone = context.clone();

        assert!(Arc::ptr_eq(
            &context.shared_identity(),
            &clone.shared_identity()
        ));
    }
}

#[test]
fn test_file_key_source_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.pem");
    std::fs::write(&path, TEST_PRIVATE_KEY_PEM).unwrap();

    let bytes = FilePrivateKeySource
        .read_private_key(path.to_str().unwrap())
        .unwrap();

    assert_eq!(bytes.as_slice(), TEST_PRIVATE_KEY_PEM.as_bytes());
}
