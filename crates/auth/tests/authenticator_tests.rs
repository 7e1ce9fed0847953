use parley_auth::{AuthError, Authenticator};
use parley_config::AuthConfig;
use parley_store::test_pool;

fn test_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "test-secret".to_string(),
        token_ttl_seconds: 3600,
    }
}

#[tokio::test]
async fn register_login_and_verify_round_trip() {
    let pool = test_pool().await;
    let auth = Authenticator::new(pool, &test_config());

    let (token, account) = auth
        .register("Ada", "ada@example.com", "hunter22")
        .await
        .unwrap();
    assert_eq!(account.email, "ada@example.com");

    let verified = auth.verify(&token).await.unwrap();
    assert_eq!(verified.id, account.id);

    let (login_token, login_account) = auth.login("ada@example.com", "hunter22").await.unwrap();
    assert_eq!(login_account.id, account.id);
    assert_eq!(auth.verify(&login_token).await.unwrap().id, account.id);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let pool = test_pool().await;
    let auth = Authenticator::new(pool, &test_config());

    auth.register("Ada", "ada@example.com", "hunter22")
        .await
        .unwrap();
    let err = auth.register("Imposter", "ada@example.com", "other").await;
    assert!(matches!(err, Err(AuthError::EmailTaken)));
}

#[tokio::test]
async fn wrong_password_and_unknown_email_fail_identically() {
    let pool = test_pool().await;
    let auth = Authenticator::new(pool, &test_config());

    auth.register("Ada", "ada@example.com", "hunter22")
        .await
        .unwrap();

    let wrong = auth.login("ada@example.com", "nope").await;
    assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

    let unknown = auth.login("ghost@example.com", "hunter22").await;
    assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
}

#[tokio::test]
async fn garbage_and_foreign_tokens_are_rejected() {
    let pool = test_pool().await;
    let auth = Authenticator::new(pool.clone(), &test_config());

    assert!(matches!(
        auth.verify("not-a-token").await,
        Err(AuthError::InvalidToken)
    ));

    // Token signed with a different secret.
    let other = Authenticator::new(
        pool,
        &AuthConfig {
            jwt_secret: "other-secret".to_string(),
            token_ttl_seconds: 3600,
        },
    );
    let (token, _) = other
        .register("Bob", "bob@example.com", "hunter22")
        .await
        .unwrap();
    assert!(matches!(
        auth.verify(&token).await,
        Err(AuthError::InvalidToken)
    ));
}
