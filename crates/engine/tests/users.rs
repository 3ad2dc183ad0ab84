use chrono::Duration;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection};

use engine::{Credentials, Engine, EngineError};
use migration::MigratorTrait;

async fn engine_with(credentials: Credentials) -> Engine {
    engine_and_db(credentials).await.0
}

async fn engine_and_db(credentials: Credentials) -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .credentials(credentials)
        .build()
        .await
        .unwrap();
    (engine, db)
}

fn credentials() -> Credentials {
    Credentials::new("test-secret", Duration::hours(1), Duration::hours(24)).with_cost(4)
}

#[tokio::test]
async fn login_round_trip() {
    let engine = engine_with(credentials()).await;
    let signed_up = engine.signup("u2", "p2").await.unwrap();
    assert!(!signed_up.token.is_empty());

    let wrong = engine.login("u2", "nope").await;
    assert!(matches!(wrong, Err(EngineError::Unauthorized(_))));
    let unknown = engine.login("ghost", "p2").await;
    assert_eq!(
        unknown.unwrap_err().to_string(),
        wrong.unwrap_err().to_string()
    );

    let logged_in = engine.login("u2", "p2").await.unwrap();
    assert_eq!(logged_in.id, signed_up.id);
    assert_ne!(logged_in.token, signed_up.token);
    assert_ne!(logged_in.refresh_token, signed_up.refresh_token);

    let claims = engine.validate_token(&logged_in.token).await.unwrap();
    assert_eq!(claims.id, logged_in.id);
    assert_eq!(claims.username, "u2");
    // Refresh tokens are not access tokens.
    assert!(engine.validate_token(&logged_in.refresh_token).await.is_err());
    // Logging in revoked the signup token.
    assert!(matches!(
        engine.validate_token(&signed_up.token).await,
        Err(EngineError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn tokens_fail_after_their_ttl() {
    let expired = Credentials::new("test-secret", Duration::seconds(-10), Duration::hours(1))
        .with_cost(4);
    let engine = engine_with(expired).await;
    let user = engine.signup("u3", "p3").await.unwrap();
    assert!(matches!(
        engine.validate_token(&user.token).await,
        Err(EngineError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn signup_rejects_duplicates_and_blanks() {
    let engine = engine_with(credentials()).await;
    engine.signup("u1", "p1").await.unwrap();

    assert!(matches!(
        engine.signup("u1", "other").await,
        Err(EngineError::ExistingKey(_))
    ));
    assert!(matches!(
        engine.signup("  ", "p1").await,
        Err(EngineError::InvalidInput(_))
    ));
    assert!(matches!(
        engine.signup("u9", "").await,
        Err(EngineError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn signup_losing_a_race_is_a_conflict() {
    let (engine, db) = engine_and_db(credentials()).await;
    // Another signup for the same name lands between lookup and insert.
    db.execute_unprepared(
        "CREATE TRIGGER concurrent_signup BEFORE INSERT ON users \
         WHEN NEW.username = 'racer' AND NEW.id <> 'other' BEGIN \
         INSERT INTO users (id, username, password_hash, token, refresh_token, created_at) \
         VALUES ('other', 'racer', 'x', 't', 'r', '2024-01-01T00:00:00Z'); END",
    )
    .await
    .unwrap();

    assert!(matches!(
        engine.signup("racer", "p1").await,
        Err(EngineError::ExistingKey(_))
    ));
}

#[tokio::test]
async fn refresh_rotates_and_invalidates_the_old_pair() {
    let engine = engine_with(credentials()).await;
    let user = engine.signup("u1", "p1").await.unwrap();

    let refreshed = engine.refresh_tokens(&user.refresh_token).await.unwrap();
    assert_ne!(refreshed.token, user.token);
    assert!(engine.validate_token(&refreshed.token).await.is_ok());
    assert!(engine.validate_token(&user.token).await.is_err());

    // The previous refresh token is no longer the stored one.
    assert!(matches!(
        engine.refresh_tokens(&user.refresh_token).await,
        Err(EngineError::Unauthorized(_))
    ));
    // An access token cannot be used to refresh.
    assert!(matches!(
        engine.refresh_tokens(&refreshed.token).await,
        Err(EngineError::Unauthorized(_))
    ));
}
