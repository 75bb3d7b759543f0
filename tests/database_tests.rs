use std::env;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use humanize_proxy::{
    database::{queries::QuotaQueries, Database},
    errors::AppError,
    models::DEFAULT_WORD_ALLOWANCE,
    services::quota_store::{PgQuotaStore, QuotaStore},
};
use serial_test::serial;

/// Connects to `TEST_DATABASE_URL`, migrates and truncates. `None` when unset.
async fn setup_test_store() -> Option<PgQuotaStore> {
    let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping database test");
        return None;
    };

    let db = Database::new(&database_url, 5);
    let pool = db.pool().await.expect("Failed to connect to test database");

    sqlx::query("TRUNCATE TABLE user_quotas")
        .execute(pool)
        .await
        .expect("Failed to clean test database");

    Some(PgQuotaStore::new(db))
}

#[tokio::test]
#[serial]
async fn test_get_or_create_is_idempotent() {
    let Some(store) = setup_test_store().await else { return };

    let created = store.get_or_create("Test@Example.com ").await.unwrap();
    assert_eq!(created.email, "test@example.com");
    assert_eq!(created.words_left, DEFAULT_WORD_ALLOWANCE);
    assert!(!created.is_premium);

    let again = store.get_or_create("test@example.com").await.unwrap();
    assert_eq!(again.created_at, created.created_at);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_quotas")
        .fetch_one(store.database().pool().await.unwrap())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
#[serial]
async fn test_record_usage_clamps_and_counts() {
    let Some(store) = setup_test_store().await else { return };

    assert!(matches!(
        store.record_usage("ghost@example.com", 1).await,
        Err(AppError::NotFound)
    ));

    store.get_or_create("test@example.com").await.unwrap();
    let quota = store.record_usage("test@example.com", 9_995).await.unwrap();
    assert_eq!(quota.words_left, 5);
    assert_eq!(quota.total_words_used, 9_995);

    let quota = store.record_usage("test@example.com", 8).await.unwrap();
    assert_eq!(quota.words_left, 0);
    assert_eq!(quota.total_words_used, 10_003);
}

#[tokio::test]
#[serial]
async fn test_concurrent_usage_is_atomic() {
    let Some(store) = setup_test_store().await else { return };
    let store = Arc::new(store);
    store.get_or_create("busy@example.com").await.unwrap();

    let updates = (0..20).map(|_| {
        let store = store.clone();
        async move { store.record_usage("busy@example.com", 7).await }
    });
    for result in futures::future::join_all(updates).await {
        result.unwrap();
    }

    let quota = store.get_or_create("busy@example.com").await.unwrap();
    assert_eq!(quota.total_words_used, 140);
    assert_eq!(quota.words_left, DEFAULT_WORD_ALLOWANCE - 140);
}

#[tokio::test]
#[serial]
async fn test_premium_upgrade_and_usage() {
    let Some(store) = setup_test_store().await else { return };
    store.get_or_create("vip@example.com").await.unwrap();
    store.record_usage("vip@example.com", 100).await.unwrap();

    let before = Utc::now();
    let quota = store
        .upgrade_to_premium("vip@example.com", Some("sub_1".to_string()), 30)
        .await
        .unwrap();
    assert!(quota.is_premium);
    assert_eq!(quota.words_left, DEFAULT_WORD_ALLOWANCE);
    assert_eq!(quota.subscription_id.as_deref(), Some("sub_1"));
    let expiry = quota.premium_expiry.unwrap();
    assert!(expiry >= before + Duration::days(30) - Duration::seconds(5));

    let extended = store
        .upgrade_to_premium("vip@example.com", None, 10)
        .await
        .unwrap();
    assert_eq!(extended.premium_expiry, Some(expiry + Duration::days(10)));
    assert_eq!(extended.subscription_id.as_deref(), Some("sub_1"));

    let charged = store.record_usage("vip@example.com", 500).await.unwrap();
    assert_eq!(charged.words_left, DEFAULT_WORD_ALLOWANCE);
    assert_eq!(charged.total_words_used, 600);
}

#[tokio::test]
#[serial]
async fn test_upgrade_unknown_user() {
    let Some(store) = setup_test_store().await else { return };
    assert!(matches!(
        store.upgrade_to_premium("ghost@example.com", None, 30).await,
        Err(AppError::NotFound)
    ));
}

#[tokio::test]
#[serial]
async fn test_expired_premium_is_charged() {
    let Some(store) = setup_test_store().await else { return };
    store.get_or_create("lapsed@example.com").await.unwrap();

    sqlx::query(
        "UPDATE user_quotas SET is_premium = TRUE, premium_expiry = $2, words_left = 50 WHERE email = $1",
    )
    .bind("lapsed@example.com")
    .bind(Utc::now() - Duration::days(1))
    .execute(store.database().pool().await.unwrap())
    .await
    .unwrap();

    let quota = store.record_usage("lapsed@example.com", 20).await.unwrap();
    assert_eq!(quota.words_left, 30);

    let renewed = store
        .upgrade_to_premium("lapsed@example.com", None, 30)
        .await
        .unwrap();
    assert!(renewed.premium_expiry.unwrap() > Utc::now() + Duration::days(29));
}

fn may(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, day, 12, 0, 0).unwrap()
}

#[tokio::test]
#[serial]
async fn test_renewal_extends_subscriber_on_cycle_day() {
    let Some(store) = setup_test_store().await else { return };
    store.get_or_create("sub@example.com").await.unwrap();
    store
        .upgrade_to_premium("sub@example.com", Some("sub_9".to_string()), 30)
        .await
        .unwrap();

    let pool = store.database().pool().await.unwrap();
    sqlx::query("UPDATE user_quotas SET premium_expiry = $2 WHERE email = $1")
        .bind("sub@example.com")
        .bind(may(25))
        .execute(pool)
        .await
        .unwrap();

    assert_eq!(
        store.renew_subscription_at("sub@example.com", may(3)).await.unwrap(),
        None
    );

    let renewed = store
        .renew_subscription_at("Sub@Example.com", may(20))
        .await
        .unwrap()
        .expect("renewal is due on the 20th");
    assert_eq!(renewed.premium_expiry, Some(may(25) + Duration::days(30)));
    assert!(renewed.is_premium);

    let stored = QuotaQueries::find_by_email(pool, "sub@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.premium_expiry, Some(may(25) + Duration::days(30)));
}

#[tokio::test]
#[serial]
async fn test_renewal_skips_ineligible_records() {
    let Some(store) = setup_test_store().await else { return };
    store.get_or_create("free@example.com").await.unwrap();
    store.get_or_create("nosub@example.com").await.unwrap();
    store
        .upgrade_to_premium("nosub@example.com", None, 30)
        .await
        .unwrap();

    assert_eq!(
        store.renew_subscription_at("free@example.com", may(20)).await.unwrap(),
        None
    );
    assert_eq!(
        store.renew_subscription_at("nosub@example.com", may(21)).await.unwrap(),
        None
    );

    let pool = store.database().pool().await.unwrap();
    assert_eq!(
        QuotaQueries::renew_subscription(pool, "free@example.com", may(20))
            .await
            .unwrap(),
        None
    );
    assert!(matches!(
        store.renew_subscription_at("ghost@example.com", may(20)).await,
        Err(AppError::NotFound)
    ));
}
