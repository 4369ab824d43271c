//! Redis cache integration tests.
//!
//! Run with: cargo test --test cache_redis --features redis -- --ignored
//!
//! Requires a reachable Redis (REDIS_URL, default redis://localhost:6379).

use std::sync::Arc;
use std::time::Duration;

use counters::cache::{Cache, EntityCache, RedisCache};
use counters::model::{Counter, EntityKind, INITIAL_COUNT};

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

async fn connect() -> RedisCache {
    RedisCache::connect(&redis_url())
        .await
        .expect("Failed to connect to Redis")
}

fn unique_key(name: &str) -> String {
    format!("test_{}:{}", name, uuid::Uuid::new_v4())
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_set_get_del() {
    let cache = connect().await;
    let key = unique_key("roundtrip");

    cache.set(&key, b"value".to_vec(), None).await.unwrap();
    assert_eq!(cache.get(&key).await.unwrap(), Some(b"value".to_vec()));

    cache.del(&key).await.unwrap();
    assert_eq!(cache.get(&key).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_del_absent_key() {
    let cache = connect().await;
    cache.del(&unique_key("absent")).await.unwrap();
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_ttl_expires() {
    let cache = connect().await;
    let key = unique_key("ttl");

    cache
        .set(&key, b"short".to_vec(), Some(Duration::from_millis(200)))
        .await
        .unwrap();
    assert!(cache.get(&key).await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(cache.get(&key).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_entity_cache() {
    let prefix = unique_key("entity");
    let cache = EntityCache::new(Arc::new(connect().await), Some(prefix), None);
    let counter = Counter {
        id: uuid::Uuid::new_v4().to_string(),
        title: "Pushups".to_string(),
        count: INITIAL_COUNT,
        timestamp: chrono::Utc::now(),
    };

    cache.set(EntityKind::Counter, &counter.id, &counter).await.unwrap();
    let cached: Option<Counter> = cache.get(EntityKind::Counter, &counter.id).await.unwrap();
    assert_eq!(cached, Some(counter.clone()));

    cache.del(EntityKind::Counter, &counter.id).await.unwrap();
    let cached: Option<Counter> = cache.get(EntityKind::Counter, &counter.id).await.unwrap();
    assert!(cached.is_none());
}
