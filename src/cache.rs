use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

/// TTL for cached user snapshots, reset on every write.
pub const USER_CACHE_TTL_SECONDS: i64 = 300;

/// Key/value cache with per-key expiry. Values are opaque bytes.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;
    async fn expire(&self, key: &str, seconds: i64) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        debug!("redis cache connected");
        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, seconds: i64) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.expire(key, seconds).await?;
        Ok(())
    }
}

/// Process-local cache used by tests and `AppState::fake()`.
pub struct MemoryCache {
    entries: std::sync::Mutex<
        std::collections::HashMap<String, (Vec<u8>, Option<std::time::Instant>)>,
    >,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    // a panic while holding the lock must not take the cache down with it
    fn lock_entries(
        &self,
    ) -> std::sync::MutexGuard<
        '_,
        std::collections::HashMap<String, (Vec<u8>, Option<std::time::Instant>)>,
    > {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let mut entries = self.lock_entries();
        let expired = matches!(
            entries.get(key),
            Some((_, Some(deadline))) if *deadline <= std::time::Instant::now()
        );
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.lock_entries()
            .insert(key.to_string(), (value.to_vec(), None));
        Ok(())
    }

    async fn expire(&self, key: &str, seconds: i64) -> anyhow::Result<()> {
        let mut entries = self.lock_entries();
        if let Some(entry) = entries.get_mut(key) {
            entry.1 =
                Some(std::time::Instant::now() + std::time::Duration::from_secs(seconds as u64));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_cache_roundtrip() {
        let cache = MemoryCache::new();
        cache.set("k", b"v").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_cache_expiry_drops_entry() {
        let cache = MemoryCache::new();
        cache.set("k", b"v").await.unwrap();
        cache.expire("k", 0).await.unwrap();
        // deadline of now + 0s has already passed
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn cache_survives_a_poisoned_lock() {
        let cache = std::sync::Arc::new(MemoryCache::new());
        cache.set("k", b"v").await.unwrap();

        let poisoner = cache.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.entries.lock().unwrap();
            panic!("poison the mutex");
        })
        .join();

        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
        cache.set("k2", b"v2").await.unwrap();
        assert_eq!(cache.get("k2").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn overwrite_clears_previous_expiry() {
        let cache = MemoryCache::new();
        cache.set("k", b"v1").await.unwrap();
        cache.expire("k", 0).await.unwrap();
        cache.set("k", b"v2").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v2".to_vec()));
    }
}
