use r2d2_redis::{r2d2 as redis_r2d2, redis, RedisConnectionManager};
use std::ops::DerefMut;

pub type RedisPool = redis_r2d2::Pool<RedisConnectionManager>;

const CART_COUNT_TTL_SECS: usize = 24 * 60 * 60;

/// Read-through copy of each user's cart count for header rendering.
///
/// Values are only ever written from a fresh database read, and every cart mutation deletes
/// the key so the next read repopulates it. The cache is never the source of a cart
/// mutation. Redis failures are logged and treated as a miss.
#[derive(Clone, Default)]
pub struct CartCountCache {
    pool: Option<RedisPool>,
}

impl CartCountCache {
    pub fn new(pool: RedisPool) -> Self {
        CartCountCache { pool: Some(pool) }
    }

    pub fn disabled() -> Self {
        CartCountCache { pool: None }
    }

    pub fn connect(redis_url: &str) -> Result<Self, redis_r2d2::Error> {
        let manager = match RedisConnectionManager::new(redis_url) {
            Ok(manager) => manager,
            Err(err) => {
                tracing::warn!(error = %err, "invalid REDIS_URL, cart count cache disabled");
                return Ok(Self::disabled());
            }
        };
        let pool = redis_r2d2::Pool::builder().build(manager)?;
        Ok(Self::new(pool))
    }

    pub fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    pub fn store(&self, user_id: i32, count: i64) {
        let Some(pool) = &self.pool else { return };
        let result = pool.get().map_err(|e| e.to_string()).and_then(|mut conn| {
            redis::cmd("SET")
                .arg(cart_count_key(user_id))
                .arg(count)
                .arg("EX")
                .arg(CART_COUNT_TTL_SECS)
                .query::<()>(conn.deref_mut())
                .map_err(|e| e.to_string())
        });
        if let Err(err) = result {
            tracing::warn!(user_id, error = %err, "failed to cache cart count");
        }
    }

    /// Drops the cached count after the cart changed.
    pub fn invalidate(&self, user_id: i32) {
        let Some(pool) = &self.pool else { return };
        let result = pool.get().map_err(|e| e.to_string()).and_then(|mut conn| {
            redis::cmd("DEL")
                .arg(cart_count_key(user_id))
                .query::<()>(conn.deref_mut())
                .map_err(|e| e.to_string())
        });
        if let Err(err) = result {
            tracing::warn!(user_id, error = %err, "failed to invalidate cart count");
        }
    }

    pub fn fetch(&self, user_id: i32) -> Option<i64> {
        let pool = self.pool.as_ref()?;
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(err) => {
                tracing::warn!(user_id, error = %err, "cart count cache unavailable");
                return None;
            }
        };
        match redis::cmd("GET")
            .arg(cart_count_key(user_id))
            .query::<Option<i64>>(conn.deref_mut())
        {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(user_id, error = %err, "failed to read cart count");
                None
            }
        }
    }
}

fn cart_count_key(user_id: i32) -> String {
    format!("cart:{user_id}:count")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_cache_always_misses() {
        let cache = CartCountCache::disabled();
        cache.store(1, 4);
        assert_eq!(cache.fetch(1), None);
        cache.invalidate(1);
        assert_eq!(cache.fetch(1), None);
        assert!(!cache.is_enabled());
    }

    #[test]
    fn keys_are_per_user() {
        assert_eq!(cart_count_key(42), "cart:42:count");
    }
}
