//! Redis-backed key-value store (optional).
//!
//! Lets several verifier processes share one blacklist and one set of
//! refresh bindings. Needs Redis 6.2+ (`SET ... GET`, `GETDEL`).

use std::time::Duration;

use redis::Commands;

use tollgate_auth::KeyValueStore;
use tollgate_core::{StoreError, StoreResult};

const COMPARE_AND_SWAP: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  if tonumber(ARGV[3]) > 0 then
    redis.call('SET', KEYS[1], ARGV[2], 'PX', ARGV[3])
  else
    redis.call('SET', KEYS[1], ARGV[2])
  end
  return 1
end
return 0
";

#[derive(Debug, Clone)]
pub struct RedisKeyValueStore {
    client: redis::Client,
}

impl RedisKeyValueStore {
    pub fn new(redis_url: impl AsRef<str>) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(redis_error)?;
        Ok(Self { client })
    }

    fn connection(&self) -> StoreResult<redis::Connection> {
        self.client.get_connection().map_err(redis_error)
    }
}

impl KeyValueStore for RedisKeyValueStore {
    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<Option<String>> {
        let mut conn = self.connection()?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        cmd.arg("GET");
        cmd.query(&mut conn).map_err(redis_error)
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.connection()?;
        conn.get(key).map_err(redis_error)
    }

    fn delete(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.connection()?;
        redis::cmd("GETDEL")
            .arg(key)
            .query(&mut conn)
            .map_err(redis_error)
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        let mut conn = self.connection()?;
        let swapped: i64 = redis::Script::new(COMPARE_AND_SWAP)
            .key(key)
            .arg(expected)
            .arg(new)
            .arg(ttl.map_or(0, ttl_millis))
            .invoke(&mut conn)
            .map_err(redis_error)?;
        Ok(swapped == 1)
    }
}

/// Whole milliseconds, never zero (`PX 0` is rejected by Redis).
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn redis_error(e: redis::RedisError) -> StoreError {
    StoreError::unavailable(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_is_rounded_to_at_least_one_millisecond() {
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(2)), 2_000);
    }

    #[test]
    fn bad_url_is_a_store_error() {
        assert!(matches!(
            RedisKeyValueStore::new("not a url"),
            Err(StoreError::Unavailable(_))
        ));
    }
}
