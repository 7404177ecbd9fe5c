use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use secrecy::ExposeSecret;

use super::Namespace;

/// Thin wrapper over a Redis connection manager providing the two
/// operations the write pipeline and CDC consumer actually use. Deliberately
/// does not expose raw `GET`/`SET`/`KEYS` — every cache write goes through
/// `put_tracked` so `tracked(namespace)` never drifts from what's live.
#[derive(Clone)]
pub struct CacheKeystore {
    conn: ConnectionManager,
}

impl CacheKeystore {
    pub async fn connect(redis_uri: &secrecy::SecretString) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_uri.expose_secret())?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Atomic group: set `key=value` with TTL `t_entry_secs`, add `key` to
    /// `tracked(namespace)`, refresh that set's TTL to `t_set_secs`. A
    /// single pipeline so no observer can see the value land without its
    /// membership, or vice versa.
    pub async fn put_tracked(
        &self,
        namespace: Namespace,
        key: &str,
        value: &[u8],
        t_entry_secs: u64,
        t_set_secs: u64,
    ) -> Result<(), redis::RedisError> {
        let tracked_key = namespace.tracked_set_key();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .set_ex(key, value, t_entry_secs)
            .sadd(&tracked_key, key)
            .expire(&tracked_key, t_set_secs as i64);
        pipe.query_async::<()>(&mut self.conn.clone()).await
    }

    /// Reads `tracked(namespace)`, deletes every member key plus the
    /// tracking set itself, and returns how many data keys were deleted.
    /// O(live keys in the namespace): the tracked set is exactly what makes
    /// that possible instead of a `KEYS`/`SCAN` sweep over the keyspace.
    pub async fn invalidate_namespace(&self, namespace: Namespace) -> Result<u64, redis::RedisError> {
        let tracked_key = namespace.tracked_set_key();
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(&tracked_key).await?;
        if members.is_empty() {
            // still clear the (possibly empty, possibly TTL'd-out) tracking set
            let _: () = conn.del(&tracked_key).await?;
            return Ok(0);
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for member in &members {
            pipe.del(member);
        }
        pipe.del(&tracked_key);
        pipe.query_async::<()>(&mut conn).await?;
        Ok(members.len() as u64)
    }
}
