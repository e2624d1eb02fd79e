/// Category persistence.
///
/// The store owns the title uniqueness constraint. `create` never overwrites: a second
/// insert of an existing title fails with `StoreError::DuplicateTitle`, and callers that
/// want create-or-fetch semantics build them on top (see `resolver::CategoryResolver`).
///
/// Redis key schema:
/// - `journal:v1:category:{id}` — JSON Category
/// - `journal:v1:category_title:{title}` — id owning the title (written with SET NX)
/// - `journal:v1:categories` — set of all category ids
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::warn;

use journal_common::redis::RedisStore;

use crate::color::is_hex_color;
use crate::error::StoreError;
use crate::model::Category;

const KEY_PREFIX: &str = "journal:v1:";

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

#[async_trait]
pub trait CategoryStore: Send + Sync {
    /// All categories, sorted by title.
    async fn list(&self) -> Result<Vec<Category>, StoreError>;

    /// Exact, case-sensitive title lookup.
    async fn find_by_title(&self, title: &str) -> Result<Option<Category>, StoreError>;

    /// Insert a new category. Fails with `DuplicateTitle` if the title is taken.
    async fn create(&self, title: &str, color: Option<&str>) -> Result<Category, StoreError>;

    /// Short backend name for health reporting.
    fn backend(&self) -> &'static str;
}

fn validate_new(title: &str, color: Option<&str>) -> Result<(), StoreError> {
    if title.trim().is_empty() {
        return Err(StoreError::Invalid("title must not be empty".to_string()));
    }
    if title.trim() != title {
        return Err(StoreError::Invalid(format!(
            "title must not have surrounding whitespace: {title:?}"
        )));
    }
    if let Some(color) = color {
        if !is_hex_color(color) {
            return Err(StoreError::Invalid(format!("color must be hex: {color:?}")));
        }
    }
    Ok(())
}

/// In-process store. Used when no `REDIS_URL` is configured, and by tests.
#[derive(Default)]
pub struct MemoryCategoryStore {
    categories: Mutex<Vec<Category>>,
    writes: AtomicUsize,
}

impl MemoryCategoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with pre-existing categories (no write is counted).
    #[cfg(test)]
    pub fn with_categories(categories: Vec<Category>) -> Self {
        Self {
            categories: Mutex::new(categories),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of `create` calls made against this store, successful or not.
    #[cfg(test)]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CategoryStore for MemoryCategoryStore {
    async fn list(&self) -> Result<Vec<Category>, StoreError> {
        let mut categories = self.categories.lock().await.clone();
        categories.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(categories)
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<Category>, StoreError> {
        let categories = self.categories.lock().await;
        Ok(categories.iter().find(|c| c.title == title).cloned())
    }

    async fn create(&self, title: &str, color: Option<&str>) -> Result<Category, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        validate_new(title, color)?;

        let mut categories = self.categories.lock().await;
        if categories.iter().any(|c| c.title == title) {
            return Err(StoreError::DuplicateTitle(title.to_string()));
        }
        let category = Category {
            id: new_category_id(),
            title: title.to_string(),
            color: color.map(str::to_string),
        };
        categories.push(category.clone());
        Ok(category)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Claims the title, then writes the record and indexes the id, in one atomic step.
/// KEYS: title key, record key, index key. ARGV: id, record JSON. Returns 0 when the
/// title is already taken, in which case nothing is written.
const CREATE_SCRIPT: &str = r"
if redis.call('SET', KEYS[1], ARGV[1], 'NX') then
  redis.call('SET', KEYS[2], ARGV[2])
  redis.call('SADD', KEYS[3], ARGV[1])
  return 1
end
return 0
";

/// Redis-backed store. Title uniqueness is enforced by `SET NX` on the title key,
/// inside the same script that writes the record.
pub struct RedisCategoryStore {
    redis: RedisStore,
}

impl RedisCategoryStore {
    pub fn new(redis: RedisStore) -> Self {
        Self { redis }
    }

    async fn load(&self, id: &str) -> Result<Option<Category>, StoreError> {
        let key = category_key(id);
        let Some(json) = self.redis.get(&key).await? else {
            return Ok(None);
        };
        decode(&key, &json).map(Some)
    }
}

#[async_trait]
impl CategoryStore for RedisCategoryStore {
    async fn list(&self) -> Result<Vec<Category>, StoreError> {
        let ids = self.redis.smembers(&index_key()).await?;
        let keys: Vec<String> = ids.iter().map(|id| category_key(id)).collect();
        let values = self.redis.mget(&keys).await?;

        let mut categories = Vec::with_capacity(values.len());
        for (key, value) in keys.iter().zip(values) {
            match value {
                Some(json) => categories.push(decode(key, &json)?),
                None => warn!(key, "category indexed but record missing, skipping"),
            }
        }
        categories.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(categories)
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<Category>, StoreError> {
        let Some(id) = self.redis.get(&title_key(title)).await? else {
            return Ok(None);
        };
        let category = self.load(&id).await?;
        if category.is_none() {
            warn!(title, id, "title claimed but category record missing");
        }
        Ok(category)
    }

    async fn create(&self, title: &str, color: Option<&str>) -> Result<Category, StoreError> {
        validate_new(title, color)?;

        let category = Category {
            id: new_category_id(),
            title: title.to_string(),
            color: color.map(str::to_string),
        };
        let json = serde_json::to_string(&category)
            .map_err(|e| StoreError::Common(e.into()))?;

        let (title_key, record_key, index_key) =
            (title_key(title), category_key(&category.id), index_key());
        let created: i64 = self
            .redis
            .eval(
                CREATE_SCRIPT,
                &[title_key.as_str(), record_key.as_str(), index_key.as_str()],
                &[category.id.as_str(), json.as_str()],
            )
            .await?;
        if created == 0 {
            return Err(StoreError::DuplicateTitle(title.to_string()));
        }
        Ok(category)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

fn decode(key: &str, json: &str) -> Result<Category, StoreError> {
    serde_json::from_str(json).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn category_key(id: &str) -> String {
    format!("{KEY_PREFIX}category:{id}")
}

fn title_key(title: &str) -> String {
    format!("{KEY_PREFIX}category_title:{title}")
}

fn index_key() -> String {
    format!("{KEY_PREFIX}categories")
}

/// 24 lowercase hex chars, unique per process and practically unique across processes.
pub fn new_category_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();

    let mut h = Sha256::new();
    h.update(now.as_nanos().to_le_bytes());
    h.update(pid.to_le_bytes());
    h.update(counter.to_le_bytes());
    let digest = h.finalize();
    hex_lower(&digest[..12])
}

fn hex_lower(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}
