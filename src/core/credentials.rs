//! Short-lived credential caches
//!
//! Two independent TTL caches back the signing layer: the WBI key pair
//! (fetched from the navigation endpoint) and the anti-bot cookie pair
//! (read from the landing page's response cookies). Both share one policy:
//! serve fresh, refresh on stale, fall back to a stale value when the
//! refresh fails, and report absent when there is nothing at all — callers
//! treat an absent credential as "proceed without it", never as fatal.

use crate::core::client::BiliClient;
use crate::error::{BiliError, Result};
use chrono::Utc;
use std::future::Future;
use tokio::sync::RwLock;

/// WBI signing key fragments.
///
/// Invariant: both fields non-empty. A partial pair is rejected at parse
/// time and treated as a cache miss.
#[derive(Debug, Clone)]
pub struct WbiKeys {
    pub img_key: String,
    pub sub_key: String,
}

/// Anti-bot device/session cookie pair.
///
/// Usable whenever `buvid3` is non-empty; `b_nut` may be blank.
#[derive(Debug, Clone)]
pub struct AntiBotCookie {
    pub buvid3: String,
    pub b_nut: String,
}

struct Entry<T> {
    value: T,
    fetched_at: i64,
}

/// Single-slot TTL cache with stale-value fallback.
///
/// Concurrent misses may each run their own refresh; fetches are idempotent
/// and the TTL throttles them under normal operation, so the slot lock is
/// held only around reads and the final store.
pub struct TtlCache<T: Clone> {
    ttl_secs: i64,
    slot: RwLock<Option<Entry<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            ttl_secs,
            slot: RwLock::new(None),
        }
    }

    /// Get the cached value, refreshing through `fetch` when stale.
    ///
    /// Exactly one fetch attempt is made per stale call; a failed fetch
    /// degrades to the previous value (served indefinitely until a fetch
    /// succeeds) or `None` when nothing was ever cached.
    pub async fn get_with<F, Fut>(&self, now: i64, fetch: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(entry) = self.slot.read().await.as_ref() {
            if now - entry.fetched_at < self.ttl_secs {
                return Some(entry.value.clone());
            }
        }

        match fetch().await {
            Ok(value) => {
                *self.slot.write().await = Some(Entry {
                    value: value.clone(),
                    fetched_at: now,
                });
                Some(value)
            }
            Err(e) => {
                tracing::warn!("credential refresh failed, serving stale value if any: {e}");
                self.slot.read().await.as_ref().map(|entry| entry.value.clone())
            }
        }
    }
}

/// Filename stem of a key URL: `.../wbi/abc123.png` → `abc123`.
fn key_stem(url: &str) -> &str {
    url.rsplit('/')
        .next()
        .unwrap_or("")
        .split('.')
        .next()
        .unwrap_or("")
}

impl BiliClient {
    /// Current WBI key pair, or `None` when none can be obtained.
    pub async fn wbi_keys(&self) -> Option<WbiKeys> {
        self.wbi_cache
            .get_with(Utc::now().timestamp(), || self.fetch_wbi_keys())
            .await
    }

    /// Current anti-bot cookie pair, or `None` when none can be obtained.
    pub async fn anti_bot_cookie(&self) -> Option<AntiBotCookie> {
        self.buvid_cache
            .get_with(Utc::now().timestamp(), || self.fetch_anti_bot())
            .await
    }

    /// Fetch the key pair from the navigation endpoint.
    ///
    /// The keys are served even to anonymous sessions (the endpoint then
    /// answers with code -101), so the application code is deliberately not
    /// checked here.
    async fn fetch_wbi_keys(&self) -> Result<WbiKeys> {
        let url = format!("{}/x/web-interface/nav", self.api_base);
        let resp = self.get(&url).send().await?;
        let json: serde_json::Value = resp.json().await?;

        let wbi_img = &json["data"]["wbi_img"];
        let img_key = key_stem(wbi_img["img_url"].as_str().unwrap_or("")).to_string();
        let sub_key = key_stem(wbi_img["sub_url"].as_str().unwrap_or("")).to_string();

        if img_key.is_empty() || sub_key.is_empty() {
            return Err(BiliError::Parse(
                "nav response missing wbi_img key urls".into(),
            ));
        }

        Ok(WbiKeys { img_key, sub_key })
    }

    /// Fetch the anti-bot pair from the landing page's response cookies.
    async fn fetch_anti_bot(&self) -> Result<AntiBotCookie> {
        let url = format!("{}/", self.www_base);
        let resp = self.get(&url).send().await?;

        let mut buvid3 = String::new();
        let mut b_nut = String::new();
        for cookie in resp.cookies() {
            match cookie.name() {
                "buvid3" => buvid3 = cookie.value().to_string(),
                "b_nut" => b_nut = cookie.value().to_string(),
                _ => {}
            }
        }

        if buvid3.is_empty() {
            return Err(BiliError::Parse("landing page set no buvid3 cookie".into()));
        }

        Ok(AntiBotCookie { buvid3, b_nut })
    }
}
