//! Bilibili HTTP client
//!
//! Owns the reqwest client, the session cookie, and the two credential
//! caches. Constructed once at startup and shared (`Arc`) across tool
//! invocations; the caches are the only mutable state in the process.

use crate::config::Config;
use crate::core::credentials::{AntiBotCookie, TtlCache, WbiKeys};
use crate::error::{BiliError, Result};
use reqwest::Client;

pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36";
pub(crate) const REFERER: &str = "https://www.bilibili.com/";

/// Signing keys rotate daily upstream; an hour keeps us comfortably fresh.
const WBI_KEYS_TTL_SECS: i64 = 3600;
/// The anti-bot cookie pair is valid far longer; refresh once a day.
const ANTI_BOT_TTL_SECS: i64 = 86400;

/// Bilibili HTTP client
pub struct BiliClient {
    pub(crate) http: Client,
    pub(crate) sessdata: String,
    pub(crate) api_base: String,
    pub(crate) www_base: String,
    pub(crate) wbi_cache: TtlCache<WbiKeys>,
    pub(crate) buvid_cache: TtlCache<AntiBotCookie>,
}

impl BiliClient {
    /// Create a client pointed at the production endpoints.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_bases(config, "https://api.bilibili.com", "https://www.bilibili.com")
    }

    /// Create a client with overridden endpoint bases (tests, mirrors).
    pub fn with_bases(config: &Config, api_base: &str, www_base: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BiliError::Network(e.to_string()))?;

        Ok(Self {
            http,
            sessdata: config.sessdata.clone(),
            api_base: api_base.trim_end_matches('/').to_string(),
            www_base: www_base.trim_end_matches('/').to_string(),
            wbi_cache: TtlCache::new(WBI_KEYS_TTL_SECS),
            buvid_cache: TtlCache::new(ANTI_BOT_TTL_SECS),
        })
    }

    /// Assemble the Cookie header: always the session cookie, plus the
    /// anti-bot pair when one is available.
    pub(crate) fn cookie_header(&self, anti_bot: Option<&AntiBotCookie>) -> String {
        let mut parts = Vec::new();
        if !self.sessdata.is_empty() {
            parts.push(format!("SESSDATA={}", self.sessdata));
        }
        if let Some(cookie) = anti_bot {
            if !cookie.buvid3.is_empty() {
                parts.push(format!("buvid3={}", cookie.buvid3));
            }
            if !cookie.b_nut.is_empty() {
                parts.push(format!("b_nut={}", cookie.b_nut));
            }
        }
        parts.join("; ")
    }

    /// GET with the default headers every endpoint wants.
    pub(crate) fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header("Referer", REFERER)
            .header("Cookie", self.cookie_header(None))
    }
}
