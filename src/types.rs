//! Type definitions for bili-mcp
//!
//! Source of truth for all data structures.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================
// Video Identifiers
// ============================================

/// Identifiers for a single video, derived once per tool invocation.
///
/// `bvid` is the externally visible video code; `aid`/`cid` are the internal
/// numeric identifiers every content endpoint wants. Never cached: they are
/// cheap to re-fetch and may change if a video is re-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoIds {
    pub bvid: String,
    pub aid: u64,
    pub cid: u64,
}

// ============================================
// Content Types
// ============================================

/// One subtitle track: language code plus the text segments, in order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub lan: String,
    pub content: Vec<String>,
}

/// A popular comment under a video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub user: String,
    pub content: String,
    pub likes: u64,
}

// ============================================
// Search Types
// ============================================

/// Criteria for a categorized search.
///
/// Optional fields apply only to some search types; inapplicable ones are
/// silently dropped when the request is built.
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    pub keyword: String,
    pub search_type: String,
    pub order: Option<String>,
    pub page: u32,
    /// Video duration bucket (video only): 0 all, 1 <10min, 2 10-30min,
    /// 3 30-60min, 4 >60min
    pub duration: Option<u32>,
    /// Video partition id (video only)
    pub tids: Option<u32>,
    /// User type filter (bili_user only)
    pub user_type: Option<u32>,
    /// User sort direction (bili_user only)
    pub order_sort: Option<u32>,
    /// Category filter (article/photo only)
    pub category_id: Option<u32>,
    /// Publish-time range start, Unix seconds; 0 disables
    pub pubtime_begin_s: i64,
    /// Publish-time range end, Unix seconds; 0 disables
    pub pubtime_end_s: i64,
}

/// One page of normalized search results
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    /// Per-type projected items, or `{live_room, live_user}` sub-lists for
    /// the combined live type
    pub results: Value,
    pub page: u32,
    #[serde(rename = "pagesize")]
    pub page_size: u32,
    #[serde(rename = "numResults")]
    pub num_results: u64,
    #[serde(rename = "numPages")]
    pub num_pages: u64,
    /// False when the request went out without a WBI signature (keys were
    /// unavailable); unsigned search is a degraded, flagged mode
    pub signed: bool,
}
