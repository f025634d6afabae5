//! MCP server surface
//!
//! Four read-only tools over stdio: three per-video content tools taking a
//! URL, and the categorized search. Content-tool failures are soft: they
//! come back as a one-element list holding a readable message, never as a
//! protocol error, so an LLM client always has something to show.

use std::sync::Arc;

use chrono::Utc;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;

use crate::core::client::BiliClient;
use crate::types::{SearchCriteria, VideoIds};

#[derive(Debug, Deserialize, JsonSchema)]
struct VideoUrlArgs {
    /// Bilibili video URL, e.g. https://www.bilibili.com/video/BV1x341177NN
    /// (b23.tv short links work too)
    url: String,
}

#[derive(Debug, Deserialize, JsonSchema, Default)]
struct SearchArgs {
    /// Search keyword
    keyword: String,
    /// Content category: video (default), media_bangumi, media_ft, live,
    /// live_room, live_user, article, topic, bili_user, photo
    #[serde(default)]
    search_type: Option<String>,
    /// Sort order (default: click). Controls ranking only, never time
    /// filtering; use recent_days/recent_weeks for that.
    /// video/article/photo: click, totalrank, pubdate, dm, stow, scores;
    /// article also: attention; live_room: online, live_time;
    /// bili_user: 0, fans, level
    #[serde(default)]
    order: Option<String>,
    /// Page number (default 1), 20 results per page
    #[serde(default)]
    page: Option<u32>,
    /// Video duration bucket (video only): 0 all, 1 <10min, 2 10-30min,
    /// 3 30-60min, 4 >60min
    #[serde(default)]
    duration: Option<u32>,
    /// Video partition id filter (video only)
    #[serde(default)]
    tids: Option<u32>,
    /// User type filter (bili_user only): 0 all, 1 uploaders, 2 normal,
    /// 3 verified
    #[serde(default)]
    user_type: Option<u32>,
    /// User sort direction (bili_user only): 0 high to low, 1 low to high
    #[serde(default)]
    order_sort: Option<u32>,
    /// Category filter (article/photo only)
    #[serde(default)]
    category_id: Option<u32>,
    /// Only content from the last N days (0 = no limit). The recommended
    /// time filter.
    #[serde(default)]
    recent_days: Option<i64>,
    /// Only content from the last N weeks (0 = no limit); wins over
    /// recent_days
    #[serde(default)]
    recent_weeks: Option<i64>,
    /// Advanced: publish-time range start, Unix seconds (0 = no limit)
    #[serde(default)]
    pubtime_begin_s: Option<i64>,
    /// Advanced: publish-time range end, Unix seconds (0 = no limit)
    #[serde(default)]
    pubtime_end_s: Option<i64>,
}

/// Structured content for machine consumers plus a text fallback for
/// clients that only read `content[0].text`.
fn tool_result(payload: serde_json::Value) -> CallToolResult {
    let mut result = CallToolResult::structured(payload.clone());
    result.content = vec![Content::text(payload.to_string())];
    result
}

fn message_list(message: String) -> CallToolResult {
    tool_result(serde_json::json!([message]))
}

fn json_payload<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, McpError> {
    serde_json::to_value(value).map_err(|e| McpError::internal_error(e.to_string(), None))
}

/// Resolve the effective publish-time bounds.
///
/// Priority: recent_weeks over recent_days over the explicit bounds.
fn publish_window(
    recent_weeks: i64,
    recent_days: i64,
    begin: i64,
    end: i64,
    now: i64,
) -> (i64, i64) {
    if recent_weeks > 0 {
        (now - recent_weeks * 7 * 86400, now)
    } else if recent_days > 0 {
        (now - recent_days * 86400, now)
    } else {
        (begin, end)
    }
}

#[derive(Clone)]
pub struct BiliMcp {
    tool_router: ToolRouter<Self>,
    client: Arc<BiliClient>,
}

#[tool_router]
impl BiliMcp {
    pub fn new(client: Arc<BiliClient>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            client,
        }
    }

    /// URL to aid/cid, with the failure already rendered as a message.
    async fn resolve(&self, url: &str) -> Result<VideoIds, String> {
        let Some(bvid) = self.client.resolve_bvid(url).await else {
            return Err(format!("Error: could not extract a BV id from URL: {url}"));
        };
        self.client
            .resolve_ids(&bvid)
            .await
            .map_err(|e| format!("Failed to get video info: {e}"))
    }

    #[tool(description = "Get subtitles from a Bilibili video, grouped by language")]
    async fn get_subtitles(
        &self,
        params: Parameters<VideoUrlArgs>,
    ) -> Result<CallToolResult, McpError> {
        let ids = match self.resolve(&params.0.url).await {
            Ok(ids) => ids,
            Err(message) => return Ok(message_list(message)),
        };
        match self.client.subtitles(ids.aid, ids.cid).await {
            Ok(tracks) if tracks.is_empty() => {
                Ok(message_list("This video has no subtitles".to_string()))
            }
            Ok(tracks) => Ok(tool_result(json_payload(&tracks)?)),
            Err(e) => Ok(message_list(format!("Failed to get subtitles: {e}"))),
        }
    }

    #[tool(description = "Get danmaku (bullet comments) from a Bilibili video")]
    async fn get_danmaku(
        &self,
        params: Parameters<VideoUrlArgs>,
    ) -> Result<CallToolResult, McpError> {
        let ids = match self.resolve(&params.0.url).await {
            Ok(ids) => ids,
            Err(message) => return Ok(message_list(message)),
        };
        match self.client.danmaku(ids.cid).await {
            Ok(items) if items.is_empty() => {
                Ok(message_list("This video has no danmaku".to_string()))
            }
            Ok(items) => Ok(tool_result(json_payload(&items)?)),
            Err(e) => Ok(message_list(format!("Failed to get danmaku: {e}"))),
        }
    }

    #[tool(description = "Get popular comments from a Bilibili video")]
    async fn get_comments(
        &self,
        params: Parameters<VideoUrlArgs>,
    ) -> Result<CallToolResult, McpError> {
        let ids = match self.resolve(&params.0.url).await {
            Ok(ids) => ids,
            Err(message) => return Ok(message_list(message)),
        };
        match self.client.comments(ids.aid).await {
            Ok(comments) if comments.is_empty() => {
                Ok(message_list("This video has no popular comments".to_string()))
            }
            Ok(comments) => Ok(tool_result(json_payload(&comments)?)),
            Err(e) => Ok(message_list(format!("Failed to get comments: {e}"))),
        }
    }

    #[tool(
        description = "Search Bilibili by category; each page returns 20 results. \
            Use recent_days or recent_weeks for time filtering; the order \
            parameter only controls sorting, not time"
    )]
    async fn search(&self, params: Parameters<SearchArgs>) -> Result<CallToolResult, McpError> {
        let args = params.0;
        let (pubtime_begin_s, pubtime_end_s) = publish_window(
            args.recent_weeks.unwrap_or(0),
            args.recent_days.unwrap_or(0),
            args.pubtime_begin_s.unwrap_or(0),
            args.pubtime_end_s.unwrap_or(0),
            Utc::now().timestamp(),
        );

        let criteria = SearchCriteria {
            keyword: args.keyword,
            search_type: args.search_type.unwrap_or_else(|| "video".to_string()),
            order: Some(args.order.unwrap_or_else(|| "click".to_string())),
            page: args.page.unwrap_or(1),
            duration: args.duration,
            tids: args.tids,
            user_type: args.user_type,
            order_sort: args.order_sort,
            category_id: args.category_id,
            pubtime_begin_s,
            pubtime_end_s,
        };

        match self.client.search(&criteria).await {
            Ok(page) => Ok(tool_result(json_payload(&page)?)),
            Err(e) => Ok(tool_result(serde_json::json!({ "error": e.to_string() }))),
        }
    }
}

#[tool_handler]
impl rmcp::ServerHandler for BiliMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Bilibili video tools: subtitles, danmaku, popular comments (by URL) \
                 and categorized search. All tools are read-only."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Serve the tools over stdio until the client closes the stream.
pub async fn serve_stdio(client: Arc<BiliClient>) -> Result<(), McpError> {
    let service = BiliMcp::new(client);
    let running = service
        .serve(stdio())
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    running
        .waiting()
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(())
}
