//! Categorized search
//!
//! One endpoint, ten result categories. A per-type table drives both sides
//! of the pipeline: which optional filters are sent upstream, and which
//! fields of each raw result item survive into the normalized output.
//! Adding a category means adding a table row, not another match arm.

use crate::core::client::{BiliClient, REFERER};
use crate::core::wbi;
use crate::error::{BiliError, Result};
use crate::types::{SearchCriteria, SearchPage};
use serde_json::{Map, Value};

/// The search categories the type endpoint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Video,
    MediaBangumi,
    MediaFt,
    /// Combined rooms-and-streamers category; returns two sub-lists.
    Live,
    LiveRoom,
    LiveUser,
    Article,
    Topic,
    BiliUser,
    Photo,
}

impl SearchType {
    pub const ALL: [SearchType; 10] = [
        SearchType::Video,
        SearchType::MediaBangumi,
        SearchType::MediaFt,
        SearchType::Live,
        SearchType::LiveRoom,
        SearchType::LiveUser,
        SearchType::Article,
        SearchType::Topic,
        SearchType::BiliUser,
        SearchType::Photo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SearchType::Video => "video",
            SearchType::MediaBangumi => "media_bangumi",
            SearchType::MediaFt => "media_ft",
            SearchType::Live => "live",
            SearchType::LiveRoom => "live_room",
            SearchType::LiveUser => "live_user",
            SearchType::Article => "article",
            SearchType::Topic => "topic",
            SearchType::BiliUser => "bili_user",
            SearchType::Photo => "photo",
        }
    }

    /// Parse a category name, rejecting unknown ones before any request.
    pub fn parse(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|ty| ty.as_str()).collect();
                BiliError::InvalidSearchType(format!(
                    "{s} (valid types: {})",
                    valid.join(", ")
                ))
            })
    }

    fn spec(self) -> &'static TypeSpec {
        match self {
            SearchType::Video => &VIDEO,
            SearchType::MediaBangumi | SearchType::MediaFt => &MEDIA,
            SearchType::Live => &LIVE,
            SearchType::LiveRoom => &LIVE_ROOM,
            SearchType::LiveUser => &LIVE_USER,
            SearchType::Article => &ARTICLE,
            SearchType::Topic => &TOPIC,
            SearchType::BiliUser => &BILI_USER,
            SearchType::Photo => &PHOTO,
        }
    }
}

/// Optional request filters; each applies to a subset of categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Filter {
    Duration,
    Tids,
    UserType,
    OrderSort,
    CategoryId,
}

/// One output field: its name, the raw field it reads, and whether the
/// value carries result-highlighting markup that must be stripped.
struct FieldMap {
    out: &'static str,
    src: &'static str,
    clean: bool,
}

const fn fm(out: &'static str, src: &'static str) -> FieldMap {
    FieldMap { out, src, clean: false }
}

const fn fm_clean(out: &'static str, src: &'static str) -> FieldMap {
    FieldMap { out, src, clean: true }
}

/// Per-category behavior: accepted filters plus the output projection.
///
/// An empty projection means items pass through untouched (the combined
/// live category, whose sub-lists are kept raw).
struct TypeSpec {
    filters: &'static [Filter],
    fields: &'static [FieldMap],
}

static VIDEO: TypeSpec = TypeSpec {
    filters: &[Filter::Duration, Filter::Tids],
    fields: &[
        fm("bvid", "bvid"),
        fm_clean("title", "title"),
        fm("author", "author"),
        fm("mid", "mid"),
        fm("play", "play"),
        fm("danmaku", "video_review"),
        fm("favorites", "favorites"),
        fm("duration", "duration"),
        fm("pubdate", "pubdate"),
        fm("description", "description"),
        fm("pic", "pic"),
        fm("tag", "tag"),
    ],
};

static MEDIA: TypeSpec = TypeSpec {
    filters: &[],
    fields: &[
        fm("media_id", "media_id"),
        fm("season_id", "season_id"),
        fm_clean("title", "title"),
        fm("org_title", "org_title"),
        fm("cover", "cover"),
        fm("media_type", "media_type"),
        fm("areas", "areas"),
        fm("styles", "styles"),
        fm("cv", "cv"),
        fm("staff", "staff"),
        fm("pubtime", "pubtime"),
        fm("media_score", "media_score"),
    ],
};

static LIVE: TypeSpec = TypeSpec {
    filters: &[],
    fields: &[],
};

static LIVE_ROOM: TypeSpec = TypeSpec {
    filters: &[],
    fields: &[
        fm("roomid", "roomid"),
        fm_clean("title", "title"),
        fm("uname", "uname"),
        fm("uid", "uid"),
        fm("online", "online"),
        fm("cover", "cover"),
        fm("user_cover", "user_cover"),
        fm("area_name", "cate_name"),
        fm("tags", "tags"),
    ],
};

static LIVE_USER: TypeSpec = TypeSpec {
    filters: &[],
    fields: &[
        fm("uid", "uid"),
        fm("uname", "uname"),
        fm("uface", "uface"),
        fm("roomid", "roomid"),
        fm("live_status", "live_status"),
        fm("tags", "tags"),
    ],
};

static ARTICLE: TypeSpec = TypeSpec {
    filters: &[Filter::CategoryId],
    fields: &[
        fm("id", "id"),
        fm_clean("title", "title"),
        fm("author", "mid"),
        fm("category_name", "category_name"),
        fm("view", "view"),
        fm("like", "like"),
        fm("reply", "reply"),
        fm("pub_time", "pub_time"),
        fm("desc", "desc"),
        fm("image_urls", "image_urls"),
    ],
};

static TOPIC: TypeSpec = TypeSpec {
    filters: &[],
    fields: &[
        fm("topic_id", "topic_id"),
        fm_clean("topic_name", "topic_name"),
        fm("update_count", "update_count"),
        fm("view_count", "view_count"),
        fm("discuss_count", "discuss_count"),
        fm("description", "description"),
    ],
};

static BILI_USER: TypeSpec = TypeSpec {
    filters: &[Filter::UserType, Filter::OrderSort],
    fields: &[
        fm("mid", "mid"),
        fm("uname", "uname"),
        fm("usign", "usign"),
        fm("fans", "fans"),
        fm("videos", "videos"),
        fm("level", "level"),
        fm("upic", "upic"),
        fm("official_verify", "official_verify"),
    ],
};

static PHOTO: TypeSpec = TypeSpec {
    filters: &[Filter::CategoryId],
    fields: &[
        fm("id", "id"),
        fm_clean("title", "title"),
        fm("mid", "mid"),
        fm("uname", "uname"),
        fm("count", "count"),
        fm("like", "like"),
        fm("view", "view"),
    ],
};

/// Remove result-highlighting markup and decode entities.
fn strip_html_tags(text: &str) -> String {
    let re = regex::Regex::new(r"<[^>]+>").expect("Invalid regex");
    let stripped = re.replace_all(text, "");
    html_escape::decode_html_entities(stripped.as_ref()).to_string()
}

/// Build the upstream parameter list, keeping only filters the category
/// accepts. Zero publish-time bounds mean "no limit" and are omitted.
fn build_params(criteria: &SearchCriteria, ty: SearchType) -> Vec<(String, String)> {
    let mut params = vec![
        ("keyword".to_string(), criteria.keyword.clone()),
        ("search_type".to_string(), ty.as_str().to_string()),
        ("page".to_string(), criteria.page.max(1).to_string()),
    ];

    if let Some(order) = criteria.order.as_deref().filter(|o| !o.is_empty()) {
        params.push(("order".to_string(), order.to_string()));
    }

    for filter in ty.spec().filters {
        let (name, value) = match filter {
            Filter::Duration => ("duration", criteria.duration),
            Filter::Tids => ("tids", criteria.tids),
            Filter::UserType => ("user_type", criteria.user_type),
            Filter::OrderSort => ("order_sort", criteria.order_sort),
            Filter::CategoryId => ("category_id", criteria.category_id),
        };
        if let Some(value) = value {
            params.push((name.to_string(), value.to_string()));
        }
    }

    if criteria.pubtime_begin_s != 0 {
        params.push(("pubtime_begin_s".to_string(), criteria.pubtime_begin_s.to_string()));
    }
    if criteria.pubtime_end_s != 0 {
        params.push(("pubtime_end_s".to_string(), criteria.pubtime_end_s.to_string()));
    }

    params
}

fn project_item(item: &Value, fields: &[FieldMap]) -> Value {
    let mut out = Map::new();
    for field in fields {
        let value = if field.clean {
            Value::String(strip_html_tags(item[field.src].as_str().unwrap_or("")))
        } else {
            item[field.src].clone()
        };
        out.insert(field.out.to_string(), value);
    }
    Value::Object(out)
}

/// Normalize the raw result payload for one category.
fn normalize_results(ty: SearchType, raw: &Value) -> Value {
    // The combined live category answers with an object of two sub-lists.
    if ty == SearchType::Live {
        if let Value::Object(map) = raw {
            return serde_json::json!({
                "live_room": map.get("live_room").cloned().unwrap_or_else(|| Value::Array(vec![])),
                "live_user": map.get("live_user").cloned().unwrap_or_else(|| Value::Array(vec![])),
            });
        }
    }

    let Some(items) = raw.as_array() else {
        return Value::Array(vec![]);
    };

    let fields = ty.spec().fields;
    if fields.is_empty() {
        return Value::Array(items.clone());
    }

    Value::Array(items.iter().map(|item| project_item(item, fields)).collect())
}

impl BiliClient {
    /// Run a categorized search and return one normalized page.
    ///
    /// The request is WBI-signed when keys are available; otherwise it goes
    /// out unsigned and the page is flagged via `signed: false`. The
    /// anti-bot cookie pair is attached the same best-effort way.
    pub async fn search(&self, criteria: &SearchCriteria) -> Result<SearchPage> {
        let ty = SearchType::parse(&criteria.search_type)?;
        let params = build_params(criteria, ty);

        let keys = self.wbi_keys().await;
        let signed = keys.is_some();
        let params = match &keys {
            Some(keys) => wbi::sign(&params, &keys.img_key, &keys.sub_key),
            None => {
                tracing::warn!("WBI keys unavailable, sending unsigned search request");
                params
            }
        };

        let anti_bot = self.anti_bot_cookie().await;
        let url = format!("{}/x/web-interface/search/type", self.api_base);
        let resp = self
            .http
            .get(&url)
            .header("Referer", REFERER)
            .header("Cookie", self.cookie_header(anti_bot.as_ref()))
            .query(&params)
            .send()
            .await?;
        let json: Value = resp.json().await?;

        let code = json["code"].as_i64().unwrap_or(-1);
        if code != 0 {
            return Err(BiliError::Api {
                code,
                message: json["message"]
                    .as_str()
                    .unwrap_or("Unknown error")
                    .to_string(),
            });
        }

        let data = &json["data"];
        Ok(SearchPage {
            results: normalize_results(ty, &data["result"]),
            page: data["page"].as_u64().unwrap_or(1) as u32,
            page_size: data["pagesize"].as_u64().unwrap_or(20) as u32,
            num_results: data["numResults"].as_u64().unwrap_or(0),
            num_pages: data["numPages"].as_u64().unwrap_or(0),
            signed,
        })
    }
}
