//! Content fetchers: subtitles, danmaku, comments
//!
//! Three stateless retrieval + normalization operations over the identifiers
//! the resolver produced. Failures here are soft: the tool layer renders
//! them as readable messages, and a single bad subtitle track is skipped
//! without failing its siblings.

use crate::core::client::BiliClient;
use crate::error::{BiliError, Result};
use crate::types::{Comment, SubtitleTrack};
use futures::future::join_all;
use serde_json::Value;

/// Subtitle content URLs come back scheme-relative ("//host/path").
fn absolute_url(url: &str) -> String {
    if url.starts_with("http") {
        url.to_string()
    } else {
        format!("https:{url}")
    }
}

/// Pull the text payload out of every `<d>` element of a danmaku list.
///
/// The list is flat XML with non-nested `<d p="...">text</d>` elements, so a
/// pattern match is sufficient; timing/color attributes are discarded.
fn parse_danmaku(text: &str) -> Vec<String> {
    let re = regex::Regex::new(r"<d\s[^>]*>([^<]*)</d>").expect("Invalid regex");
    re.captures_iter(text)
        .map(|cap| html_escape::decode_html_entities(&cap[1]).to_string())
        .collect()
}

/// Project raw reply items into comments, dropping any without message text.
fn parse_comments(replies: &[Value]) -> Vec<Comment> {
    replies
        .iter()
        .filter_map(|reply| {
            let message = reply["content"]["message"].as_str()?;
            if message.is_empty() {
                return None;
            }
            Some(Comment {
                user: reply["member"]["uname"]
                    .as_str()
                    .unwrap_or("Unknown User")
                    .to_string(),
                content: message.to_string(),
                likes: reply["like"].as_u64().unwrap_or(0),
            })
        })
        .collect()
}

impl BiliClient {
    /// Fetch subtitle tracks for a video part.
    ///
    /// Each listed track with a content URL gets its own body fetch, run
    /// concurrently; a failed track is logged and dropped. An empty list is
    /// the normal outcome for videos without subtitles.
    pub async fn subtitles(&self, aid: u64, cid: u64) -> Result<Vec<SubtitleTrack>> {
        let url = format!("{}/x/player/wbi/v2", self.api_base);
        let resp = self
            .get(&url)
            .query(&[("aid", aid.to_string()), ("cid", cid.to_string())])
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

        let Some(list) = json["data"]["subtitle"]["subtitles"].as_array() else {
            return Ok(Vec::new());
        };

        let fetches = list.iter().filter_map(|meta| {
            let content_url = meta["subtitle_url"].as_str().filter(|u| !u.is_empty())?;
            let lan = meta["lan"].as_str().unwrap_or("").to_string();
            Some(self.fetch_subtitle_track(lan, absolute_url(content_url)))
        });

        Ok(join_all(fetches).await.into_iter().flatten().collect())
    }

    async fn fetch_subtitle_track(&self, lan: String, url: String) -> Option<SubtitleTrack> {
        match self.fetch_subtitle_body(&url).await {
            Ok(content) => Some(SubtitleTrack { lan, content }),
            Err(e) => {
                tracing::warn!("skipping subtitle track {url}: {e}");
                None
            }
        }
    }

    async fn fetch_subtitle_body(&self, url: &str) -> Result<Vec<String>> {
        let resp = self.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(BiliError::Network(format!("HTTP {}: {}", resp.status(), url)));
        }
        let json: Value = resp.json().await?;
        let segments = json["body"]
            .as_array()
            .map(|body| {
                body.iter()
                    .map(|seg| seg["content"].as_str().unwrap_or("").to_string())
                    .collect()
            })
            .unwrap_or_default();
        Ok(segments)
    }

    /// Fetch the danmaku (bullet comment) stream for a video part.
    pub async fn danmaku(&self, cid: u64) -> Result<Vec<String>> {
        let url = format!("{}/x/v1/dm/list.so", self.api_base);
        let resp = self.get(&url).query(&[("oid", cid.to_string())]).send().await?;
        let bytes = resp.bytes().await?;

        // Tolerate invalid byte sequences; upstream occasionally serves them.
        let text = String::from_utf8_lossy(&bytes);
        let items = parse_danmaku(&text);
        if items.is_empty() && !text.contains("<?xml") {
            return Err(BiliError::Parse("danmaku response is not an XML list".into()));
        }
        Ok(items)
    }

    /// Fetch popular comments for a video (sorted by popularity upstream).
    pub async fn comments(&self, aid: u64) -> Result<Vec<Comment>> {
        let url = format!("{}/x/v2/reply", self.api_base);
        let resp = self
            .get(&url)
            .query(&[
                ("type", "1".to_string()),
                ("oid", aid.to_string()),
                ("sort", "2".to_string()),
            ])
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

        let replies = json["data"]["replies"].as_array().cloned().unwrap_or_default();
        Ok(parse_comments(&replies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base: &str) -> BiliClient {
        let config = Config {
            sessdata: "s".into(),
        };
        BiliClient::with_bases(&config, base, base).unwrap()
    }

    #[test]
    fn test_parse_danmaku_extracts_text_only() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?><i>
            <chatserver>chat.bilibili.com</chatserver>
            <d p="12.3,1,25,16777215,1700000000,0,abc,1">first one</d>
            <d p="45.6,4,25,65280,1700000001,0,def,2">二刷打卡 &amp; 点赞</d>
        </i>"#;
        assert_eq!(parse_danmaku(xml), vec!["first one", "二刷打卡 & 点赞"]);
    }

    #[test]
    fn test_parse_comments_drops_empty_messages() {
        let replies = vec![
            serde_json::json!({
                "member": { "uname": "alice" },
                "content": { "message": "great video" },
                "like": 42
            }),
            serde_json::json!({ "member": { "uname": "bob" }, "content": {}, "like": 3 }),
            serde_json::json!({ "member": {}, "content": { "message": "nice" } }),
        ];
        let comments = parse_comments(&replies);
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].user, "alice");
        assert_eq!(comments[0].likes, 42);
        assert_eq!(comments[1].user, "Unknown User");
        assert_eq!(comments[1].likes, 0);
    }

    #[test]
    fn test_absolute_url() {
        assert_eq!(
            absolute_url("//aisubtitle.hdslb.com/bfs/ai_subtitle/x.json"),
            "https://aisubtitle.hdslb.com/bfs/ai_subtitle/x.json"
        );
        assert_eq!(absolute_url("http://127.0.0.1/x"), "http://127.0.0.1/x");
    }

    #[tokio::test]
    async fn test_failed_track_is_skipped_not_fatal() {
        let server = MockServer::start().await;
        let good = format!("{}/sub/good.json", server.uri());
        let bad = format!("{}/sub/bad.json", server.uri());

        Mock::given(method("GET"))
            .and(path("/x/player/wbi/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "data": { "subtitle": { "subtitles": [
                    { "lan": "zh-CN", "subtitle_url": good },
                    { "lan": "en-US", "subtitle_url": bad }
                ] } }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sub/good.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "body": [
                    { "from": 0.0, "to": 2.0, "content": "hello" },
                    { "from": 2.0, "to": 4.0, "content": "world" }
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sub/bad.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let tracks = client.subtitles(1, 2).await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].lan, "zh-CN");
        assert_eq!(tracks[0].content, vec!["hello", "world"]);
    }

    #[tokio::test]
    async fn test_no_subtitles_is_empty_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x/player/wbi/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "data": { "subtitle": { "subtitles": [] } }
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(client.subtitles(1, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_danmaku_fetch_and_parse() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x/v1/dm/list.so"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<?xml version="1.0"?><i><d p="1,1,25,16777215,0,0,a,1">hi</d></i>"#,
            ))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert_eq!(client.danmaku(7).await.unwrap(), vec!["hi"]);
    }

    #[tokio::test]
    async fn test_danmaku_non_xml_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x/v1/dm/list.so"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"code\":-400}"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        assert!(matches!(client.danmaku(7).await, Err(BiliError::Parse(_))));
    }

    #[tokio::test]
    async fn test_comments_fetch_and_projection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x/v2/reply"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "data": { "replies": [
                    { "member": { "uname": "carol" }, "content": { "message": "top" }, "like": 9 },
                    { "member": { "uname": "dave" }, "content": { "message": "" }, "like": 1 }
                ] }
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let comments = client.comments(99).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].user, "carol");
        assert_eq!(comments[0].content, "top");
    }
}
