//! URL to identifier resolution
//!
//! Turns an arbitrary video URL into the identifiers every content endpoint
//! needs: the BV code (direct pattern match, or redirect-following for
//! b23.tv short links) and then the numeric aid/cid pair from the view-info
//! endpoint. Identifiers are derived per invocation and never cached.

use crate::core::client::{BiliClient, REFERER};
use crate::error::{BiliError, Result};
use crate::types::VideoIds;

/// Extract a BV code from arbitrary text
pub fn extract_bvid(text: &str) -> Option<String> {
    let re = regex::Regex::new(r"BV[a-zA-Z0-9_]+").expect("Invalid regex");
    re.find(text).map(|m| m.as_str().to_string())
}

/// Check if a URL is a short link (b23.tv)
pub fn is_short_link(url: &str) -> bool {
    url.contains("b23.tv")
}

impl BiliClient {
    /// Resolve a video URL into its BV code.
    ///
    /// Direct match first; short links get one redirect-following HEAD
    /// request and a re-match on the final URL. Network failure resolves to
    /// `None` rather than an error.
    pub async fn resolve_bvid(&self, url: &str) -> Option<String> {
        if let Some(bvid) = extract_bvid(url) {
            return Some(bvid);
        }

        if !is_short_link(url) {
            return None;
        }

        match self.resolve_short_link(url).await {
            Ok(final_url) => extract_bvid(&final_url),
            Err(e) => {
                tracing::warn!("failed to resolve short link {url}: {e}");
                None
            }
        }
    }

    /// Follow a short link's redirects and return the final URL.
    pub(crate) async fn resolve_short_link(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .head(url)
            .header("Referer", REFERER)
            .header("Cookie", self.cookie_header(None))
            .send()
            .await?;
        Ok(resp.url().to_string())
    }

    /// Map a BV code to the numeric identifiers content endpoints want.
    pub async fn resolve_ids(&self, bvid: &str) -> Result<VideoIds> {
        let url = format!("{}/x/web-interface/view", self.api_base);
        let resp = self.get(&url).query(&[("bvid", bvid)]).send().await?;
        let json: serde_json::Value = resp.json().await?;

        let code = json["code"].as_i64().unwrap_or(-1);
        if code != 0 {
            // Raw body kept reachable for diagnostics.
            tracing::debug!("view-info error response: {json}");
            return Err(BiliError::Api {
                code,
                message: json["message"]
                    .as_str()
                    .unwrap_or("Unknown error")
                    .to_string(),
            });
        }

        let data = &json["data"];
        let aid = data["aid"]
            .as_u64()
            .ok_or_else(|| BiliError::Parse("view-info response missing aid".into()))?;
        let cid = data["cid"]
            .as_u64()
            .ok_or_else(|| BiliError::Parse("view-info response missing cid".into()))?;

        Ok(VideoIds {
            bvid: data["bvid"].as_str().unwrap_or(bvid).to_string(),
            aid,
            cid,
        })
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
    fn test_extract_bvid_direct() {
        assert_eq!(
            extract_bvid("https://www.bilibili.com/video/BV1x341177NN?p=2"),
            Some("BV1x341177NN".to_string())
        );
        assert_eq!(
            extract_bvid("watch this BV1xx411c7_Z later"),
            Some("BV1xx411c7_Z".to_string())
        );
        assert_eq!(extract_bvid("https://example.com/av12345"), None);
    }

    #[tokio::test]
    async fn test_direct_code_skips_network() {
        // Client pointed at an unroutable base: any network call would fail,
        // so a successful resolve proves none was made.
        let client = test_client("http://127.0.0.1:1");
        let bvid = client
            .resolve_bvid("https://www.bilibili.com/video/BV1x341177NN")
            .await;
        assert_eq!(bvid.as_deref(), Some("BV1x341177NN"));
    }

    #[tokio::test]
    async fn test_non_short_link_without_code_is_absent() {
        let client = test_client("http://127.0.0.1:1");
        assert!(client.resolve_bvid("https://example.com/video/123").await.is_none());
    }

    #[tokio::test]
    async fn test_short_link_resolved_via_single_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/b23.tv/AbCd"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", "/video/BV1x341177NN"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/video/BV1x341177NN"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let bvid = client
            .resolve_bvid(&format!("{}/b23.tv/AbCd", server.uri()))
            .await;
        assert_eq!(bvid.as_deref(), Some("BV1x341177NN"));
    }

    #[tokio::test]
    async fn test_short_link_network_failure_is_absent() {
        let client = test_client("http://127.0.0.1:1");
        assert!(client.resolve_bvid("http://127.0.0.1:1/b23.tv/x").await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_ids_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x/web-interface/view"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": 0,
                "data": { "bvid": "BV1x341177NN", "aid": 549581551u64, "cid": 1078506187u64 }
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let ids = client.resolve_ids("BV1x341177NN").await.unwrap();
        assert_eq!(ids.bvid, "BV1x341177NN");
        assert_eq!(ids.aid, 549581551);
        assert_eq!(ids.cid, 1078506187);
    }

    #[tokio::test]
    async fn test_resolve_ids_surfaces_upstream_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/x/web-interface/view"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": -404, "message": "video not found"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        match client.resolve_ids("BV1bad").await {
            Err(BiliError::Api { code, message }) => {
                assert_eq!(code, -404);
                assert_eq!(message, "video not found");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
