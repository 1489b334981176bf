use anyhow::{Context, Result};
use reqwest::{Client, Request, Url};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::error::SearchError;

/// A single entry from a search response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
  /// Position in the response it came from. Unique per request only.
  pub id: u64,
  pub title: String,
  /// Full watch URL or a bare video id.
  pub watch_ref: String,
}

// --- Wire format ---

#[derive(Debug, Deserialize)]
struct SearchResponse {
  items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
  id: ItemId,
  snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemId {
  video_id: String,
}

#[derive(Debug, Deserialize)]
struct Snippet {
  title: String,
}

// --- Helpers ---

/// Build the watch URL for a bare video id.
pub fn watch_url(video_id: &str) -> String {
  format!("{}{}", constants().watch_url_prefix, video_id)
}

/// Extract the bare video id from a watch reference.
/// Takes whatever follows the last `v=`; a reference without one is already bare.
pub fn video_id_from_watch_ref(watch_ref: &str) -> &str {
  watch_ref.rsplit_once("v=").map_or(watch_ref, |(_, id)| id)
}

/// Decode a search response body into results, in response order.
pub fn parse_search_response(body: &[u8]) -> Result<Vec<SearchResult>, SearchError> {
  let response: SearchResponse = serde_json::from_slice(body)?;
  Ok(
    response
      .items
      .into_iter()
      .enumerate()
      .map(|(i, item)| SearchResult { id: i as u64, title: item.snippet.title, watch_ref: watch_url(&item.id.video_id) })
      .collect(),
  )
}

// --- Client ---

/// Issues title searches against the YouTube Data API search endpoint.
pub struct SearchClient {
  http: Client,
  endpoint: Url,
  api_key: String,
}

impl SearchClient {
  pub fn new(http: Client, endpoint: &str, api_key: String) -> Result<Self> {
    let endpoint = Url::parse(endpoint).with_context(|| format!("Invalid search endpoint: {}", endpoint))?;
    Ok(Self { http, endpoint, api_key })
  }

  /// Build the GET request for `title`. Empty titles are sent as-is.
  pub fn build_request(&self, title: &str) -> Result<Request, SearchError> {
    let mut url = self.endpoint.clone();
    url
      .query_pairs_mut()
      .append_pair("part", "snippet")
      .append_pair("type", "video")
      .append_pair("maxResults", &constants().max_results.to_string())
      .append_pair("q", title)
      .append_pair("key", &self.api_key);
    Ok(self.http.get(url).build()?)
  }

  pub async fn search(&self, title: &str) -> Result<Vec<SearchResult>, SearchError> {
    let request = self.build_request(title)?;
    debug!(query = %title, "search: sending request");

    let response = self.http.execute(request).await?;
    let status = response.status();
    if !status.is_success() {
      warn!(%status, query = %title, "search: endpoint returned non-success status");
    }

    let body = response.bytes().await?;
    let results = parse_search_response(&body)?;
    info!(query = %title, count = results.len(), "search: completed");
    Ok(results)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;
  use tokio::sync::mpsc;

  fn client() -> SearchClient {
    SearchClient::new(Client::new(), "https://www.googleapis.com/youtube/v3/search", "test-key".into()).unwrap()
  }

  fn query_param(request: &Request, name: &str) -> Option<String> {
    request.url().query_pairs().find(|(k, _)| k == name).map(|(_, v)| v.into_owned())
  }

  // --- build_request ---

  #[test]
  fn request_carries_fixed_parameters() {
    let request = client().build_request("lofi").unwrap();
    assert_eq!(request.method(), reqwest::Method::GET);
    assert_eq!(request.url().path(), "/youtube/v3/search");
    assert_eq!(query_param(&request, "part").as_deref(), Some("snippet"));
    assert_eq!(query_param(&request, "type").as_deref(), Some("video"));
    assert_eq!(query_param(&request, "maxResults").as_deref(), Some("5"));
    assert_eq!(query_param(&request, "key").as_deref(), Some("test-key"));
  }

  #[test]
  fn request_escapes_query() {
    for title in ["", "lofi", "lofi hip hop", "rock & roll", "café ☕", "a=b?c#d"] {
      let request = client().build_request(title).unwrap();
      assert_eq!(query_param(&request, "q").as_deref(), Some(title), "title {:?}", title);
      assert_eq!(request.url().query_pairs().filter(|(k, _)| k == "q").count(), 1);
    }

    let request = client().build_request("rock & roll").unwrap();
    let raw = request.url().query().unwrap();
    assert!(raw.contains("q=rock+%26+roll"), "raw query: {}", raw);
  }

  #[test]
  fn empty_title_still_builds_request() {
    let request = client().build_request("").unwrap();
    assert!(request.url().query().unwrap().contains("q=&"));
  }

  #[test]
  fn invalid_endpoint_rejected() {
    assert!(SearchClient::new(Client::new(), "not a url", "k".into()).is_err());
  }

  // --- parse_search_response ---

  #[test]
  fn parse_single_item() {
    let body = br#"{"items":[{"id":{"kind":"youtube#video","videoId":"abc123"},"snippet":{"title":"Lofi Mix"}}]}"#;
    let results = parse_search_response(body).unwrap();
    assert_eq!(
      results,
      vec![SearchResult {
        id: 0,
        title: "Lofi Mix".into(),
        watch_ref: "https://www.youtube.com/watch?v=abc123".into()
      }]
    );
  }

  #[test]
  fn parse_keeps_item_count_and_order() {
    for n in 0..=5 {
      let items: Vec<String> = (0..n)
        .map(|i| format!(r#"{{"id":{{"videoId":"v{i}"}},"snippet":{{"title":"Video {i}"}}}}"#))
        .collect();
      let body = format!(r#"{{"kind":"youtube#searchListResponse","items":[{}]}}"#, items.join(","));
      let results = parse_search_response(body.as_bytes()).unwrap();
      assert_eq!(results.len(), n);
      for (i, r) in results.iter().enumerate() {
        assert_eq!(r.watch_ref, format!("https://www.youtube.com/watch?v=v{i}"));
        assert_eq!(r.title, format!("Video {i}"));
      }
    }
  }

  #[test]
  fn parse_error_envelope_is_decode_error() {
    let body = br#"{"error":{"code":403,"message":"quota exceeded"}}"#;
    assert!(matches!(parse_search_response(body), Err(SearchError::Decode(_))));
  }

  #[test]
  fn parse_garbage_is_decode_error() {
    assert!(matches!(parse_search_response(b"<html>"), Err(SearchError::Decode(_))));
  }

  // --- search ---

  /// Local endpoint answering every connection with `status` and `body`; yields each request line.
  async fn stub_endpoint(status: &'static str, body: &'static str) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
      while let Ok((mut stream, _)) = listener.accept().await {
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
          match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
          }
        }
        let head = String::from_utf8_lossy(&head);
        let _ = tx.send(head.lines().next().unwrap_or_default().to_string());
        let response = format!(
          "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
          body.len()
        );
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;
      }
    });
    (format!("http://{addr}/youtube/v3/search"), rx)
  }

  #[tokio::test]
  async fn search_unreachable_endpoint_is_transport_error() {
    let client = SearchClient::new(Client::new(), "http://127.0.0.1:9/search", "test-key".into()).unwrap();
    assert!(matches!(client.search("lofi").await, Err(SearchError::Transport(_))));
  }

  #[tokio::test]
  async fn search_error_status_is_decode_error() {
    let (endpoint, mut requests) =
      stub_endpoint("403 Forbidden", r#"{"error":{"code":403,"message":"quota exceeded"}}"#).await;
    let client = SearchClient::new(Client::new(), &endpoint, "test-key".into()).unwrap();

    let outcome = client.search("lofi mix").await;
    assert!(matches!(outcome, Err(SearchError::Decode(_))), "got {outcome:?}");

    let line = requests.recv().await.unwrap();
    assert!(line.starts_with("GET /youtube/v3/search?"), "{line}");
    assert!(line.contains("q=lofi+mix"), "{line}");
    assert!(line.contains("maxResults=5"), "{line}");
    assert!(requests.try_recv().is_err(), "expected exactly one request");
  }

  #[tokio::test]
  async fn search_success_maps_items() {
    let (endpoint, mut requests) = stub_endpoint(
      "200 OK",
      r#"{"items":[{"id":{"videoId":"abc123"},"snippet":{"title":"Lofi Mix"}}]}"#,
    )
    .await;
    let client = SearchClient::new(Client::new(), &endpoint, "test-key".into()).unwrap();

    let results = client.search("lofi").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].watch_ref, "https://www.youtube.com/watch?v=abc123");
    assert_eq!(results[0].title, "Lofi Mix");
    assert!(requests.recv().await.unwrap().contains("q=lofi"));
  }

  // --- watch refs ---

  #[test]
  fn video_id_from_url_and_bare_id() {
    assert_eq!(video_id_from_watch_ref("https://www.youtube.com/watch?v=abc123"), "abc123");
    assert_eq!(video_id_from_watch_ref("abc123"), "abc123");
    assert_eq!(video_id_from_watch_ref(&watch_url("xyz")), "xyz");
  }
}
