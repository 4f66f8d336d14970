use super::{BulkReport, ClientError, Page, Result, SearchDestination, SearchSource};
use crate::config::types::ClusterConfig;
use crate::document::{Document, FieldMode};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Map, Value};
use std::time::Duration;

/// HTTP client for an Elasticsearch-compatible cluster
#[derive(Debug)]
pub struct ElasticClient {
    base_url: String,
    credentials: Option<(String, String)>,
    keep_alive: String,
    client: reqwest::Client,
}

impl ElasticClient {
    pub fn new(config: &ClusterConfig, keep_alive: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .gzip(config.http_compress)
            .build()?;

        let credentials = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        };

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            credentials,
            keep_alive: format_keep_alive(keep_alive),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.client.request(method, url);
        match &self.credentials {
            Some((user, pass)) => builder.basic_auth(user, Some(pass)),
            None => builder,
        }
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self.request(Method::HEAD, index).send().await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(ClientError::Cluster {
                status: status.as_u16(),
                message: format!("unexpected status checking index '{}'", index),
            }),
        }
    }
}

async fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    Err(ClientError::Cluster {
        status: response.status().as_u16(),
        message: response.text().await.unwrap_or_default(),
    })
}

#[async_trait]
impl SearchSource for ElasticClient {
    async fn get_mapping(&self, index: &str) -> Result<Value> {
        let response = self
            .request(Method::GET, &format!("{}/_mapping", index))
            .send()
            .await?;
        let mapping = check_status(response).await?.json().await?;
        Ok(mapping)
    }

    async fn open_scroll(
        &self,
        index: &str,
        query: &Value,
        page_size: usize,
        mode: FieldMode,
    ) -> Result<Page> {
        let path = format!(
            "{}/_search?scroll={}&size={}",
            index, self.keep_alive, page_size
        );
        let response = self.request(Method::POST, &path).json(query).send().await?;
        let body: Value = check_status(response).await?.json().await?;
        parse_page(&body, mode)
    }

    async fn next_page(&self, scroll_id: &str, mode: FieldMode) -> Result<Page> {
        let request_body = json!({
            "scroll": self.keep_alive,
            "scroll_id": scroll_id,
        });
        let response = self
            .request(Method::POST, "_search/scroll")
            .json(&request_body)
            .send()
            .await?;
        let body: Value = check_status(response).await?.json().await?;
        parse_page(&body, mode)
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, "_search/scroll")
            .json(&json!({ "scroll_id": scroll_id }))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl SearchDestination for ElasticClient {
    async fn create_index(&self, index: &str, mapping: &Value) -> Result<()> {
        if self.index_exists(index).await? {
            return Err(ClientError::IndexExists(index.to_string()));
        }

        let response = self
            .request(Method::PUT, index)
            .json(&create_index_body(mapping))
            .send()
            .await?;

        if response.status() == StatusCode::BAD_REQUEST {
            let message = response.text().await.unwrap_or_default();
            if message.contains("resource_already_exists_exception") {
                return Err(ClientError::IndexExists(index.to_string()));
            }
            return Err(ClientError::Cluster {
                status: StatusCode::BAD_REQUEST.as_u16(),
                message,
            });
        }

        check_status(response).await?;
        Ok(())
    }

    async fn bulk_index(&self, index: &str, documents: &[Document]) -> Result<BulkReport> {
        if documents.is_empty() {
            return Ok(BulkReport::default());
        }

        let body = bulk_body(index, documents)?;
        let response = self
            .request(Method::POST, "_bulk")
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await?;
        let body: Value = check_status(response).await?.json().await?;
        parse_bulk_response(&body, documents.len())
    }
}

/// Elasticsearch time unit string for a scroll keep-alive
fn format_keep_alive(d: Duration) -> String {
    if d.subsec_millis() == 0 && d.as_secs() > 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis().max(1))
    }
}

/// Convert a search/scroll response body into a page of documents
fn parse_page(body: &Value, mode: FieldMode) -> Result<Page> {
    let scroll_id = body
        .get("_scroll_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ClientError::MalformedResponse("missing _scroll_id".to_string()))?;

    let hits = body
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(Value::as_array)
        .ok_or_else(|| ClientError::MalformedResponse("missing hits.hits".to_string()))?;

    let documents = hits
        .iter()
        .map(|hit| parse_hit(hit, mode))
        .collect::<Result<Vec<_>>>()?;

    Ok(Page {
        scroll_id: Some(scroll_id),
        documents,
    })
}

fn parse_hit(hit: &Value, mode: FieldMode) -> Result<Document> {
    let hit = hit
        .as_object()
        .ok_or_else(|| ClientError::MalformedResponse("hit is not an object".to_string()))?;

    let id = hit
        .get("_id")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::MalformedResponse("hit without _id".to_string()))?;

    // _source may be disabled on the index
    let fields = hit
        .get("_source")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let meta = match mode {
        FieldMode::Source => None,
        FieldMode::Raw => Some(
            hit.iter()
                .filter(|(k, _)| k.as_str() != "_source" && k.as_str() != "_id")
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<_, _>>(),
        ),
    };

    Ok(Document {
        id: id.to_string(),
        fields,
        meta,
    })
}

/// Body for `PUT /<index>` from a stored mapping descriptor.
///
/// Accepts the verbatim `GET /<index>/_mapping` envelope, a bare
/// `{"mappings": ...}` object, or bare mapping properties.
fn create_index_body(mapping: &Value) -> Value {
    if let Some(obj) = mapping.as_object() {
        if let Some(mappings) = obj.get("mappings") {
            return json!({ "mappings": mappings });
        }

        if obj.len() == 1 {
            if let Some(mappings) = obj.values().next().and_then(|inner| inner.get("mappings")) {
                return json!({ "mappings": mappings });
            }
        }
    }

    json!({ "mappings": mapping })
}

/// NDJSON body for `POST /_bulk`
fn bulk_body(index: &str, documents: &[Document]) -> Result<String> {
    let mut body = String::new();

    for doc in documents {
        let mut action = Map::new();
        action.insert("_index".to_string(), json!(index));
        action.insert("_id".to_string(), json!(doc.id));
        if let Some(routing) = doc.routing() {
            action.insert("routing".to_string(), json!(routing));
        }

        body.push_str(&serde_json::to_string(&json!({ "index": action }))?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&doc.fields)?);
        body.push('\n');
    }

    Ok(body)
}

/// Tally a `_bulk` response; `expected` is the number of documents sent
fn parse_bulk_response(body: &Value, expected: usize) -> Result<BulkReport> {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| ClientError::MalformedResponse("bulk response without items".to_string()))?;

    if items.len() != expected {
        return Err(ClientError::MalformedResponse(format!(
            "bulk response has {} items for {} documents",
            items.len(),
            expected
        )));
    }

    let mut report = BulkReport::default();

    for item in items {
        let outcome = item
            .as_object()
            .and_then(|o| o.values().next())
            .ok_or_else(|| ClientError::MalformedResponse("empty bulk item".to_string()))?;

        let status = outcome.get("status").and_then(Value::as_u64).unwrap_or(0);
        let error = outcome.get("error");

        if error.is_none() && (200..300).contains(&status) {
            report.succeeded += 1;
        } else {
            report.failed += 1;
            if report.first_error.is_none() {
                report.first_error = Some(match error {
                    Some(e) => e
                        .get("reason")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| e.to_string()),
                    None => format!("status {}", status),
                });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ClusterConfig {
        ClusterConfig {
            url: "http://localhost:9200/".to_string(),
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
            http_compress: true,
        }
    }

    #[test]
    fn test_client_trims_base_url() {
        let client = ElasticClient::new(&test_config(), Duration::from_secs(300)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9200");
        assert_eq!(client.keep_alive, "300s");
    }

    #[test]
    fn test_format_keep_alive() {
        assert_eq!(format_keep_alive(Duration::from_secs(60)), "60s");
        assert_eq!(format_keep_alive(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_keep_alive(Duration::ZERO), "1ms");
    }

    #[test]
    fn test_parse_page_source_mode() {
        let body = json!({
            "_scroll_id": "abc",
            "hits": {
                "total": {"value": 2},
                "hits": [
                    {"_index": "books", "_id": "1", "_score": 1.0, "_source": {"title": "Dune"}},
                    {"_index": "books", "_id": "2", "_score": 1.0, "_source": {"title": "Emma"}}
                ]
            }
        });

        let page = parse_page(&body, FieldMode::Source).unwrap();
        assert_eq!(page.scroll_id.as_deref(), Some("abc"));
        assert_eq!(page.documents.len(), 2);
        assert_eq!(page.documents[0].id, "1");
        assert_eq!(page.documents[0].fields["title"], json!("Dune"));
        assert!(page.documents[0].meta.is_none());
    }

    #[test]
    fn test_parse_page_raw_mode_keeps_metadata() {
        let body = json!({
            "_scroll_id": "abc",
            "hits": {"hits": [
                {"_index": "books", "_id": "1", "_routing": "r1", "_source": {"title": "Dune"}}
            ]}
        });

        let page = parse_page(&body, FieldMode::Raw).unwrap();
        let doc = &page.documents[0];
        let meta = doc.meta.as_ref().unwrap();
        assert_eq!(meta["_index"], json!("books"));
        assert!(!meta.contains_key("_source"));
        assert!(!meta.contains_key("_id"));
        assert_eq!(doc.routing(), Some("r1"));
    }

    #[test]
    fn test_parse_page_rejects_missing_hits() {
        let body = json!({"_scroll_id": "abc"});
        assert!(matches!(
            parse_page(&body, FieldMode::Source),
            Err(ClientError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_page_requires_scroll_id() {
        let body = json!({
            "hits": {"hits": [{"_id": "1", "_source": {"title": "Dune"}}]}
        });
        match parse_page(&body, FieldMode::Source) {
            Err(ClientError::MalformedResponse(msg)) => assert!(msg.contains("_scroll_id")),
            other => panic!("expected malformed response, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_hit_without_source() {
        let hit = json!({"_id": "9"});
        let doc = parse_hit(&hit, FieldMode::Source).unwrap();
        assert_eq!(doc.id, "9");
        assert!(doc.fields.is_empty());
    }

    #[test]
    fn test_create_index_body_unwraps_mapping_envelope() {
        let stored = json!({
            "books": {"mappings": {"properties": {"title": {"type": "text"}}}}
        });
        assert_eq!(
            create_index_body(&stored),
            json!({"mappings": {"properties": {"title": {"type": "text"}}}})
        );

        let bare = json!({"properties": {"title": {"type": "text"}}});
        assert_eq!(create_index_body(&bare), json!({"mappings": bare}));

        let already = json!({"mappings": {"dynamic": false}});
        assert_eq!(create_index_body(&already), already);
    }

    #[test]
    fn test_bulk_body_is_ndjson() {
        let mut fields = Map::new();
        fields.insert("title".to_string(), json!("Dune"));
        let mut routed = Document::new("2", Map::new());
        routed.meta = Some(
            [("_routing".to_string(), json!("r"))]
                .into_iter()
                .collect(),
        );
        let docs = vec![Document::new("1", fields), routed];

        let body = bulk_body("library", &docs).unwrap();
        let lines: Vec<Value> = body
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert!(body.ends_with('\n'));
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], json!({"index": {"_index": "library", "_id": "1"}}));
        assert_eq!(lines[1], json!({"title": "Dune"}));
        assert_eq!(
            lines[2],
            json!({"index": {"_index": "library", "_id": "2", "routing": "r"}})
        );
    }

    #[test]
    fn test_parse_bulk_response_counts_failures() {
        let body = json!({
            "errors": true,
            "items": [
                {"index": {"_id": "1", "status": 201}},
                {"index": {"_id": "2", "status": 400, "error": {"type": "mapper_parsing_exception", "reason": "bad field"}}},
                {"index": {"_id": "3", "status": 200}}
            ]
        });

        let report = parse_bulk_response(&body, 3).unwrap();
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.first_error.as_deref(), Some("bad field"));
        assert!(!report.is_success());
    }

    #[test]
    fn test_parse_bulk_response_rejects_missing_items() {
        let body = json!({
            "errors": false,
            "items": [
                {"index": {"_id": "1", "status": 201}},
                {"index": {"_id": "2", "status": 201}}
            ]
        });

        assert!(matches!(
            parse_bulk_response(&body, 3),
            Err(ClientError::MalformedResponse(_))
        ));
        assert_eq!(parse_bulk_response(&body, 2).unwrap().succeeded, 2);
    }
}
