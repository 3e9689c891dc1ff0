use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header, Client, Method, Response};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::sigv4::{self, Signer, SigningRequest, EMPTY_PAYLOAD_SHA256};
use super::{ObjectStore, StoreError};
use crate::config::Config;

static KEY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<Key>([^<]*)</Key>").expect("valid key regex"));

static TRUNCATED_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<IsTruncated>\s*true\s*</IsTruncated>").expect("valid truncation regex")
});

static TOKEN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<NextContinuationToken>([^<]*)</NextContinuationToken>")
        .expect("valid continuation token regex")
});

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_ERROR_BODY_CHARS: usize = 300;

/// S3 (or S3-compatible) store using path-style URLs and SigV4 header auth.
pub struct S3Store {
    client: Client,
    endpoint: Url,
    host: String,
    signer: Signer,
}

impl S3Store {
    pub fn new(
        endpoint: &str,
        region: &str,
        access_key_id: &str,
        secret_access_key: &str,
    ) -> Result<Self, StoreError> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| StoreError::Endpoint(format!("{endpoint}: {e}")))?;
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(StoreError::Endpoint(format!("{endpoint} has no host"))),
        };

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            endpoint,
            host,
            signer: Signer::new(access_key_id, secret_access_key, region, "s3"),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        Self::new(
            &config.s3_endpoint,
            &config.s3_region,
            &config.s3_access_key_id,
            &config.s3_secret_access_key,
        )
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &str,
        payload_sha256: &str,
        extra_headers: &[(&str, &str)],
        body: Option<Vec<u8>>,
    ) -> Result<Response, StoreError> {
        let now = Utc::now();
        let amz_date = sigv4::amz_date(now);

        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), self.host.clone());
        headers.insert("x-amz-content-sha256".to_string(), payload_sha256.to_string());
        headers.insert("x-amz-date".to_string(), amz_date.clone());
        for (name, value) in extra_headers {
            headers.insert(name.to_ascii_lowercase(), value.to_string());
        }

        let authorization = self.signer.authorization(
            &SigningRequest {
                method: method.as_str(),
                path,
                query,
                headers: &headers,
                payload_sha256,
            },
            now,
        );

        let mut url = self.endpoint.clone();
        url.set_path(path);
        url.set_query((!query.is_empty()).then_some(query));

        let mut request = self
            .client
            .request(method, url)
            .header("x-amz-date", amz_date)
            .header("x-amz-content-sha256", payload_sha256)
            .header(header::AUTHORIZATION, authorization);
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            let body: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
            warn!(target: "s3_store", status = status, "S3 request failed");
            return Err(StoreError::Status { status, body });
        }

        Ok(response)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_keys(&self, bucket: &str) -> Result<HashSet<String>, StoreError> {
        let path = sigv4::encode_path(&format!("/{bucket}"));
        let mut keys = HashSet::new();
        let mut token: Option<String> = None;

        loop {
            let mut params = vec![("list-type", "2")];
            if let Some(token) = token.as_deref() {
                params.push(("continuation-token", token));
            }
            let query = sigv4::encode_query(&params);

            let response = self
                .send(Method::GET, &path, &query, EMPTY_PAYLOAD_SHA256, &[], None)
                .await?;
            let page = parse_list_page(&response.text().await?);
            debug!(target: "s3_store", bucket = bucket, count = page.keys.len(), "Listed object page");

            keys.extend(page.keys);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        info!(target: "s3_store", bucket = bucket, count = keys.len(), "Listed bucket");
        Ok(keys)
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| StoreError::Read {
                path: path.display().to_string(),
                source,
            })?;
        let payload_sha256 = sigv4::sha256_hex(&bytes);
        let object_path = sigv4::encode_path(&format!("/{bucket}/{key}"));

        info!(target: "s3_store", bucket = bucket, key = key, size = bytes.len(), "Uploading object");
        self.send(
            Method::PUT,
            &object_path,
            "",
            &payload_sha256,
            &[("content-type", content_type)],
            Some(bytes),
        )
        .await?;
        Ok(())
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.as_str().trim_end_matches('/'),
            bucket,
            key
        )
    }
}

/// One page of a ListObjectsV2 response.
#[derive(Debug, Default, PartialEq, Eq)]
struct ListPage {
    keys: Vec<String>,
    /// Present only when the listing is truncated.
    next_token: Option<String>,
}

fn parse_list_page(xml: &str) -> ListPage {
    let keys = KEY_REGEX
        .captures_iter(xml)
        .map(|caps| unescape_xml(&caps[1]))
        .collect();

    let next_token = if TRUNCATED_REGEX.is_match(xml) {
        TOKEN_REGEX.captures(xml).map(|caps| unescape_xml(&caps[1]))
    } else {
        None
    };

    ListPage { keys, next_token }
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRUNCATED_PAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>menus</Name>
  <KeyCount>2</KeyCount>
  <MaxKeys>2</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>1ueGcxLPRx1Tr/XYExHnhbYLgveDs2J/wm36Hy4vbOwM=</NextContinuationToken>
  <Contents><Key>2024-03-14.pdf</Key><Size>10</Size></Contents>
  <Contents><Key>2024-03-15.pdf</Key><Size>12</Size></Contents>
</ListBucketResult>"#;

    const LAST_PAGE: &str = r#"<ListBucketResult>
  <IsTruncated>false</IsTruncated>
  <Contents><Key>notes &amp; misc.txt</Key></Contents>
</ListBucketResult>"#;

    #[test]
    fn parses_truncated_page() {
        let page = parse_list_page(TRUNCATED_PAGE);
        assert_eq!(page.keys, vec!["2024-03-14.pdf", "2024-03-15.pdf"]);
        assert_eq!(
            page.next_token.as_deref(),
            Some("1ueGcxLPRx1Tr/XYExHnhbYLgveDs2J/wm36Hy4vbOwM=")
        );
    }

    #[test]
    fn parses_last_page_and_unescapes_keys() {
        let page = parse_list_page(LAST_PAGE);
        assert_eq!(page.keys, vec!["notes & misc.txt"]);
        assert_eq!(page.next_token, None);
    }

    #[test]
    fn empty_bucket_has_no_keys() {
        let page = parse_list_page("<ListBucketResult><IsTruncated>false</IsTruncated></ListBucketResult>");
        assert_eq!(page, ListPage::default());
    }

    #[test]
    fn builds_public_object_urls() {
        let store = S3Store::new("https://s3.amazonaws.com", "us-east-1", "id", "secret").unwrap();
        assert_eq!(store.host, "s3.amazonaws.com");
        assert_eq!(
            store.object_url("ramenshop", "2024-03-15.pdf"),
            "https://s3.amazonaws.com/ramenshop/2024-03-15.pdf"
        );

        let local = S3Store::new("http://localhost:9000/", "us-east-1", "id", "secret").unwrap();
        assert_eq!(local.host, "localhost:9000");
        assert_eq!(
            local.object_url("menus", "a.pdf"),
            "http://localhost:9000/menus/a.pdf"
        );
    }

    #[test]
    fn rejects_endpoints_without_host() {
        assert!(matches!(
            S3Store::new("not a url", "us-east-1", "id", "secret"),
            Err(StoreError::Endpoint(_))
        ));
        assert!(matches!(
            S3Store::new("data:text/plain,hi", "us-east-1", "id", "secret"),
            Err(StoreError::Endpoint(_))
        ));
    }
}
