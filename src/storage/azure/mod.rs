//! Azure Storage REST clients.
//!
//! One client per service kind (Table, Blob, File, Queue), each holding a
//! long-lived `reqwest::Client` and the credential parsed from the account
//! connection string.
//!
//! Requests are authorized with Shared Key (HMAC-SHA256 over a canonical
//! string-to-sign) when the connection string carries an `AccountKey`, or
//! with a SAS token appended to the query when it carries a
//! `SharedAccessSignature`.  The Table service uses its own, shorter
//! string-to-sign; the other three share the full 12-header form.
//!
//! `UseDevelopmentStorage=true` targets a local Azurite instance with the
//! well-known development account.

pub mod blob;
pub mod file;
pub mod queue;
pub mod table;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use bytes::Bytes;
use hmac::{Hmac, Mac};
use reqwest::{Method, StatusCode, Url};
use sha2::Sha256;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::errors::{StorageError, StorageResult};
use crate::xml::{parse_records, RecordList};

pub use blob::AzureBlobBackend;
pub use file::AzureFileShareBackend;
pub use queue::AzureQueueBackend;
pub use table::AzureTableBackend;

/// Azure REST API version used for all requests.
pub const AZURE_API_VERSION: &str = "2023-11-03";

/// Account name of the local development emulator.
pub const DEV_ACCOUNT: &str = "devstoreaccount1";

/// Well-known, publicly documented key of the local development emulator.
pub const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// Per-request timeout for every storage call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Percent-encoding set for a single path segment or query value: encode
/// everything except unreserved characters.
const SEGMENT_ENCODE_SET: percent_encoding::AsciiSet = percent_encoding::NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Same as [`SEGMENT_ENCODE_SET`] but keeps '/' so blob names with
/// virtual directories stay readable.
const PATH_ENCODE_SET: percent_encoding::AsciiSet = SEGMENT_ENCODE_SET.remove(b'/');

/// The four storage services of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Blob,
    Queue,
    Table,
    File,
}

impl ServiceKind {
    fn subdomain(self) -> &'static str {
        match self {
            ServiceKind::Blob => "blob",
            ServiceKind::Queue => "queue",
            ServiceKind::Table => "table",
            ServiceKind::File => "file",
        }
    }

    /// Lower-cased connection string key of the explicit endpoint.
    fn endpoint_key(self) -> &'static str {
        match self {
            ServiceKind::Blob => "blobendpoint",
            ServiceKind::Queue => "queueendpoint",
            ServiceKind::Table => "tableendpoint",
            ServiceKind::File => "fileendpoint",
        }
    }

    /// Local emulator port.  The emulator has no file service.
    fn dev_port(self) -> Option<u16> {
        match self {
            ServiceKind::Blob => Some(10000),
            ServiceKind::Queue => Some(10001),
            ServiceKind::Table => Some(10002),
            ServiceKind::File => None,
        }
    }
}

/// How requests are authorized.
#[derive(Clone)]
pub enum Credential {
    /// Shared Key authentication using the decoded account key.
    SharedKey { key: Vec<u8> },
    /// SAS token authentication (appended as query string).
    Sas { token: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::SharedKey { .. } => f.write_str("SharedKey(<redacted>)"),
            Credential::Sas { .. } => f.write_str("Sas(<redacted>)"),
        }
    }
}

/// A parsed storage account connection string.
#[derive(Debug, Clone)]
pub struct ConnectionString {
    pub account: String,
    pub credential: Credential,
    protocol: String,
    endpoint_suffix: String,
    development: bool,
    explicit_endpoints: HashMap<ServiceKind, String>,
}

impl ConnectionString {
    /// Parse a `Key=Value;Key=Value` connection string.
    pub fn parse(raw: &str) -> StorageResult<Self> {
        let mut fields: HashMap<String, String> = HashMap::new();
        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                StorageError::Config(format!("malformed connection string segment '{part}'"))
            })?;
            fields.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }

        let development = fields
            .get("usedevelopmentstorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let mut explicit_endpoints = HashMap::new();
        for kind in [
            ServiceKind::Blob,
            ServiceKind::Queue,
            ServiceKind::Table,
            ServiceKind::File,
        ] {
            if let Some(ep) = fields.get(kind.endpoint_key()) {
                explicit_endpoints.insert(kind, ep.trim_end_matches('/').to_string());
            }
        }

        let (account, credential) = if development {
            let key = BASE64_STANDARD
                .decode(DEV_ACCOUNT_KEY)
                .map_err(|e| StorageError::Config(format!("invalid development key: {e}")))?;
            (DEV_ACCOUNT.to_string(), Credential::SharedKey { key })
        } else {
            let account = fields.get("accountname").cloned().unwrap_or_default();
            let credential = if let Some(key) = fields.get("accountkey") {
                if account.is_empty() {
                    return Err(StorageError::Config(
                        "connection string has AccountKey but no AccountName".to_string(),
                    ));
                }
                let key = BASE64_STANDARD.decode(key).map_err(|e| {
                    StorageError::Config(format!("invalid AccountKey (not valid base64): {e}"))
                })?;
                Credential::SharedKey { key }
            } else if let Some(sas) = fields.get("sharedaccesssignature") {
                Credential::Sas {
                    token: sas.trim_start_matches('?').to_string(),
                }
            } else {
                return Err(StorageError::Config(
                    "connection string has neither AccountKey nor SharedAccessSignature"
                        .to_string(),
                ));
            };
            (account, credential)
        };

        Ok(Self {
            account,
            credential,
            protocol: fields
                .get("defaultendpointsprotocol")
                .cloned()
                .unwrap_or_else(|| "https".to_string()),
            endpoint_suffix: fields
                .get("endpointsuffix")
                .cloned()
                .unwrap_or_else(|| "core.windows.net".to_string()),
            development,
            explicit_endpoints,
        })
    }

    /// Base URL of `kind`'s service, without a trailing slash.
    pub fn endpoint(&self, kind: ServiceKind) -> StorageResult<String> {
        if let Some(ep) = self.explicit_endpoints.get(&kind) {
            return Ok(ep.clone());
        }
        if self.development {
            return kind
                .dev_port()
                .map(|port| format!("http://127.0.0.1:{port}/{DEV_ACCOUNT}"))
                .ok_or_else(|| {
                    StorageError::Config(format!(
                        "the development emulator has no {} service; set {}",
                        kind.subdomain(),
                        kind.endpoint_key()
                    ))
                });
        }
        if self.account.is_empty() {
            return Err(StorageError::Config(format!(
                "connection string has no AccountName and no {} endpoint",
                kind.subdomain()
            )));
        }
        Ok(format!(
            "{}://{}.{}.{}",
            self.protocol,
            self.account,
            kind.subdomain(),
            self.endpoint_suffix
        ))
    }
}

/// Percent-encode one path segment (container, share, queue, table, key).
pub(crate) fn encode_segment(segment: &str) -> String {
    percent_encoding::utf8_percent_encode(segment, &SEGMENT_ENCODE_SET).to_string()
}

/// Percent-encode an object path, keeping '/' separators.
pub(crate) fn encode_path(path: &str) -> String {
    percent_encoding::utf8_percent_encode(path, &PATH_ENCODE_SET).to_string()
}

/// Get the current UTC date in RFC 1123 format for Azure headers.
fn rfc1123_date() -> String {
    httpdate::fmt_http_date(std::time::SystemTime::now())
}

/// A request before signing.
pub(crate) struct AzureRequest {
    method: Method,
    /// Already percent-encoded path, starting with '/'.
    path: String,
    /// Raw (unencoded) query parameters.
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    content_type: Option<&'static str>,
    body: Bytes,
}

impl AzureRequest {
    pub(crate) fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            content_type: None,
            body: Bytes::new(),
        }
    }

    pub(crate) fn query(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query.push((name.to_string(), value.into()));
        self
    }

    pub(crate) fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub(crate) fn body(mut self, content_type: &'static str, body: impl Into<Bytes>) -> Self {
        self.content_type = Some(content_type);
        self.body = body.into();
        self
    }
}

/// Authenticated HTTP access to one storage service.
pub(crate) struct RestClient {
    http: reqwest::Client,
    /// Service base URL, e.g. `https://acct.queue.core.windows.net`.
    endpoint: String,
    account: String,
    credential: Credential,
    kind: ServiceKind,
}

impl RestClient {
    pub(crate) fn new(conn: &ConnectionString, kind: ServiceKind) -> StorageResult<Self> {
        let endpoint = conn.endpoint(kind)?;
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        debug!("Azure {} client targeting {}", kind.subdomain(), endpoint);
        Ok(Self {
            http,
            endpoint,
            account: conn.account.clone(),
            credential: conn.credential.clone(),
            kind,
        })
    }

    /// Absolute URL of `path` that another request can reference as a
    /// copy or rename source.  Carries the SAS token when one is in use.
    pub(crate) fn source_url(&self, path: &str) -> String {
        let url = format!("{}{}", self.endpoint, path);
        match &self.credential {
            Credential::Sas { token } => format!("{url}?{token}"),
            Credential::SharedKey { .. } => url,
        }
    }

    fn build_url(&self, path: &str, query: &[(String, String)]) -> StorageResult<Url> {
        let mut url = format!("{}{}", self.endpoint, path);
        let mut pairs: Vec<String> = query
            .iter()
            .map(|(k, v)| format!("{}={}", encode_segment(k), encode_segment(v)))
            .collect();
        if let Credential::Sas { token } = &self.credential {
            pairs.push(token.clone());
        }
        if !pairs.is_empty() {
            url.push('?');
            url.push_str(&pairs.join("&"));
        }
        Url::parse(&url).map_err(|e| StorageError::Config(format!("invalid URL '{url}': {e}")))
    }

    /// Sign and send `req`, returning the raw response whatever its status.
    pub(crate) async fn send(&self, req: AzureRequest) -> StorageResult<reqwest::Response> {
        let url = self.build_url(&req.path, &req.query)?;

        let mut headers = vec![
            ("x-ms-date".to_string(), rfc1123_date()),
            ("x-ms-version".to_string(), AZURE_API_VERSION.to_string()),
        ];
        headers.extend(req.headers);
        if let Some(content_type) = req.content_type {
            headers.push(("Content-Type".to_string(), content_type.to_string()));
        }

        if let Credential::SharedKey { key } = &self.credential {
            let string_to_sign = match self.kind {
                ServiceKind::Table => table_string_to_sign(
                    &req.method,
                    &headers,
                    &canonicalized_resource_table(&self.account, url.path(), &req.query),
                ),
                _ => shared_key_string_to_sign(
                    &req.method,
                    &headers,
                    req.body.len(),
                    &canonicalized_resource(&self.account, url.path(), &req.query),
                ),
            };
            let signature = sign(key, &string_to_sign)?;
            headers.push((
                "Authorization".to_string(),
                format!("SharedKey {}:{}", self.account, signature),
            ));
        }

        debug!("Azure {} {} {}", self.kind.subdomain(), req.method, url.path());

        let mut builder = self.http.request(req.method, url);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        Ok(builder.body(req.body).send().await?)
    }
}

/// Turn a non-success response into a [`StorageError`]; 404 becomes
/// `NotFound { resource }`.
pub(crate) async fn check_status(
    resp: reqwest::Response,
    operation: &'static str,
    resource: &str,
) -> StorageResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(StorageError::not_found(resource));
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StorageError::Remote {
        operation,
        status: status.as_u16(),
        body,
    })
}

/// Accept "already exists" (409) as success for create-if-absent calls.
pub(crate) fn ignore_conflict(result: StorageResult<reqwest::Response>) -> StorageResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.status() == Some(409) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Read an XML response body and flatten its `record_tags` elements.
pub(crate) async fn read_records(
    resp: reqwest::Response,
    operation: &'static str,
    record_tags: &[&str],
) -> StorageResult<RecordList> {
    let body = resp.bytes().await?;
    parse_records(&body, record_tags)
        .map_err(|e| anyhow::anyhow!("{operation}: malformed XML response: {e}").into())
}

/// Read a response header as a string.
pub(crate) fn header_str<'a>(resp: &'a reqwest::Response, name: &str) -> Option<&'a str> {
    resp.headers().get(name).and_then(|v| v.to_str().ok())
}

// -- Shared Key signing -------------------------------------------------------

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> &'a str {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
        .unwrap_or("")
}

/// `x-ms-*` headers, lower-cased, sorted, one `name:value` per line.
fn canonicalized_headers(headers: &[(String, String)]) -> String {
    let mut ms_headers: Vec<(String, &str)> = headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim()))
        .filter(|(k, _)| k.starts_with("x-ms-"))
        .collect();
    ms_headers.sort_by(|a, b| a.0.cmp(&b.0));
    ms_headers
        .iter()
        .map(|(k, v)| format!("{k}:{v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `/{account}{path}` followed by one `\nname:value` line per query
/// parameter, names lower-cased and sorted, repeated values comma-joined.
fn canonicalized_resource(account: &str, path: &str, query: &[(String, String)]) -> String {
    let mut resource = format!("/{account}{path}");
    let mut params: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for (k, v) in query {
        params.entry(k.to_ascii_lowercase()).or_default().push(v);
    }
    for (name, mut values) in params {
        values.sort_unstable();
        resource.push_str(&format!("\n{}:{}", name, values.join(",")));
    }
    resource
}

/// Table service variant: only the `comp` parameter is part of the resource.
fn canonicalized_resource_table(account: &str, path: &str, query: &[(String, String)]) -> String {
    let mut resource = format!("/{account}{path}");
    if let Some((_, comp)) = query.iter().find(|(k, _)| k.eq_ignore_ascii_case("comp")) {
        resource.push_str(&format!("?comp={comp}"));
    }
    resource
}

/// String-to-sign for the Blob, Queue and File services:
///
/// ```text
/// VERB\nContent-Encoding\nContent-Language\nContent-Length\nContent-MD5\n
/// Content-Type\nDate\nIf-Modified-Since\nIf-Match\nIf-None-Match\n
/// If-Unmodified-Since\nRange\nCanonicalizedHeaders\nCanonicalizedResource
/// ```
///
/// `Date` stays empty because `x-ms-date` is always sent.
fn shared_key_string_to_sign(
    method: &Method,
    headers: &[(String, String)],
    content_length: usize,
    canonical_resource: &str,
) -> String {
    // Content-Length: empty for 0 (API versions 2015-02-21 and later).
    let content_length = match content_length {
        0 => String::new(),
        len => len.to_string(),
    };
    let fields = [
        method.as_str(),
        find_header(headers, "Content-Encoding"),
        find_header(headers, "Content-Language"),
        &content_length,
        find_header(headers, "Content-MD5"),
        find_header(headers, "Content-Type"),
        "",
        find_header(headers, "If-Modified-Since"),
        find_header(headers, "If-Match"),
        find_header(headers, "If-None-Match"),
        find_header(headers, "If-Unmodified-Since"),
        find_header(headers, "Range"),
    ];
    format!(
        "{}\n{}\n{}",
        fields.join("\n"),
        canonicalized_headers(headers),
        canonical_resource
    )
}

/// String-to-sign for the Table service:
/// `VERB\nContent-MD5\nContent-Type\nDate\nCanonicalizedResource`.
fn table_string_to_sign(
    method: &Method,
    headers: &[(String, String)],
    canonical_resource: &str,
) -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}",
        method.as_str(),
        find_header(headers, "Content-MD5"),
        find_header(headers, "Content-Type"),
        find_header(headers, "x-ms-date"),
        canonical_resource
    )
}

/// HMAC-SHA256 `string_to_sign` with `key`, base64-encoded.
fn sign(key: &[u8], string_to_sign: &str) -> StorageResult<String> {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| anyhow::anyhow!("HMAC key error: {}", e))?;
    mac.update(string_to_sign.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT_CS: &str = "DefaultEndpointsProtocol=https;AccountName=abcretail;\
        AccountKey=a2V5LWJ5dGVz;EndpointSuffix=core.windows.net";

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_account_key_connection_string() {
        let cs = ConnectionString::parse(ACCOUNT_CS).unwrap();
        assert_eq!(cs.account, "abcretail");
        match &cs.credential {
            Credential::SharedKey { key } => assert_eq!(key, b"key-bytes"),
            other => panic!("unexpected credential {other:?}"),
        }
        assert_eq!(
            cs.endpoint(ServiceKind::Blob).unwrap(),
            "https://abcretail.blob.core.windows.net"
        );
        assert_eq!(
            cs.endpoint(ServiceKind::File).unwrap(),
            "https://abcretail.file.core.windows.net"
        );
    }

    #[test]
    fn test_parse_keys_are_case_insensitive() {
        let cs = ConnectionString::parse("accountname=a;ACCOUNTKEY=a2V5").unwrap();
        assert_eq!(cs.account, "a");
        assert_eq!(
            cs.endpoint(ServiceKind::Queue).unwrap(),
            "https://a.queue.core.windows.net"
        );
    }

    #[test]
    fn test_parse_development_storage() {
        let cs = ConnectionString::parse("UseDevelopmentStorage=true").unwrap();
        assert_eq!(cs.account, DEV_ACCOUNT);
        assert_eq!(
            cs.endpoint(ServiceKind::Blob).unwrap(),
            "http://127.0.0.1:10000/devstoreaccount1"
        );
        assert_eq!(
            cs.endpoint(ServiceKind::Queue).unwrap(),
            "http://127.0.0.1:10001/devstoreaccount1"
        );
        assert_eq!(
            cs.endpoint(ServiceKind::Table).unwrap(),
            "http://127.0.0.1:10002/devstoreaccount1"
        );
        assert!(cs.endpoint(ServiceKind::File).is_err());
    }

    #[test]
    fn test_explicit_endpoint_wins() {
        let cs = ConnectionString::parse(
            "UseDevelopmentStorage=true;FileEndpoint=http://files.local:8080/acct/",
        )
        .unwrap();
        assert_eq!(
            cs.endpoint(ServiceKind::File).unwrap(),
            "http://files.local:8080/acct"
        );
    }

    #[test]
    fn test_parse_sas_strips_question_mark() {
        let cs = ConnectionString::parse(
            "BlobEndpoint=https://x.blob.core.windows.net;SharedAccessSignature=?sv=2022&sig=abc",
        )
        .unwrap();
        match &cs.credential {
            Credential::Sas { token } => assert_eq!(token, "sv=2022&sig=abc"),
            other => panic!("unexpected credential {other:?}"),
        }
        assert!(cs.endpoint(ServiceKind::Table).is_err());
    }

    #[test]
    fn test_parse_rejects_missing_credentials() {
        assert!(ConnectionString::parse("AccountName=a").is_err());
        assert!(ConnectionString::parse("AccountKey=a2V5").is_err());
        assert!(ConnectionString::parse("AccountName=a;AccountKey=!!!").is_err());
        assert!(ConnectionString::parse("garbage").is_err());
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let cs = ConnectionString::parse(ACCOUNT_CS).unwrap();
        let rendered = format!("{cs:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("a2V5LWJ5dGVz"));
    }

    #[test]
    fn test_encode_segment_and_path() {
        assert_eq!(encode_segment("a b/c'd"), "a%20b%2Fc%27d");
        assert_eq!(encode_path("dir/my photo.png"), "dir/my%20photo.png");
        assert_eq!(encode_segment("plain-name_1.txt"), "plain-name_1.txt");
    }

    #[test]
    fn test_canonicalized_headers_sorted_and_filtered() {
        let h = headers(&[
            ("x-ms-version", AZURE_API_VERSION),
            ("Content-Type", "text/plain"),
            ("X-MS-Date", "Mon, 01 Jan 2024 00:00:00 GMT"),
            ("x-ms-blob-type", " BlockBlob "),
        ]);
        assert_eq!(
            canonicalized_headers(&h),
            "x-ms-blob-type:BlockBlob\nx-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\nx-ms-version:2023-11-03"
        );
    }

    #[test]
    fn test_canonicalized_resource_query_ordering() {
        let q = headers(&[("restype", "container"), ("comp", "list"), ("Marker", "m2")]);
        assert_eq!(
            canonicalized_resource("acct", "/images", &q),
            "/acct/images\ncomp:list\nmarker:m2\nrestype:container"
        );
    }

    #[test]
    fn test_canonicalized_resource_table_keeps_only_comp() {
        let q = headers(&[("$filter", "PartitionKey eq 'Customer'")]);
        assert_eq!(
            canonicalized_resource_table("acct", "/CustomerProfiles()", &q),
            "/acct/CustomerProfiles()"
        );
        let q = headers(&[("comp", "acl")]);
        assert_eq!(
            canonicalized_resource_table("acct", "/t", &q),
            "/acct/t?comp=acl"
        );
    }

    #[test]
    fn test_shared_key_string_to_sign_layout() {
        let h = headers(&[
            ("x-ms-date", "Mon, 01 Jan 2024 00:00:00 GMT"),
            ("x-ms-version", AZURE_API_VERSION),
            ("Content-Type", "application/octet-stream"),
        ]);
        let s = shared_key_string_to_sign(&Method::PUT, &h, 5, "/acct/c/b");
        assert_eq!(
            s,
            "PUT\n\n\n5\n\napplication/octet-stream\n\n\n\n\n\n\n\
             x-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\nx-ms-version:2023-11-03\n/acct/c/b"
        );
    }

    #[test]
    fn test_shared_key_zero_length_is_empty() {
        let h = headers(&[("x-ms-date", "d"), ("x-ms-version", "v")]);
        let s = shared_key_string_to_sign(&Method::DELETE, &h, 0, "/acct/q");
        assert!(s.starts_with("DELETE\n\n\n\n"));
    }

    #[test]
    fn test_table_string_to_sign_layout() {
        let h = headers(&[
            ("x-ms-date", "Mon, 01 Jan 2024 00:00:00 GMT"),
            ("Content-Type", "application/json"),
        ]);
        let s = table_string_to_sign(&Method::POST, &h, "/acct/Tables");
        assert_eq!(
            s,
            "POST\n\napplication/json\nMon, 01 Jan 2024 00:00:00 GMT\n/acct/Tables"
        );
    }

    #[test]
    fn test_sign_known_vector() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        let sig = sign(b"key", "The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(sig, "97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg=");
    }

    #[test]
    fn test_rfc1123_date_format() {
        let date = rfc1123_date();
        assert!(date.ends_with(" GMT"));
        assert_eq!(date.len(), 29);
    }

    #[test]
    fn test_source_url_appends_sas() {
        let cs = ConnectionString::parse(
            "QueueEndpoint=https://x.queue.core.windows.net;\
             FileEndpoint=https://x.file.core.windows.net;SharedAccessSignature=sig=1",
        )
        .unwrap();
        let client = RestClient::new(&cs, ServiceKind::File).unwrap();
        assert_eq!(
            client.source_url("/share/a.pdf"),
            "https://x.file.core.windows.net/share/a.pdf?sig=1"
        );
    }

    #[test]
    fn test_build_url_encodes_query() {
        let cs = ConnectionString::parse(ACCOUNT_CS).unwrap();
        let client = RestClient::new(&cs, ServiceKind::Table).unwrap();
        let url = client
            .build_url(
                "/CustomerProfiles()",
                &headers(&[("$filter", "PartitionKey eq 'Customer'")]),
            )
            .unwrap();
        assert_eq!(url.path(), "/CustomerProfiles()");
        assert_eq!(
            url.query(),
            Some("%24filter=PartitionKey%20eq%20%27Customer%27")
        );
    }
}
