//! Request conversion.
//!
//! # Responsibilities
//! - Turn an axum request into a [`RequestContext`]
//! - Derive server data (method, URI, protocol, client address, headers)
//! - Parse query string, urlencoded and multipart bodies, cookies
//! - Store uploaded files and present them in the flattened layout
//! - Resume or start the session named by the session cookie
//!
//! # Design Decisions
//! - Total body size is enforced by the tower-http limit layer; exceeding it
//!   surfaces here as a 413, per-file size as an upload error code
//! - Keys ending in `[]` collect every value into an array
//! - Upload write failures are reported per file through its error code,
//!   never as a request failure

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{ConnectInfo, FromRequest, Multipart};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request, StatusCode};
use http_body_util::LengthLimitError;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::config::ServerConfig;
use crate::context::files::{
    UPLOAD_ERR_CANT_WRITE, UPLOAD_ERR_NO_FILE, UPLOAD_ERR_OK, UPLOAD_ERR_SIZE,
};
use crate::context::{FileField, RawUpload, RequestContext, SessionStore};

/// Suffix marking a multi-valued form key.
const ARRAY_SUFFIX: &str = "[]";

/// Prefix of stored upload file names.
const UPLOAD_PREFIX: &str = "fasty-upload-";

/// Failure while reading an HTTP request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("failed to read request body: {0}")]
    Body(#[from] axum::Error),

    #[error("invalid multipart request: {0}")]
    MultipartRejected(#[from] MultipartRejection),

    #[error("malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),
}

impl RequestError {
    /// Status to answer a rejected request with: 413 when the body limit
    /// was hit, 400 otherwise.
    pub fn status(&self) -> StatusCode {
        let too_large = match self {
            RequestError::Body(e) => exceeds_body_limit(e),
            RequestError::MultipartRejected(_) => false,
            RequestError::Multipart(e) => e.status() == StatusCode::PAYLOAD_TOO_LARGE,
        };
        if too_large {
            StatusCode::PAYLOAD_TOO_LARGE
        } else {
            StatusCode::BAD_REQUEST
        }
    }
}

fn exceeds_body_limit(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Build the request context for one HTTP request.
pub async fn from_http(
    request: Request<Body>,
    sessions: &Arc<SessionStore>,
    settings: &AppConfig,
) -> Result<RequestContext, RequestError> {
    let (parts, body) = request.into_parts();

    let server = server_vars(&parts);
    let query = parts
        .uri
        .query()
        .map(|q| params_to_map(url::form_urlencoded::parse(q.as_bytes())))
        .unwrap_or_default();
    let cookies = parse_cookies(&parts.headers);
    let session = sessions.start(
        cookies
            .get(&settings.session.cookie_name)
            .and_then(Value::as_str),
    );

    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    let mut uploads = BTreeMap::new();
    let post = if content_type.starts_with("multipart/form-data") {
        let request = Request::from_parts(parts, body);
        let mut multipart = Multipart::from_request(request, &()).await?;
        read_multipart(&mut multipart, &settings.server, &mut uploads).await?
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let bytes = axum::body::to_bytes(body, usize::MAX).await?;
        params_to_map(url::form_urlencoded::parse(&bytes))
    } else {
        Map::new()
    };

    Ok(RequestContext::new()
        .with_server(server)
        .with_query(query)
        .with_post(post)
        .with_cookies(cookies)
        .with_session(session)
        .with_uploads(&uploads))
}

/// Server data in CGI naming.
fn server_vars(parts: &Parts) -> Map<String, Value> {
    let mut server = Map::new();
    server.insert("REQUEST_METHOD".into(), parts.method.as_str().into());
    server.insert(
        "REQUEST_URI".into(),
        parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
            .into(),
    );
    server.insert("QUERY_STRING".into(), parts.uri.query().unwrap_or("").into());
    server.insert("SERVER_PROTOCOL".into(), format!("{:?}", parts.version).into());

    if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        server.insert("REMOTE_ADDR".into(), addr.ip().to_string().into());
        server.insert("REMOTE_PORT".into(), addr.port().into());
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    server.insert("REQUEST_TIME".into(), now.into());

    for (name, key) in [(CONTENT_TYPE, "CONTENT_TYPE"), (CONTENT_LENGTH, "CONTENT_LENGTH")] {
        if let Some(value) = parts.headers.get(name).and_then(|v| v.to_str().ok()) {
            server.insert(key.into(), value.into());
        }
    }

    for name in parts.headers.keys() {
        let joined = parts
            .headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ");
        let key = format!("HTTP_{}", name.as_str().to_ascii_uppercase().replace('-', "_"));
        server.insert(key, joined.into());
    }

    server
}

/// Collect decoded pairs. Later plain keys win; `key[]` pairs append to
/// an array under `key`.
pub fn params_to_map<'a, I>(pairs: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (Cow<'a, str>, Cow<'a, str>)>,
{
    let mut map = Map::new();
    for (key, value) in pairs {
        match key.strip_suffix(ARRAY_SUFFIX) {
            Some(base) => push_array(&mut map, base, value.into_owned().into()),
            None => {
                map.insert(key.into_owned(), value.into_owned().into());
            }
        }
    }
    map
}

fn push_array(map: &mut Map<String, Value>, key: &str, value: Value) {
    match map.get_mut(key) {
        Some(Value::Array(items)) => items.push(value),
        _ => {
            map.insert(key.to_string(), Value::Array(vec![value]));
        }
    }
}

/// Cookies from every `Cookie` header. The first occurrence of a name wins.
pub fn parse_cookies(headers: &HeaderMap) -> Map<String, Value> {
    let mut cookies = Map::new();
    for header in headers.get_all(COOKIE) {
        let Ok(header) = header.to_str() else {
            continue;
        };
        for pair in header.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                let name = name.trim();
                if !name.is_empty() && !cookies.contains_key(name) {
                    cookies.insert(name.to_string(), value.trim().trim_matches('"').into());
                }
            }
        }
    }
    cookies
}

/// One stored file part before grouping by field.
#[derive(Debug)]
struct FilePart {
    name: String,
    mime_type: String,
    tmp_name: PathBuf,
    error: u8,
    size: u64,
}

impl FilePart {
    /// A part that was not stored.
    fn failed(name: String, mime_type: String, error: u8) -> Self {
        Self {
            name,
            mime_type,
            tmp_name: PathBuf::new(),
            error,
            size: 0,
        }
    }
}

/// Upload files written during one request that nothing owns yet.
///
/// Whatever is still tracked when the guard drops is deleted, which covers
/// malformed bodies and requests abandoned mid-read.
#[derive(Debug, Default)]
struct PendingUploads {
    paths: Vec<PathBuf>,
}

impl PendingUploads {
    fn track(&mut self, part: &FilePart) {
        if part.error == UPLOAD_ERR_OK {
            self.paths.push(part.tmp_name.clone());
        }
    }

    /// Delete parts replaced by a later part for the same field.
    fn discard(&mut self, parts: Vec<FilePart>) {
        for part in parts.into_iter().filter(|p| p.error == UPLOAD_ERR_OK) {
            self.paths.retain(|path| *path != part.tmp_name);
            remove_upload(&part.tmp_name);
        }
    }

    /// Hand every tracked file over to the request context.
    fn keep(mut self) {
        self.paths.clear();
    }
}

impl Drop for PendingUploads {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            remove_upload(&path);
        }
    }
}

fn remove_upload(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed discarded upload"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove upload"),
    }
}

/// Read every multipart field: text fields into the returned map, file
/// parts onto disk and into `uploads`.
///
/// A later part for a field replaces earlier ones unless both use the
/// `field[]` form, in which case they accumulate.
async fn read_multipart(
    multipart: &mut Multipart,
    server: &ServerConfig,
    uploads: &mut BTreeMap<String, RawUpload>,
) -> Result<Map<String, Value>, RequestError> {
    let upload_dir = server.upload_dir();
    let mut post = Map::new();
    let mut files: BTreeMap<String, (bool, Vec<FilePart>)> = BTreeMap::new();
    let mut pending = PendingUploads::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(key) = field.name().map(str::to_string) else {
            continue;
        };

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let text = field.text().await?;
            match key.strip_suffix(ARRAY_SUFFIX) {
                Some(base) => push_array(&mut post, base, text.into()),
                None => {
                    post.insert(key, text.into());
                }
            }
            continue;
        };

        let mime_type = field.content_type().unwrap_or("").to_string();
        let bytes = field.bytes().await?;
        let part = if file_name.is_empty() {
            FilePart::failed(file_name, mime_type, UPLOAD_ERR_NO_FILE)
        } else if bytes.len() as u64 > server.max_file_bytes {
            debug!(file = %file_name, size = bytes.len(), "Upload exceeds file size limit");
            FilePart::failed(file_name, mime_type, UPLOAD_ERR_SIZE)
        } else {
            store_upload(&upload_dir, file_name, mime_type, &bytes).await
        };
        pending.track(&part);

        let (multiple, base) = match key.strip_suffix(ARRAY_SUFFIX) {
            Some(base) => (true, base.to_string()),
            None => (false, key),
        };
        match files.get_mut(&base) {
            Some((true, parts)) if multiple => parts.push(part),
            Some(entry) => {
                let replaced = std::mem::replace(entry, (multiple, vec![part]));
                pending.discard(replaced.1);
            }
            None => {
                files.insert(base, (multiple, vec![part]));
            }
        }
    }

    for (field, (multiple, parts)) in files {
        if let Some(raw) = flatten(multiple, parts) {
            uploads.insert(field, raw);
        }
    }
    pending.keep();
    Ok(post)
}

async fn store_upload(upload_dir: &Path, name: String, mime_type: String, bytes: &[u8]) -> FilePart {
    let path = upload_dir.join(format!("{UPLOAD_PREFIX}{}", Uuid::new_v4().simple()));
    match tokio::fs::write(&path, bytes).await {
        Ok(()) => {
            debug!(file = %name, path = %path.display(), size = bytes.len(), "Stored upload");
            FilePart {
                name,
                mime_type,
                tmp_name: path,
                error: UPLOAD_ERR_OK,
                size: bytes.len() as u64,
            }
        }
        Err(e) => {
            warn!(file = %name, error = %e, "Failed to store upload");
            FilePart::failed(name, mime_type, UPLOAD_ERR_CANT_WRITE)
        }
    }
}

/// Attribute-major layout: scalars for a plain field, lists for `field[]`.
fn flatten(multiple: bool, parts: Vec<FilePart>) -> Option<RawUpload> {
    if multiple {
        let mut raw = RawUpload {
            name: FileField::Multiple(Vec::new()),
            mime_type: FileField::Multiple(Vec::new()),
            tmp_name: FileField::Multiple(Vec::new()),
            error: FileField::Multiple(Vec::new()),
            size: FileField::Multiple(Vec::new()),
        };
        for part in parts {
            push_field(&mut raw.name, part.name);
            push_field(&mut raw.mime_type, part.mime_type);
            push_field(&mut raw.tmp_name, part.tmp_name);
            push_field(&mut raw.error, part.error);
            push_field(&mut raw.size, part.size);
        }
        Some(raw)
    } else {
        let part = parts.into_iter().next()?;
        Some(RawUpload {
            name: FileField::Single(part.name),
            mime_type: FileField::Single(part.mime_type),
            tmp_name: FileField::Single(part.tmp_name),
            error: FileField::Single(part.error),
            size: FileField::Single(part.size),
        })
    }
}

fn push_field<T>(field: &mut FileField<T>, value: T) {
    if let FileField::Multiple(values) = field {
        values.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use serde_json::json;

    fn sessions() -> Arc<SessionStore> {
        Arc::new(SessionStore::new())
    }

    #[test]
    fn test_array_keys_collect() {
        let map = params_to_map(url::form_urlencoded::parse(
            b"tags[]=a&tags[]=b&name=x&name=y&q=admin%2Fusers",
        ));
        assert_eq!(map["tags"], json!(["a", "b"]));
        assert_eq!(map["name"], json!("y"));
        assert_eq!(map["q"], json!("admin/users"));
    }

    #[test]
    fn test_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, "a=1; b=\"two\"; a=3; broken".parse().unwrap());
        let cookies = parse_cookies(&headers);
        assert_eq!(cookies["a"], json!("1"));
        assert_eq!(cookies["b"], json!("two"));
        assert_eq!(cookies.len(), 2);
    }

    #[tokio::test]
    async fn test_server_data_and_query() {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/app?q=account/login&page=2")
            .header("X-Forwarded-For", "10.1.1.1")
            .header("Referer", "/?q=home")
            .body(Body::empty())
            .unwrap();

        let ctx = from_http(request, &sessions(), &AppConfig::default())
            .await
            .unwrap();

        assert_eq!(ctx.route(), "account/login");
        assert_eq!(ctx.query("page"), Some(&json!("2")));
        assert_eq!(ctx.server("REQUEST_URI"), Some(&json!("/app?q=account/login&page=2")));
        assert_eq!(ctx.server("HTTP_X_FORWARDED_FOR"), Some(&json!("10.1.1.1")));
        assert_eq!(ctx.request("HTTP_REFERER"), Some(&json!("/?q=home")));
        assert_eq!(ctx.server("SERVER_PROTOCOL"), Some(&json!("HTTP/1.1")));
        assert!(ctx.is_get());
    }

    #[tokio::test]
    async fn test_urlencoded_body() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/?q=account/login")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("user=ann&roles[]=a&roles[]=b&q=other"))
            .unwrap();

        let ctx = from_http(request, &sessions(), &AppConfig::default())
            .await
            .unwrap();

        assert_eq!(ctx.post("user"), Some(&json!("ann")));
        assert_eq!(ctx.post("roles"), Some(&json!(["a", "b"])));
        assert_eq!(ctx.route(), "account/login");
    }

    #[tokio::test]
    async fn test_session_resumed_from_cookie() {
        let store = sessions();
        let mut first = store.start(None);
        first.insert("user_id", 9);
        first.commit();

        let request = Request::builder()
            .uri("/")
            .header(COOKIE, format!("FASTYSESSID={}", first.id()))
            .body(Body::empty())
            .unwrap();
        let ctx = from_http(request, &store, &AppConfig::default()).await.unwrap();

        assert_eq!(ctx.session("user_id"), Some(&json!(9)));
        assert!(!ctx.session_state().is_fresh());
    }

    #[tokio::test]
    async fn test_multipart_uploads_are_normalized() {
        let dir = std::env::temp_dir().join(format!("fasty-req-{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut settings = AppConfig::default();
        settings.server.upload_dir = Some(dir.clone());

        let boundary = "XBOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nreport\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"me.png\"\r\nContent-Type: image/png\r\n\r\nPNG\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"docs[]\"; filename=\"a.txt\"\r\nContent-Type: text/plain\r\n\r\naaa\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"docs[]\"; filename=\"b.txt\"\r\nContent-Type: text/plain\r\n\r\nbb\r\n\
             --{b}--\r\n",
            b = boundary
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri("/?q=upload")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap();

        let ctx = from_http(request, &sessions(), &settings).await.unwrap();

        assert_eq!(ctx.post("title"), Some(&json!("report")));

        let avatar = ctx.file("avatar");
        assert_eq!(avatar.len(), 1);
        assert_eq!(avatar[0].name, "me.png");
        assert_eq!(avatar[0].mime_type, "image/png");
        assert_eq!(avatar[0].size_bytes, 3);
        assert!(avatar[0].is_ok());
        assert_eq!(std::fs::read(&avatar[0].temp_path).unwrap(), b"PNG");

        let docs = ctx.file("docs");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].name, "a.txt");
        assert_eq!(docs[1].size_bytes, 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    fn upload_settings() -> (PathBuf, AppConfig) {
        let dir = std::env::temp_dir().join(format!("fasty-req-{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut settings = AppConfig::default();
        settings.server.upload_dir = Some(dir.clone());
        (dir, settings)
    }

    fn multipart_request(boundary: &str, body: String) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/?q=upload")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
            .body(Body::from(body))
            .unwrap()
    }

    fn stored_files(dir: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        paths.sort();
        paths
    }

    #[tokio::test]
    async fn test_truncated_multipart_leaves_no_files() {
        let (dir, settings) = upload_settings();
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"me.png\"\r\n\r\nPNG\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n\r\ncut off",
            b = "XBOUNDARY"
        );

        let result = from_http(multipart_request("XBOUNDARY", body), &sessions(), &settings).await;

        assert_eq!(result.unwrap_err().status(), StatusCode::BAD_REQUEST);
        assert!(stored_files(&dir).is_empty());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_replaced_file_parts_are_removed() {
        let (dir, settings) = upload_settings();
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"old.png\"\r\n\r\nOLD\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"new.png\"\r\n\r\nNEW\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"docs\"; filename=\"plain.txt\"\r\n\r\np\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"docs[]\"; filename=\"a.txt\"\r\n\r\na\r\n\
             --{b}--\r\n",
            b = "XBOUNDARY"
        );

        let ctx = from_http(multipart_request("XBOUNDARY", body), &sessions(), &settings)
            .await
            .unwrap();

        let avatar = ctx.file("avatar");
        assert_eq!(avatar.len(), 1);
        assert_eq!(avatar[0].name, "new.png");
        let docs = ctx.file("docs");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "a.txt");

        let mut visible: Vec<PathBuf> = ctx
            .files()
            .values()
            .flatten()
            .map(|file| file.temp_path.clone())
            .collect();
        visible.sort();
        assert_eq!(stored_files(&dir), visible);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_oversized_file_gets_size_error() {
        let (dir, mut settings) = upload_settings();
        settings.server.max_file_bytes = 2;
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"big.png\"\r\n\r\nPNG\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"note\"; filename=\"n.txt\"\r\n\r\nok\r\n\
             --{b}--\r\n",
            b = "XBOUNDARY"
        );

        let ctx = from_http(multipart_request("XBOUNDARY", body), &sessions(), &settings)
            .await
            .unwrap();

        let avatar = &ctx.file("avatar")[0];
        assert_eq!(avatar.error_code, UPLOAD_ERR_SIZE);
        assert_eq!(avatar.size_bytes, 0);
        assert!(avatar.temp_path.as_os_str().is_empty());
        assert!(ctx.file("note")[0].is_ok());
        assert_eq!(stored_files(&dir), vec![ctx.file("note")[0].temp_path.clone()]);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_body_limit_error_is_payload_too_large() {
        let limited = axum::body::to_bytes(Body::from("abcdef"), 3).await.unwrap_err();
        assert_eq!(RequestError::Body(limited).status(), StatusCode::PAYLOAD_TOO_LARGE);

        let other = RequestError::Body(axum::Error::new(std::io::Error::other("reset")));
        assert_eq!(other.status(), StatusCode::BAD_REQUEST);
    }
}
