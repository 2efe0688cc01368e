//! Incoming HTTP request type and form decoding.
//!
//! Form values are bytes. A percent escape decodes to the byte it names,
//! whether or not the result is valid UTF-8.

use std::convert::Infallible;

use bytes::Bytes;
use http::Method;
use percent_encoding::percent_decode;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data";

/// An incoming request with its body already collected.
///
/// One `Request` per call; handlers own it outright.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Bytes,
}

/// A request body that claims to be a form but can't be read as one.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("request body has no content type")]
    MissingType,

    #[error("unsupported form content type `{0}`")]
    UnsupportedType(String),

    #[error("malformed multipart form: {0}")]
    Multipart(#[from] multer::Error),
}

/// How the body of a request carries its form fields.
enum FormBody {
    None,
    UrlEncoded,
    Multipart(String),
}

impl Request {
    /// A request for `target`, which may carry a `?query`.
    ///
    /// The server builds requests from the wire; this constructor is for
    /// driving a [`Router`](crate::Router) directly.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_owned())),
            None => (target, None),
        };
        Self {
            method,
            path: path.to_owned(),
            query,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Adds a header. Returns `self` for chaining.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Replaces the body. Returns `self` for chaining.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub(crate) fn from_parts(parts: http::request::Parts, body: Bytes) -> Self {
        // Non-UTF-8 header values can't be form content types; drop them.
        let headers = parts.headers.iter()
            .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
            .collect();
        Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            headers,
            body,
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First value of form field `key`, as raw bytes.
    ///
    /// A `POST`/`PUT`/`PATCH` body is searched first (urlencoded or
    /// multipart), then the query string. A body with any other content type
    /// is an error rather than an empty form.
    pub async fn form_value(&self, key: &str) -> Result<Option<Vec<u8>>, FormError> {
        let from_body = match self.form_body()? {
            FormBody::None => None,
            FormBody::UrlEncoded => find_field(&self.body, key),
            FormBody::Multipart(boundary) => self.multipart_field(boundary, key).await?,
        };
        Ok(from_body.or_else(|| find_field(self.query.as_deref()?.as_bytes(), key)))
    }

    fn form_body(&self) -> Result<FormBody, FormError> {
        if !matches!(self.method, Method::POST | Method::PUT | Method::PATCH) {
            return Ok(FormBody::None);
        }
        let Some(content_type) = self.header_value("content-type") else {
            return if self.body.is_empty() { Ok(FormBody::None) } else { Err(FormError::MissingType) };
        };

        let mime = content_type.split(';').next().unwrap_or_default().trim();
        if mime.eq_ignore_ascii_case(FORM_CONTENT_TYPE) {
            Ok(FormBody::UrlEncoded)
        } else if mime.eq_ignore_ascii_case(MULTIPART_CONTENT_TYPE) {
            Ok(FormBody::Multipart(multer::parse_boundary(content_type)?))
        } else if self.body.is_empty() {
            Ok(FormBody::None)
        } else {
            Err(FormError::UnsupportedType(mime.to_owned()))
        }
    }

    async fn multipart_field(&self, boundary: String, key: &str) -> Result<Option<Vec<u8>>, FormError> {
        let body = self.body.clone();
        let stream = futures::stream::once(async move { Ok::<_, Infallible>(body) });
        let mut multipart = multer::Multipart::new(stream, boundary);

        while let Some(field) = multipart.next_field().await? {
            if field.name() == Some(key) {
                return Ok(Some(field.bytes().await?.to_vec()));
            }
        }
        Ok(None)
    }
}

/// Finds `key` in `a=1&b=2` form data and returns its decoded value.
fn find_field(input: &[u8], key: &str) -> Option<Vec<u8>> {
    input.split(|&b| b == b'&')
        .filter(|pair| !pair.is_empty())
        .find_map(|pair| {
            let (k, v) = match pair.iter().position(|&b| b == b'=') {
                Some(i) => (&pair[..i], &pair[i + 1..]),
                None => (pair, &pair[pair.len()..]),
            };
            (unescape(k) == key.as_bytes()).then(|| unescape(v))
        })
}

/// `+` is a space; `%XX` is the byte `0xXX`.
fn unescape(raw: &[u8]) -> Vec<u8> {
    let spaced: Vec<u8> = raw.iter().map(|&b| if b == b'+' { b' ' } else { b }).collect();
    percent_decode(&spaced).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn form_post(target: &str, body: &'static str) -> Request {
        Request::new(Method::POST, target)
            .header("Content-Type", FORM_CONTENT_TYPE)
            .body(body)
    }

    fn multipart_post(target: &str, body: &'static str) -> Request {
        Request::new(Method::POST, target)
            .header("content-type", "multipart/form-data; boundary=XyZ")
            .body(body)
    }

    async fn value(req: &Request, key: &str) -> Option<Vec<u8>> {
        req.form_value(key).await.unwrap()
    }

    #[test]
    fn splits_path_and_query() {
        let req = Request::new(Method::GET, "/view/Alpha?x=1");
        assert_eq!(req.path(), "/view/Alpha");
        assert_eq!(req.query(), Some("x=1"));
    }

    #[tokio::test]
    async fn decodes_form_body() {
        let req = form_post("/save/Alpha", "body=hello+world%21&other=1&flag");
        assert_eq!(value(&req, "body").await.as_deref(), Some(&b"hello world!"[..]));
        assert_eq!(value(&req, "other").await.as_deref(), Some(&b"1"[..]));
        assert_eq!(value(&req, "flag").await.as_deref(), Some(&b""[..]));
        assert_eq!(value(&req, "missing").await, None);
    }

    #[tokio::test]
    async fn non_utf8_escapes_stay_raw_bytes() {
        let req = form_post("/save/Bin", "body=%FF%FEok");
        assert_eq!(value(&req, "body").await, Some(vec![0xff, 0xfe, b'o', b'k']));
    }

    #[tokio::test]
    async fn content_type_parameters_are_ignored() {
        let req = Request::new(Method::POST, "/save/A")
            .header("content-type", "application/x-www-form-urlencoded; charset=UTF-8")
            .body("body=x");
        assert_eq!(value(&req, "body").await, Some(b"x".to_vec()));
    }

    #[tokio::test]
    async fn body_wins_over_query() {
        let req = form_post("/save/A?body=query", "body=form");
        assert_eq!(value(&req, "body").await, Some(b"form".to_vec()));
    }

    #[tokio::test]
    async fn falls_back_to_query() {
        let req = Request::new(Method::GET, "/save/A?body=from%20query");
        assert_eq!(value(&req, "body").await, Some(b"from query".to_vec()));
    }

    #[tokio::test]
    async fn get_bodies_are_not_parsed() {
        let get = Request::new(Method::GET, "/save/A")
            .header("content-type", FORM_CONTENT_TYPE)
            .body("body=ignored");
        assert_eq!(value(&get, "body").await, None);
    }

    #[tokio::test]
    async fn decodes_multipart_body() {
        let req = multipart_post(
            "/save/Alpha",
            "--XyZ\r\n\
             Content-Disposition: form-data; name=\"title\"\r\n\r\n\
             ignored\r\n\
             --XyZ\r\n\
             Content-Disposition: form-data; name=\"body\"\r\n\r\n\
             new text\r\n\
             --XyZ--\r\n",
        );
        assert_eq!(value(&req, "body").await, Some(b"new text".to_vec()));
        assert_eq!(value(&req, "missing").await, None);
    }

    #[tokio::test]
    async fn multipart_without_boundary_is_an_error() {
        let req = Request::new(Method::POST, "/save/A")
            .header("content-type", "multipart/form-data")
            .body("body=x");
        assert!(matches!(req.form_value("body").await, Err(FormError::Multipart(_))));
    }

    #[tokio::test]
    async fn unsupported_body_types_are_errors() {
        let json = Request::new(Method::POST, "/save/A")
            .header("content-type", "application/json")
            .body(r#"{"body":"x"}"#);
        assert!(matches!(json.form_value("body").await, Err(FormError::UnsupportedType(t)) if t == "application/json"));

        let untyped = Request::new(Method::POST, "/save/A").body("body=x");
        assert!(matches!(untyped.form_value("body").await, Err(FormError::MissingType)));
    }

    #[tokio::test]
    async fn empty_body_of_any_type_is_an_empty_form() {
        let req = Request::new(Method::POST, "/save/A?body=q").header("content-type", "text/plain");
        assert_eq!(value(&req, "body").await, Some(b"q".to_vec()));
    }
}
