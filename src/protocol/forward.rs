//! Forward Request parsing.
//!
//! Turns the payload of a prefix-2 packet into the request descriptor the
//! request handler works with. Strings on the wire are length-prefixed,
//! NUL-terminated and decoded as ISO-8859-1, the protocol's byte encoding.

use bytes::{Buf, Bytes};
use http::header::{COOKIE, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::protocol::codes::{self, attribute, NULL_STRING_LEN, STORED_METHOD_MARKER};
use crate::protocol::error::DecodeError;

const SESSION_COOKIE: &str = "JSESSIONID";
const SESSION_PATH_PARAM: &str = ";jsessionid=";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Structured request descriptor decoded from a Forward Request packet.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    pub protocol: String,
    /// Request URI without the query string.
    pub uri: String,
    pub remote_addr: String,
    pub remote_host: Option<String>,
    pub server_name: String,
    pub server_port: u16,
    pub is_ssl: bool,
    pub headers: HeaderMap,
    pub query_string: Option<String>,
    pub context: Option<String>,
    pub servlet_path: Option<String>,
    pub remote_user: Option<String>,
    pub auth_type: Option<String>,
    /// Sticky-session route of the web server's balancer.
    pub route: Option<String>,
    pub secret: Option<String>,
    /// Generic `req_attribute` name/value pairs, in wire order.
    pub attributes: Vec<(String, String)>,
}

impl ForwardRequest {
    /// Parse a Forward Request payload (prefix byte already stripped).
    pub fn parse(payload: Bytes) -> Result<Self, DecodeError> {
        let mut reader = AjpReader::new(payload);

        let method_code = reader.u8("method")?;
        let protocol = reader.required_string("protocol")?;
        let uri = reader.required_string("request uri")?;
        let remote_addr = reader.required_string("remote address")?;
        let remote_host = reader.string("remote host")?;
        let server_name = reader.required_string("server name")?;
        let server_port = reader.u16("server port")?;
        let is_ssl = reader.u8("is_ssl")? != 0;

        let header_count = reader.u16("header count")?;
        let mut headers = HeaderMap::with_capacity(usize::from(header_count));
        for _ in 0..header_count {
            let name = reader.header_name()?;
            let value = reader.raw_string("header value")?.unwrap_or_default();
            let value = HeaderValue::from_bytes(&value)
                .map_err(|_| DecodeError::InvalidHeader(format!("bad value for {name}")))?;
            headers.append(name, value);
        }

        let mut request = ForwardRequest {
            method: Method::GET,
            protocol,
            uri,
            remote_addr,
            remote_host,
            server_name,
            server_port,
            is_ssl,
            headers,
            query_string: None,
            context: None,
            servlet_path: None,
            remote_user: None,
            auth_type: None,
            route: None,
            secret: None,
            attributes: Vec::new(),
        };

        let mut stored_method = None;
        // Some web servers omit the terminator on an attribute-less request.
        while reader.has_remaining() {
            match reader.u8("attribute code")? {
                attribute::ARE_DONE => break,
                attribute::CONTEXT => request.context = reader.string("context")?,
                attribute::SERVLET_PATH => request.servlet_path = reader.string("servlet path")?,
                attribute::REMOTE_USER => request.remote_user = reader.string("remote user")?,
                attribute::AUTH_TYPE => request.auth_type = reader.string("auth type")?,
                attribute::QUERY_STRING => request.query_string = reader.string("query string")?,
                attribute::ROUTE => request.route = reader.string("route")?,
                attribute::SECRET => request.secret = reader.string("secret")?,
                attribute::STORED_METHOD => stored_method = reader.string("stored method")?,
                attribute::REQ_ATTRIBUTE => {
                    let name = reader.required_string("attribute name")?;
                    let value = reader.string("attribute value")?.unwrap_or_default();
                    request.attributes.push((name, value));
                }
                attribute::SSL_CERT | attribute::SSL_CIPHER | attribute::SSL_SESSION => {
                    reader.raw_string("ssl attribute")?;
                }
                attribute::SSL_KEY_SIZE => {
                    reader.u16("ssl key size")?;
                }
                other => return Err(DecodeError::UnknownAttribute(other)),
            }
        }

        request.method = if method_code == STORED_METHOD_MARKER {
            let name = stored_method.ok_or(DecodeError::NullField("stored method"))?;
            Method::from_bytes(name.as_bytes()).map_err(|_| DecodeError::UnknownMethod(method_code))?
        } else {
            codes::method_from_code(method_code).ok_or(DecodeError::UnknownMethod(method_code))?
        };

        Ok(request)
    }

    /// Value of the `content-length` header, `None` when absent.
    pub fn declared_content_length(&self) -> Result<Option<u64>, DecodeError> {
        let Some(value) = self.headers.get(CONTENT_LENGTH) else {
            return Ok(None);
        };
        let text = value
            .to_str()
            .map_err(|_| DecodeError::InvalidContentLength(latin1(value.as_bytes())))?;
        text.trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| DecodeError::InvalidContentLength(text.to_string()))
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    /// Whether the body is an url-encoded form.
    pub fn is_form_data(&self) -> bool {
        self.content_type()
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
    }

    /// Whether the body is sent with `transfer-encoding: chunked`.
    pub fn is_chunked(&self) -> bool {
        self.headers
            .get_all(TRANSFER_ENCODING)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
    }

    /// HTTP session id from the session cookie, else from the URI path parameter.
    pub fn http_session_id(&self) -> Option<String> {
        let from_cookie = self
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .map(|(_, value)| value.trim_matches('"').to_string());
        if from_cookie.is_some() {
            return from_cookie;
        }

        let start = self.uri.find(SESSION_PATH_PARAM)? + SESSION_PATH_PARAM.len();
        let rest = &self.uri[start..];
        let id = rest.split([';', '?', '/']).next().unwrap_or(rest);
        (!id.is_empty()).then(|| id.to_string())
    }

    /// `METHOD uri?query` for logs and watchdog diagnostics.
    pub fn request_line(&self) -> String {
        match &self.query_string {
            Some(query) => format!("{} {}?{}", self.method, self.uri, query),
            None => format!("{} {}", self.method, self.uri),
        }
    }
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Cursor over a packet payload with AJP13 primitive readers.
struct AjpReader {
    buf: Bytes,
}

impl AjpReader {
    fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    fn has_remaining(&self) -> bool {
        self.buf.has_remaining()
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        if self.buf.remaining() < 1 {
            return Err(DecodeError::Truncated(field));
        }
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, DecodeError> {
        if self.buf.remaining() < 2 {
            return Err(DecodeError::Truncated(field));
        }
        Ok(self.buf.get_u16())
    }

    fn peek_u16(&self, field: &'static str) -> Result<u16, DecodeError> {
        match self.buf.get(..2) {
            Some(&[hi, lo]) => Ok(u16::from_be_bytes([hi, lo])),
            _ => Err(DecodeError::Truncated(field)),
        }
    }

    /// Length-prefixed, NUL-terminated bytes; `None` for the null string.
    fn raw_string(&mut self, field: &'static str) -> Result<Option<Bytes>, DecodeError> {
        let len = self.u16(field)?;
        if len == NULL_STRING_LEN {
            return Ok(None);
        }
        let len = usize::from(len);
        if self.buf.remaining() < len + 1 {
            return Err(DecodeError::Truncated(field));
        }
        let value = self.buf.split_to(len);
        if self.buf.get_u8() != 0 {
            return Err(DecodeError::MissingTerminator(field));
        }
        Ok(Some(value))
    }

    fn string(&mut self, field: &'static str) -> Result<Option<String>, DecodeError> {
        Ok(self.raw_string(field)?.map(|raw| latin1(&raw)))
    }

    fn required_string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        self.string(field)?.ok_or(DecodeError::NullField(field))
    }

    fn header_name(&mut self) -> Result<HeaderName, DecodeError> {
        let marker = self.peek_u16("header name")?;
        if codes::is_coded_header(marker) {
            self.u16("header name")?;
            return codes::request_header_name(marker)
                .ok_or_else(|| DecodeError::InvalidHeader(format!("unknown header code {marker:#06x}")));
        }
        let raw = self
            .raw_string("header name")?
            .ok_or(DecodeError::NullField("header name"))?;
        HeaderName::from_bytes(&raw).map_err(|_| DecodeError::InvalidHeader(latin1(&raw)))
    }
}
