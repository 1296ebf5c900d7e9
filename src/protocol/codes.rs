//! AJP13 wire constants and code tables.

use http::{HeaderName, Method};

/// Magic bytes opening every packet sent by the web server.
pub const SERVER_MAGIC: [u8; 2] = [0x12, 0x34];

/// Magic bytes opening every packet sent by the container (`"AB"`).
pub const CONTAINER_MAGIC: [u8; 2] = [0x41, 0x42];

/// Magic plus length.
pub const HEADER_LEN: usize = 4;

/// Conventional AJP13 packet size limit, header included.
pub const MAX_PACKET_SIZE: usize = 8192;

/// Largest data block a SEND_BODY_CHUNK packet may carry.
///
/// Header (4) + prefix (1) + chunk length (2) + trailing NUL (1).
pub const MAX_SEND_BODY_CHUNK: usize = MAX_PACKET_SIZE - 8;

/// Largest data block requested with GET_BODY_CHUNK.
///
/// Header (4) + inner data length (2).
pub const MAX_READ_BODY_CHUNK: usize = MAX_PACKET_SIZE - 6;

/// Fixed reply to a CPing.
pub const CPONG: [u8; 5] = [0x41, 0x42, 0x00, 0x01, prefix::CPONG_REPLY];

/// String length marking a null string.
pub const NULL_STRING_LEN: u16 = 0xFFFF;

/// Method byte meaning "see the stored_method attribute".
pub const STORED_METHOD_MARKER: u8 = 0xFF;

/// Packet prefix codes.
pub mod prefix {
    pub const FORWARD_REQUEST: u8 = 2;
    pub const SEND_BODY_CHUNK: u8 = 3;
    pub const SEND_HEADERS: u8 = 4;
    pub const END_RESPONSE: u8 = 5;
    pub const GET_BODY_CHUNK: u8 = 6;
    pub const SHUTDOWN: u8 = 7;
    pub const PING: u8 = 8;
    pub const CPONG_REPLY: u8 = 9;
    pub const CPING: u8 = 10;
}

/// Forward Request attribute codes.
pub mod attribute {
    pub const CONTEXT: u8 = 0x01;
    pub const SERVLET_PATH: u8 = 0x02;
    pub const REMOTE_USER: u8 = 0x03;
    pub const AUTH_TYPE: u8 = 0x04;
    pub const QUERY_STRING: u8 = 0x05;
    pub const ROUTE: u8 = 0x06;
    pub const SSL_CERT: u8 = 0x07;
    pub const SSL_CIPHER: u8 = 0x08;
    pub const SSL_SESSION: u8 = 0x09;
    pub const REQ_ATTRIBUTE: u8 = 0x0A;
    pub const SSL_KEY_SIZE: u8 = 0x0B;
    pub const SECRET: u8 = 0x0C;
    pub const STORED_METHOD: u8 = 0x0D;
    pub const ARE_DONE: u8 = 0xFF;
}

static METHODS: [&str; 27] = [
    "OPTIONS",
    "GET",
    "HEAD",
    "POST",
    "PUT",
    "DELETE",
    "TRACE",
    "PROPFIND",
    "PROPPATCH",
    "MKCOL",
    "COPY",
    "MOVE",
    "LOCK",
    "UNLOCK",
    "ACL",
    "REPORT",
    "VERSION-CONTROL",
    "CHECKIN",
    "CHECKOUT",
    "UNCHECKOUT",
    "SEARCH",
    "MKWORKSPACE",
    "UPDATE",
    "LABEL",
    "MERGE",
    "BASELINE-CONTROL",
    "MKACTIVITY",
];

static REQUEST_HEADERS: [&str; 14] = [
    "accept",
    "accept-charset",
    "accept-encoding",
    "accept-language",
    "authorization",
    "connection",
    "content-type",
    "content-length",
    "cookie",
    "cookie2",
    "host",
    "pragma",
    "referer",
    "user-agent",
];

static RESPONSE_HEADERS: [&str; 11] = [
    "content-type",
    "content-language",
    "content-length",
    "date",
    "last-modified",
    "location",
    "set-cookie",
    "set-cookie2",
    "servlet-engine",
    "status",
    "www-authenticate",
];

/// Map a Forward Request method byte (1..=27) to its HTTP method.
pub fn method_from_code(code: u8) -> Option<Method> {
    let name = METHODS.get(usize::from(code).checked_sub(1)?)?;
    Method::from_bytes(name.as_bytes()).ok()
}

/// Whether a 16-bit marker in a header-name position is a coded name (`0xA0xx`).
pub fn is_coded_header(marker: u16) -> bool {
    marker >> 8 == 0xA0
}

/// Resolve a coded request header name (`0xA001`..=`0xA00E`).
pub fn request_header_name(code: u16) -> Option<HeaderName> {
    if !is_coded_header(code) {
        return None;
    }
    let name = REQUEST_HEADERS.get(usize::from(code & 0xFF).checked_sub(1)?)?;
    Some(HeaderName::from_static(*name))
}

/// Code for a response header name, if the protocol defines one.
pub fn response_header_code(name: &HeaderName) -> Option<u16> {
    RESPONSE_HEADERS
        .iter()
        .position(|known| *known == name.as_str())
        .map(|idx| 0xA000 | (idx as u16 + 1))
}

/// Render bytes as space-separated hex for diagnostics.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
