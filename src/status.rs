//! HTTP method, protocol version, and status-code vocabulary shared by the
//! request reader (C6), response writer (C7), and handler contract (C5).

use std::str::FromStr;

/// HTTP request methods understood by the dispatcher.
///
/// Unlike a fixed protocol subset, a [`Handler`](crate::handler::Handler)
/// declares which of these it implements via `methods()`; the runtime
/// rejects any method a handler doesn't list with 405, and synthesizes
/// `OPTIONS`/`HEAD` itself (§4.5). A request-line token outside the known
/// set is not a parse failure: it is carried as [`Method::Other`] and left
/// to routing and `methods()` matching to reject it with 404/405, the same
/// way an unrecognized method reaches `respond()` in the original.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Head,
    Patch,
    Delete,
    Options,
    /// Any request-line token not among the seven known methods, carried
    /// verbatim. Never produced by [`Handler::methods`](crate::handler::Handler::methods)
    /// lists, so it can never match a handler's declared methods and always
    /// falls through to 404 (no route) or 405 (route matched, method
    /// unsupported).
    Other(String),
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Put,
        Method::Post,
        Method::Head,
        Method::Patch,
        Method::Delete,
        Method::Options,
    ];

    pub fn as_str(&self) -> String {
        match self {
            Method::Get => "GET".to_string(),
            Method::Put => "PUT".to_string(),
            Method::Post => "POST".to_string(),
            Method::Head => "HEAD".to_string(),
            Method::Patch => "PATCH".to_string(),
            Method::Delete => "DELETE".to_string(),
            Method::Options => "OPTIONS".to_string(),
            Method::Other(token) => token.clone(),
        }
    }

    pub fn as_lowercase(&self) -> String {
        match self {
            Method::Get => "get".to_string(),
            Method::Put => "put".to_string(),
            Method::Post => "post".to_string(),
            Method::Head => "head".to_string(),
            Method::Patch => "patch".to_string(),
            Method::Delete => "delete".to_string(),
            Method::Options => "options".to_string(),
            Method::Other(token) => token.to_lowercase(),
        }
    }

    /// Default `get_body()` semantics from §4.5: a body is read for
    /// POST/PUT/PATCH unless a handler overrides `get_body`.
    pub fn reads_body_by_default(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl FromStr for Method {
    type Err = std::convert::Infallible;

    /// Never fails: an unrecognized token becomes [`Method::Other`] rather
    /// than an error, so the request reader never rejects a request on the
    /// method token alone (§4.6 has no "unknown method" error case).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "GET" => Method::Get,
            "PUT" => Method::Put,
            "POST" => Method::Post,
            "HEAD" => Method::Head,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            "OPTIONS" => Method::Options,
            other => Method::Other(other.to_string()),
        })
    }
}

/// HTTP protocol version. The request reader (§4.6 step 8) only ever
/// accepts the exact token `HTTP/1.1`; other tokens fail with 505 before a
/// `Version` value is ever produced, so this enum has one inhabitant for now
/// and exists to keep the status-line formatting generic over the wire
/// version rather than hard-coding it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    Http11,
}

impl Version {
    pub fn as_str(&self) -> &'static str {
        match self {
            Version::Http11 => "HTTP/1.1",
        }
    }
}

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])+
        $name:ident = ($num:expr, $str:expr);
    )+) => {
        /// HTTP status codes, per RFC 9110 §15 and related RFCs.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $(#[$docs])+
            $name = $num,
        )+ }

        impl StatusCode {
            pub const fn code(self) -> u16 {
                match self { $( StatusCode::$name => $num, )+ }
            }

            pub const fn reason_phrase(self) -> &'static str {
                match self { $( StatusCode::$name => $str, )+ }
            }

            /// Reason phrase for an arbitrary numeric code, falling back to
            /// `"Unknown"` for codes outside the known registry (handlers
            /// may still construct [`crate::errors::HttpError::new`] with an
            /// unlisted code plus an explicit `status_message` override).
            pub fn reason_phrase_for(code: u16) -> &'static str {
                match code { $( $num => $str, )+ _ => "Unknown" }
            }
        }
    }
}

set_status_codes! {
    /// [RFC9110 §15.2.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.2.1)
    Continue = (100, "Continue");

    /// [RFC9110 §15.3.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.1)
    Ok = (200, "OK");
    /// [RFC9110 §15.3.2](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.2)
    Created = (201, "Created");
    /// [RFC9110 §15.3.3](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.3)
    Accepted = (202, "Accepted");
    /// [RFC9110 §15.3.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.5)
    NoContent = (204, "No Content");

    /// [RFC9110 §15.4.2](https://datatracker.ietf.org/doc/html/rfc9110#section-15.4.2)
    MovedPermanently = (301, "Moved Permanently");
    /// [RFC9110 §15.4.3](https://datatracker.ietf.org/doc/html/rfc9110#section-15.4.3)
    Found = (302, "Found");
    /// [RFC9110 §15.4.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.4.5)
    NotModified = (304, "Not Modified");

    /// [RFC9110 §15.5.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.1)
    BadRequest = (400, "Bad Request");
    /// [RFC9110 §15.5.2](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.2)
    Unauthorized = (401, "Unauthorized");
    /// [RFC9110 §15.5.4](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.4)
    Forbidden = (403, "Forbidden");
    /// [RFC9110 §15.5.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.5)
    NotFound = (404, "Not Found");
    /// [RFC9110 §15.5.6](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.6)
    MethodNotAllowed = (405, "Method Not Allowed");
    /// [RFC9110 §15.5.14](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.14)
    PayloadTooLarge = (413, "Payload Too Large");
    /// [RFC9110 §15.5.15](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.15)
    UriTooLong = (414, "URI Too Long");
    /// [RFC6585 §5](https://datatracker.ietf.org/doc/html/rfc6585#section-5)
    RequestHeaderFieldsTooLarge = (431, "Request Header Fields Too Large");

    /// [RFC9110 §15.6.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.1)
    InternalServerError = (500, "Internal Server Error");
    /// [RFC9110 §15.6.4](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.4)
    ServiceUnavailable = (503, "Service Unavailable");
    /// [RFC9110 §15.6.6](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.6)
    HttpVersionNotSupported = (505, "HTTP Version Not Supported");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_phrase_for_known_code() {
        assert_eq!(StatusCode::reason_phrase_for(404), "Not Found");
    }

    #[test]
    fn reason_phrase_for_unknown_code_falls_back() {
        assert_eq!(StatusCode::reason_phrase_for(999), "Unknown");
    }

    #[test]
    fn method_round_trips_through_str() {
        assert_eq!("PATCH".parse::<Method>(), Ok(Method::Patch));
        assert_eq!(Method::Patch.as_str(), "PATCH");
        assert_eq!(Method::Patch.as_lowercase(), "patch");
    }

    #[test]
    fn unrecognized_token_parses_as_other_rather_than_failing() {
        let method = "PROPFIND".parse::<Method>().unwrap();
        assert_eq!(method, Method::Other("PROPFIND".to_string()));
        assert_eq!(method.as_str(), "PROPFIND");
        assert_eq!(method.as_lowercase(), "propfind");
    }
}
