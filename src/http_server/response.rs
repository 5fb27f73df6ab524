// ---------------------
// --- HTTP RESPONSE ---
// ---------------------

/// Body of the one and only response this server produces.
pub const HELLO_BODY: &str = "Hello world!";

/// Compile the fixed HTTP/1.0 response.
///
/// Every serviced connection receives exactly these bytes, regardless of
/// what the client sent. There are no other headers and no trailing
/// characters after the body.
pub fn hello_reply() -> String {
    let mut resp = String::with_capacity(64);

    resp.push_str("HTTP/1.0 200 OK\r\n");
    resp.push_str(&format!("Content-Length: {}\r\n", HELLO_BODY.len()));
    resp.push_str("\r\n");
    resp.push_str(HELLO_BODY);

    resp
}

// -------------
// --- TESTS ---
// -------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_is_exact() {
        assert_eq!(
            hello_reply(),
            "HTTP/1.0 200 OK\r\nContent-Length: 12\r\n\r\nHello world!"
        );
    }

    #[test]
    fn test_content_length_matches_body() {
        assert_eq!(HELLO_BODY.len(), 12);
        assert!(hello_reply().ends_with(HELLO_BODY));
    }
}
