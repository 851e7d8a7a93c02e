//! SSDP wire helpers: search requests and reply parsing

/// Standard SSDP multicast address for device discovery
pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250:1900";

/// Build an M-SEARCH discovery request
pub fn build_search_request(host: &str, search_target: &str, mx: u32) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\r\n",
        host, mx, search_target
    )
}

/// Extract a header value from an SSDP reply (case-insensitive name).
/// The first line is the status line and never matches.
pub fn extract_header<'a>(response: &'a str, name: &str) -> Option<&'a str> {
    for line in response.lines().skip(1) {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case(name) {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value);
                }
            }
        }
    }
    None
}
