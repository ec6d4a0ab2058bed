//! HTTP/1.x `Host` header sniffer.

use super::ParseResult;
use crate::buffer::CAPACITY;

/// Parse a prefix of an HTTP/1.x request, looking for the `Host` header.
///
/// Tolerant of case-insensitive header names; intolerant of header folding
/// (obsolete since RFC 7230 and not worth the complexity here).
pub fn parse(bytes: &[u8]) -> ParseResult {
    let header_end = match find(bytes, b"\r\n\r\n") {
        Some(i) => i,
        None => {
            return if bytes.len() >= CAPACITY {
                ParseResult::Malformed
            } else {
                ParseResult::Incomplete
            };
        }
    };

    let head = &bytes[..header_end];
    let mut lines = head.split(|&b| b == b'\n').map(strip_cr);

    let request_line = match lines.next() {
        Some(line) if !line.is_empty() => line,
        _ => return ParseResult::Malformed,
    };
    if !is_valid_request_line(request_line) {
        return ParseResult::Malformed;
    }

    for line in lines {
        if line.is_empty() {
            continue;
        }
        if let Some(value) = strip_ci_prefix(line, b"host:") {
            let value = trim(value);
            if value.is_empty() {
                return ParseResult::NoHostname;
            }
            return match std::str::from_utf8(strip_port(value)) {
                Ok(host) if !host.is_empty() => ParseResult::Hostname(host.to_ascii_lowercase()),
                _ => ParseResult::Malformed,
            };
        }
    }

    ParseResult::NoHostname
}

fn is_valid_request_line(line: &[u8]) -> bool {
    let line = match std::str::from_utf8(line) {
        Ok(s) => s,
        Err(_) => return false,
    };
    let mut parts = line.splitn(3, ' ');
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");
    let version = parts.next().unwrap_or("");
    !method.is_empty()
        && method.bytes().all(|b| b.is_ascii_uppercase())
        && !target.is_empty()
        && version.starts_with("HTTP/")
}

fn strip_port(value: &[u8]) -> &[u8] {
    if let Some(rest) = value.strip_prefix(b"[") {
        return match rest.iter().position(|&b| b == b']') {
            Some(end) => &rest[..end],
            None => value,
        };
    }
    match value.iter().rposition(|&b| b == b':') {
        Some(i) if i + 1 < value.len() && value[i + 1..].iter().all(u8::is_ascii_digit) => &value[..i],
        _ => value,
    }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &bytes[start..end]
}

fn strip_ci_prefix<'a>(line: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
    if line.len() < prefix.len() {
        return None;
    }
    let (head, tail) = line.split_at(prefix.len());
    if head.eq_ignore_ascii_case(prefix) {
        Some(tail)
    } else {
        None
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_host_header() {
        let req = b"GET / HTTP/1.1\r\nHost: a.example\r\n\r\n";
        assert_eq!(parse(req), ParseResult::Hostname("a.example".to_string()));
    }

    #[test]
    fn lowercases_host() {
        let req = b"GET / HTTP/1.1\r\nHost: A.Example\r\n\r\n";
        assert_eq!(parse(req), ParseResult::Hostname("a.example".to_string()));
    }

    #[test]
    fn case_insensitive_header_name() {
        let req = b"GET / HTTP/1.1\r\nhOsT: a.example\r\n\r\n";
        assert_eq!(parse(req), ParseResult::Hostname("a.example".to_string()));
    }

    #[test]
    fn strips_port_from_host() {
        let req = b"GET / HTTP/1.1\r\nHost: a.example:8080\r\n\r\n";
        assert_eq!(parse(req), ParseResult::Hostname("a.example".to_string()));
    }

    #[test]
    fn strips_port_from_bracketed_ipv6_host() {
        let req = b"GET / HTTP/1.1\r\nHost: [::1]:8080\r\n\r\n";
        assert_eq!(parse(req), ParseResult::Hostname("::1".to_string()));
    }

    #[test]
    fn no_host_header_is_no_hostname() {
        let req = b"GET / HTTP/1.0\r\n\r\n";
        assert_eq!(parse(req), ParseResult::NoHostname);
    }

    #[test]
    fn empty_host_value_is_no_hostname() {
        let req = b"GET / HTTP/1.1\r\nHost: \r\n\r\n";
        assert_eq!(parse(req), ParseResult::NoHostname);
    }

    #[test]
    fn incomplete_headers_wait_for_more_bytes() {
        let req = b"GET / HTTP/1.1\r\nHost: a.example\r\n";
        assert_eq!(parse(req), ParseResult::Incomplete);
    }

    #[test]
    fn garbage_request_line_is_malformed() {
        let req = b"not a request\r\n\r\n";
        assert_eq!(parse(req), ParseResult::Malformed);
    }

    #[test]
    fn oversized_headers_without_terminator_are_malformed() {
        let req = vec![b'a'; CAPACITY];
        assert_eq!(parse(&req), ParseResult::Malformed);
    }
}
