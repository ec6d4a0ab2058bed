//! TLS ClientHello SNI sniffer.
//!
//! Walks the record and handshake framing from RFC 8446 §5.1/§4.1.2 far
//! enough to reach the `server_name` extension (RFC 6066 §3), without
//! touching anything else in the handshake. Only the first TLS record is
//! considered: a ClientHello large enough to spill across multiple records
//! (very large session tickets, enormous cipher suite lists) is rare enough
//! in practice that this sniffer reports `Incomplete` and lets the caller
//! feed it more bytes from the same record, rather than reassembling across
//! record boundaries.

use super::ParseResult;

const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;
const HANDSHAKE_TYPE_CLIENT_HELLO: u8 = 0x01;
const EXTENSION_SERVER_NAME: u16 = 0;
const SERVER_NAME_TYPE_HOST_NAME: u8 = 0;

/// Parse a prefix of a TLS ClientHello, looking for the SNI hostname.
pub fn parse(bytes: &[u8]) -> ParseResult {
    let mut record = Cursor::new(bytes);

    let content_type = match record.u8() {
        Some(b) => b,
        None => return ParseResult::Incomplete,
    };
    if content_type != CONTENT_TYPE_HANDSHAKE {
        return ParseResult::Malformed;
    }
    if record.take(2).is_none() {
        // protocol version
        return ParseResult::Incomplete;
    }
    let record_len = match record.u16() {
        Some(v) => v as usize,
        None => return ParseResult::Incomplete,
    };
    let record_body = match record.take(record_len) {
        Some(b) => b,
        None => return ParseResult::Incomplete,
    };

    let mut handshake = Cursor::new(record_body);
    let handshake_type = match handshake.u8() {
        Some(b) => b,
        None => return ParseResult::Malformed,
    };
    if handshake_type != HANDSHAKE_TYPE_CLIENT_HELLO {
        return ParseResult::Malformed;
    }
    let handshake_len = match handshake.u24() {
        Some(v) => v,
        None => return ParseResult::Malformed,
    };
    let hello = match handshake.take(handshake_len) {
        Some(b) => b,
        // The handshake message claims to be longer than the record that
        // carries it: either it spans multiple records (unsupported here)
        // or the record is simply incomplete. Either way, wait for more.
        None => return ParseResult::Incomplete,
    };

    let mut body = Cursor::new(hello);
    if body.take(2).is_none() {
        return ParseResult::Malformed; // client_version
    }
    if body.take(32).is_none() {
        return ParseResult::Malformed; // random
    }

    let session_id_len = match body.u8() {
        Some(v) => v as usize,
        None => return ParseResult::Malformed,
    };
    if body.take(session_id_len).is_none() {
        return ParseResult::Malformed;
    }

    let cipher_suites_len = match body.u16() {
        Some(v) => v as usize,
        None => return ParseResult::Malformed,
    };
    if body.take(cipher_suites_len).is_none() {
        return ParseResult::Malformed;
    }

    let compression_len = match body.u8() {
        Some(v) => v as usize,
        None => return ParseResult::Malformed,
    };
    if body.take(compression_len).is_none() {
        return ParseResult::Malformed;
    }

    if body.remaining() == 0 {
        // No extensions block at all -- a legal (if ancient) ClientHello.
        return ParseResult::NoHostname;
    }

    let extensions_len = match body.u16() {
        Some(v) => v as usize,
        None => return ParseResult::Malformed,
    };
    let extensions = match body.take(extensions_len) {
        Some(b) => b,
        None => return ParseResult::Malformed,
    };

    let mut ext_cursor = Cursor::new(extensions);
    while ext_cursor.remaining() > 0 {
        let ext_type = match ext_cursor.u16() {
            Some(v) => v,
            None => return ParseResult::Malformed,
        };
        let ext_len = match ext_cursor.u16() {
            Some(v) => v as usize,
            None => return ParseResult::Malformed,
        };
        let ext_data = match ext_cursor.take(ext_len) {
            Some(b) => b,
            None => return ParseResult::Malformed,
        };

        if ext_type == EXTENSION_SERVER_NAME {
            return parse_server_name(ext_data);
        }
    }

    ParseResult::NoHostname
}

fn parse_server_name(ext_data: &[u8]) -> ParseResult {
    let mut cursor = Cursor::new(ext_data);
    let list_len = match cursor.u16() {
        Some(v) => v as usize,
        None => return ParseResult::Malformed,
    };
    let list = match cursor.take(list_len) {
        Some(b) => b,
        None => return ParseResult::Malformed,
    };

    let mut entries = Cursor::new(list);
    while entries.remaining() > 0 {
        let name_type = match entries.u8() {
            Some(v) => v,
            None => return ParseResult::Malformed,
        };
        let name_len = match entries.u16() {
            Some(v) => v as usize,
            None => return ParseResult::Malformed,
        };
        let name = match entries.take(name_len) {
            Some(b) => b,
            None => return ParseResult::Malformed,
        };

        if name_type == SERVER_NAME_TYPE_HOST_NAME {
            return match validate_hostname(name) {
                Some(hostname) => ParseResult::Hostname(hostname),
                None => ParseResult::Malformed,
            };
        }
    }

    ParseResult::NoHostname
}

/// Lower-case and validate a hostname to the `a-z0-9-.` alphabet, rejecting
/// empty labels and leading dots/dashes per label -- in particular this
/// rejects anything that could later be abused for path traversal if the
/// hostname is used to build a UNIX-socket path (see the `unix:` address
/// form in the configuration grammar).
fn validate_hostname(raw: &[u8]) -> Option<String> {
    let s = std::str::from_utf8(raw).ok()?;
    if s.is_empty() || s.len() > 255 {
        return None;
    }
    let lower = s.to_ascii_lowercase();
    for label in lower.split('.') {
        if label.is_empty() || label.starts_with('-') {
            return None;
        }
        if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return None;
        }
    }
    Some(lower)
}

/// Bounds-checked cursor over a byte slice, used to walk TLS framing without
/// ever indexing out of bounds.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Cursor<'a> {
        Cursor { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Some(slice)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }

    fn u24(&mut self) -> Option<usize> {
        self.take(3).map(|b| ((b[0] as usize) << 16) | ((b[1] as usize) << 8) | b[2] as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extension(ext_type: u16, data: &[u8]) -> Vec<u8> {
        let mut out = ext_type.to_be_bytes().to_vec();
        out.extend_from_slice(&(data.len() as u16).to_be_bytes());
        out.extend_from_slice(data);
        out
    }

    fn server_name_extension(hostname: &str) -> Vec<u8> {
        let mut entry = vec![SERVER_NAME_TYPE_HOST_NAME];
        entry.extend_from_slice(&(hostname.len() as u16).to_be_bytes());
        entry.extend_from_slice(hostname.as_bytes());

        let mut list = (entry.len() as u16).to_be_bytes().to_vec();
        list.extend_from_slice(&entry);
        extension(EXTENSION_SERVER_NAME, &list)
    }

    fn client_hello(extensions: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&[0x03, 0x03]); // client_version
        body.extend_from_slice(&[0u8; 32]); // random
        body.push(0); // session_id_len
        body.extend_from_slice(&2u16.to_be_bytes()); // cipher_suites_len
        body.extend_from_slice(&[0x13, 0x01]); // one cipher suite
        body.push(1); // compression_methods_len
        body.push(0); // null compression
        body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
        body.extend_from_slice(extensions);

        let mut handshake = vec![HANDSHAKE_TYPE_CLIENT_HELLO];
        handshake.extend_from_slice(&[(body.len() >> 16) as u8, (body.len() >> 8) as u8, body.len() as u8]);
        handshake.extend_from_slice(&body);

        let mut record = vec![CONTENT_TYPE_HANDSHAKE, 0x03, 0x01];
        record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
        record.extend_from_slice(&handshake);
        record
    }

    #[test]
    fn extracts_sni_hostname() {
        let extensions = server_name_extension("example.com");
        let record = client_hello(&extensions);
        assert_eq!(parse(&record), ParseResult::Hostname("example.com".to_string()));
    }

    #[test]
    fn lowercases_hostname() {
        let extensions = server_name_extension("Example.COM");
        let record = client_hello(&extensions);
        assert_eq!(parse(&record), ParseResult::Hostname("example.com".to_string()));
    }

    #[test]
    fn no_server_name_extension_is_no_hostname() {
        let record = client_hello(&[]);
        assert_eq!(parse(&record), ParseResult::NoHostname);
    }

    #[test]
    fn truncated_record_is_incomplete() {
        let extensions = server_name_extension("example.com");
        let record = client_hello(&extensions);
        assert_eq!(parse(&record[..record.len() - 5]), ParseResult::Incomplete);
    }

    #[test]
    fn empty_input_is_incomplete() {
        assert_eq!(parse(&[]), ParseResult::Incomplete);
    }

    #[test]
    fn wrong_content_type_is_malformed() {
        let mut record = client_hello(&[]);
        record[0] = 0x17; // application_data
        assert_eq!(parse(&record), ParseResult::Malformed);
    }

    #[test]
    fn rejects_hostname_with_leading_dash() {
        let extensions = server_name_extension("-evil.com");
        let record = client_hello(&extensions);
        assert_eq!(parse(&record), ParseResult::Malformed);
    }

    #[test]
    fn rejects_hostname_with_path_traversal_bytes() {
        let extensions = server_name_extension("../../etc/passwd");
        let record = client_hello(&extensions);
        assert_eq!(parse(&record), ParseResult::Malformed);
    }
}
