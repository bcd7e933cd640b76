//! In-memory `multipart/form-data` parser
//!
//! Takes the raw `Content-Type` header value and the complete request body.
//! Parts carrying a `filename` become [`FilePart`]s; every other named part
//! is decoded as a UTF-8 text field. The body is never spooled to disk, so
//! the request size ceiling has to be enforced by the HTTP layer.
//!
//! Both CRLF and bare LF line endings are accepted.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MultipartError {
    #[error("Malformed multipart request: {0}")]
    MalformedRequest(String),
}

fn malformed(msg: impl Into<String>) -> MultipartError {
    MultipartError::MalformedRequest(msg.into())
}

/// Uploaded file part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Client-supplied name, possibly empty
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl FilePart {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Parsed form: text fields and file parts keyed by field name
///
/// A repeated field name keeps the last occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, FilePart>,
}

impl FormData {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn file(&self, name: &str) -> Option<&FilePart> {
        self.files.get(name)
    }

    /// Remove and return a file part, avoiding a copy of its bytes
    pub fn take_file(&mut self, name: &str) -> Option<FilePart> {
        self.files.remove(name)
    }

    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    pub fn files(&self) -> &HashMap<String, FilePart> {
        &self.files
    }
}

/// Extract the boundary token from a `multipart/form-data` content type
pub fn boundary_from_content_type(content_type: &str) -> Result<String, MultipartError> {
    let mut params = content_type.split(';');
    let media_type = params.next().unwrap_or_default().trim();
    if !media_type.eq_ignore_ascii_case("multipart/form-data") {
        return Err(malformed(format!(
            "expected multipart/form-data, got '{}'",
            media_type
        )));
    }

    for param in params {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("boundary") {
            let boundary = unquote(value.trim());
            if boundary.is_empty() {
                return Err(malformed("empty boundary"));
            }
            return Ok(boundary.to_string());
        }
    }

    Err(malformed("no boundary in content type"))
}

/// Parse a complete multipart body
pub fn parse(content_type: &str, body: &[u8]) -> Result<FormData, MultipartError> {
    let boundary = boundary_from_content_type(content_type)?;
    let delimiter = format!("--{}", boundary).into_bytes();
    // Every delimiter after the first sits at the start of a line
    let inner_delimiter = [b"\n".as_slice(), delimiter.as_slice()].concat();

    let mut form = FormData::default();

    let mut pos = find(body, &delimiter, 0)
        .ok_or_else(|| malformed("body does not contain the boundary"))?
        + delimiter.len();

    loop {
        if body[pos..].starts_with(b"--") {
            break;
        }
        pos = skip_line_break(body, pos);

        let (headers_end, separator_len) = find_header_end(body, pos)
            .ok_or_else(|| malformed("unterminated part headers"))?;
        let headers = std::str::from_utf8(&body[pos..headers_end])
            .map_err(|_| malformed("part headers are not valid UTF-8"))?;
        let content_start = headers_end + separator_len;

        let newline_at = find(body, &inner_delimiter, content_start)
            .ok_or_else(|| malformed("missing closing boundary"))?;
        let mut content_end = newline_at;
        if content_end > content_start && body[content_end - 1] == b'\r' {
            content_end -= 1;
        }

        add_part(&mut form, headers, &body[content_start..content_end])?;

        pos = newline_at + inner_delimiter.len();
        if pos >= body.len() {
            return Err(malformed("body ends after a boundary"));
        }
    }

    Ok(form)
}

fn add_part(form: &mut FormData, headers: &str, content: &[u8]) -> Result<(), MultipartError> {
    let mut name = None;
    let mut filename = None;
    let mut content_type = None;

    for line in headers.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            for (param, param_value) in disposition_params(value) {
                if param.eq_ignore_ascii_case("name") {
                    name = Some(param_value);
                } else if param.eq_ignore_ascii_case("filename") {
                    filename = Some(param_value);
                }
            }
        } else if key.eq_ignore_ascii_case("content-type") {
            let value = value.trim();
            if !value.is_empty() {
                content_type = Some(value.to_string());
            }
        }
    }

    // Unnamed parts carry nothing addressable
    let Some(name) = name else {
        return Ok(());
    };

    match filename {
        Some(filename) => {
            form.files.insert(
                name,
                FilePart {
                    filename,
                    content_type,
                    data: content.to_vec(),
                },
            );
        }
        None => {
            let text = String::from_utf8(content.to_vec())
                .map_err(|_| malformed(format!("field '{}' is not valid UTF-8", name)))?;
            form.fields.insert(name, text);
        }
    }

    Ok(())
}

/// `form-data; name="a"; filename="b.mp3"` → [("name","a"), ("filename","b.mp3")]
///
/// Splits on `;` outside quotes so a quoted filename may contain `;`.
fn disposition_params(value: &str) -> Vec<(String, String)> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in value.chars() {
        match c {
            _ if escaped => {
                current.push(c);
                escaped = false;
            }
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ';' if !in_quotes => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);

    segments
        .iter()
        .skip(1) // disposition type
        .filter_map(|segment| {
            let (key, value) = segment.split_once('=')?;
            let value = unquote(value.trim()).replace("\\\"", "\"");
            Some((key.trim().to_string(), value))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn skip_line_break(body: &[u8], pos: usize) -> usize {
    if body[pos..].starts_with(b"\r\n") {
        pos + 2
    } else if body[pos..].starts_with(b"\n") {
        pos + 1
    } else {
        pos
    }
}

/// End of the header block and the length of the blank-line separator
fn find_header_end(body: &[u8], from: usize) -> Option<(usize, usize)> {
    // A part with no headers starts directly with the blank line
    if body[from..].starts_with(b"\r\n") {
        return Some((from, 2));
    }
    if body[from..].starts_with(b"\n") {
        return Some((from, 1));
    }

    let crlf = find(body, b"\r\n\r\n", from).map(|i| (i, 4));
    let lf = find(body, b"\n\n", from).map(|i| (i, 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|i| i + from)
}
