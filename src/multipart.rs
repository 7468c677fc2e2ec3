//! `multipart/form-data` body parsing.
//!
//! The parser is byte-transparent: the body is treated as a raw byte
//! sequence, never as UTF-8, so binary file payloads survive untouched.
//! Text field values are converted lossily for the field map; file payloads
//! keep their exact bytes.
//!
//! Structure of a multipart body:
//!
//! ```text
//! --boundary\r\n
//! Content-Disposition: form-data; name="field"\r\n
//! \r\n
//! value\r\n
//! --boundary\r\n
//! Content-Disposition: form-data; name="file"; filename="a.txt"\r\n
//! Content-Type: text/plain\r\n
//! \r\n
//! <payload bytes>\r\n
//! --boundary--\r\n
//! ```

use std::collections::HashMap;

use crate::error::Error;

/// A single uploaded file from a `multipart/form-data` request.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    /// The filename as submitted by the client (e.g. `"image.png"`).
    pub filename: String,
    /// The part's declared content type, `text/plain` if it declared none.
    pub content_type: String,
    /// The raw payload bytes.
    pub data: Vec<u8>,
}

/// A parsed `multipart/form-data` request body.
///
/// Text fields are keyed by name (last write wins on duplicates); files are
/// keyed by field name, preserving encounter order when one name carries
/// several files.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl MultipartForm {
    /// Returns the text field value stored under `name`.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Returns the first file uploaded under `name`.
    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name).and_then(|list| list.first())
    }

    /// Returns every file uploaded under `name`, in encounter order.
    pub fn files(&self, name: &str) -> &[UploadedFile] {
        self.files.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn add_field(&mut self, name: String, value: String) {
        self.fields.insert(name, value);
    }

    fn add_file(&mut self, name: String, file: UploadedFile) {
        self.files.entry(name).or_default().push(file);
    }
}

/// Decodes a multipart body given the boundary token from the content type.
///
/// The preamble before the first boundary and the `--boundary--` epilogue
/// are discarded; each remaining part is split once on the blank line into
/// a header block and a body block.
pub(crate) fn parse(body: &[u8], boundary: &str) -> Result<MultipartForm, Error> {
    let marker = format!("--{boundary}\r\n").into_bytes();
    let terminal = format!("--{boundary}--").into_bytes();

    let mut form = MultipartForm::default();
    let mut parts = split_on(body, &marker);
    // Everything before the first boundary is preamble.
    parts.next();
    for part in parts {
        let part = strip_terminal(part, &terminal);
        if part.is_empty() {
            continue;
        }
        parse_part(part, &mut form);
    }
    Ok(form)
}

/// Parses one delimited part into either a text field or a file.
fn parse_part(part: &[u8], form: &mut MultipartForm) {
    let Some(split) = find(part, b"\r\n\r\n") else { return };
    let header_block = &part[..split];
    let body_block = &part[split + 4..];

    let mut headers: HashMap<String, String> = HashMap::new();
    for line in String::from_utf8_lossy(header_block).split("\r\n") {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_owned());
        }
    }

    let Some(disposition) = headers.get("content-disposition") else { return };
    let Some(name) = attribute(disposition, "name") else { return };
    let filename = attribute(disposition, "filename");
    let content_type = headers
        .get("content-type")
        .cloned()
        .unwrap_or_else(|| "text/plain".to_owned());

    let body = trim_part_body(body_block);

    match filename {
        Some(filename) if !filename.is_empty() => {
            form.add_file(name, UploadedFile { filename, content_type, data: body.to_vec() });
        }
        _ => {
            form.add_field(name, String::from_utf8_lossy(body).into_owned());
        }
    }
}

/// Strips the trailing boundary artifact (`\r\n--`) and trailing ASCII
/// whitespace left behind by the split.
fn trim_part_body(body: &[u8]) -> &[u8] {
    let mut body = body.strip_suffix(b"\r\n--").unwrap_or(body);
    while let [rest @ .., last] = body {
        if last.is_ascii_whitespace() {
            body = rest;
        } else {
            break;
        }
    }
    body
}

/// Drops everything at and after the `--boundary--` epilogue marker.
fn strip_terminal<'a>(part: &'a [u8], terminal: &[u8]) -> &'a [u8] {
    match find(part, terminal) {
        Some(i) => &part[..i],
        None => part,
    }
}

/// Extracts a `key="value"` or `key=value` attribute from a header such as
/// `Content-Disposition: form-data; name="file"; filename="a.png"`.
fn attribute(header: &str, key: &str) -> Option<String> {
    for item in header.split(';') {
        let item = item.trim();
        if let Some(value) = item.strip_prefix(key).and_then(|rest| rest.strip_prefix('=')) {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            return Some(value.to_owned());
        }
    }
    None
}

/// Byte-slice substring search.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Iterator over the chunks of `haystack` delimited by `needle`.
fn split_on<'a>(haystack: &'a [u8], needle: &'a [u8]) -> impl Iterator<Item = &'a [u8]> {
    let mut rest = Some(haystack);
    std::iter::from_fn(move || {
        let current = rest?;
        match find(current, needle) {
            Some(i) => {
                rest = Some(&current[i + needle.len()..]);
                Some(&current[..i])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}
