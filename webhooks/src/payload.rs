use std::collections::HashMap;

use bytes::Bytes;
use futures::stream;
use multer::Multipart;
use serde_json::Value;
use tracing::instrument;

use crate::api::WebhookError;

/// How far into the body we look for the first boundary line when the
/// Content-Type header did not carry one.
const BOUNDARY_PEEK_BYTES: usize = 72;

/// A file part extracted from a multipart payload. Attachments keep their
/// part identity (field name, filename, content type) but are stored in
/// arrival order: filenames are not guaranteed unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Transport-agnostic result of decoding a webhook body: a multimap of form
/// fields plus the attachments, if the encoding can carry any.
#[derive(Debug, Default)]
pub struct RawPayload {
    fields: HashMap<String, Vec<String>>,
    attachments: Vec<Attachment>,
}

enum Encoding {
    Multipart(String),
    UrlEncoded,
}

impl RawPayload {
    /// Decodes a request body. The Content-Type header is not trusted: a
    /// multipart boundary is taken from it when present, sniffed from the
    /// body prefix otherwise, and anything else is parsed as URL-encoded
    /// form data.
    #[instrument(skip_all, fields(len = body.len()))]
    pub async fn from_bytes(
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<RawPayload, WebhookError> {
        match sniff(content_type, &body)? {
            Encoding::Multipart(boundary) => decode_multipart(body, &boundary).await,
            Encoding::UrlEncoded => decode_urlencoded(&body),
        }
    }

    /// First value of a field, without consuming it.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values accumulated for a field.
    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Consumes a field entirely, returning its first non-empty value.
    /// Values past the first are discarded for declared fields.
    pub(crate) fn take_first(&mut self, name: &str) -> Option<String> {
        self.fields
            .remove(name)
            .and_then(|values| values.into_iter().next())
            .filter(|value| !value.is_empty())
    }

    /// Drains whatever fields are left after the declared ones were consumed,
    /// one entry per name with its first non-empty value.
    pub(crate) fn drain_custom_variables(&mut self) -> HashMap<String, Value> {
        self.fields
            .drain()
            .filter_map(|(name, values)| {
                values
                    .into_iter()
                    .next()
                    .filter(|value| !value.is_empty())
                    .map(|value| (name, Value::String(value)))
            })
            .collect()
    }

    pub(crate) fn take_attachments(&mut self) -> Vec<Attachment> {
        std::mem::take(&mut self.attachments)
    }
}

fn sniff(content_type: Option<&str>, body: &Bytes) -> Result<Encoding, WebhookError> {
    if let Some(content_type) = content_type {
        if let Ok(boundary) = multer::parse_boundary(content_type) {
            return Ok(Encoding::Multipart(boundary));
        }
    }

    // No usable header: peek at the body. Multipart bodies open with the
    // boundary line itself, "--<boundary>\r\n".
    if body.starts_with(b"--") {
        let window = &body[..body.len().min(BOUNDARY_PEEK_BYTES)];
        let newline = window
            .iter()
            .position(|&b| b == b'\n')
            .ok_or(WebhookError::BoundaryNotFound)?;
        let boundary = String::from_utf8_lossy(&window[2..newline])
            .trim()
            .to_string();
        if boundary.is_empty() {
            return Err(WebhookError::BoundaryNotFound);
        }
        return Ok(Encoding::Multipart(boundary));
    }

    Ok(Encoding::UrlEncoded)
}

async fn decode_multipart(body: Bytes, boundary: &str) -> Result<RawPayload, WebhookError> {
    let body_stream = stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
    let mut multipart = Multipart::new(body_stream, boundary);
    let mut payload = RawPayload::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::debug!("multipart parsing failed: {}", e);
        WebhookError::RequestDecodingError(e.to_string())
    })? {
        // Part identity has to be extracted before the field is consumed
        let name = field.name().map(str::to_owned);
        let filename = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(|mime| mime.to_string());

        match (name, filename) {
            (name, Some(filename)) => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| WebhookError::RequestDecodingError(e.to_string()))?;
                payload.attachments.push(Attachment {
                    name: name.unwrap_or_default(),
                    filename,
                    content_type,
                    data,
                });
            }
            (Some(name), None) => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| WebhookError::RequestDecodingError(e.to_string()))?;
                payload.fields.entry(name).or_default().push(value);
            }
            (None, None) => return Err(WebhookError::AnonymousFormPart),
        }
    }

    Ok(payload)
}

fn decode_urlencoded(body: &[u8]) -> Result<RawPayload, WebhookError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
        .map_err(|e| WebhookError::RequestParsingError(e.to_string()))?;

    let mut payload = RawPayload::default();
    for (name, value) in pairs {
        payload.fields.entry(name).or_default().push(value);
    }
    Ok(payload)
}
