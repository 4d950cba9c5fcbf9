//! Paste HTTP handlers.

use crate::{error::HttpError, AppState};
use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use pastecat_core::{AppError, ByteSize, Header, PasteId, FIELD_NAME};
use std::io::Read;
use std::time::Duration;

/// Render a lifetime as `12h`, `1h30m` or `45s`.
pub(crate) fn describe_lifetime(lifetime: Duration) -> String {
    if lifetime.is_zero() {
        return "forever".to_string();
    }
    let secs = lifetime.as_secs();
    if secs == 0 {
        return format!("{}ms", lifetime.as_millis());
    }
    let (hours, minutes, seconds) = (secs / 3600, secs % 3600 / 60, secs % 60);
    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}h", hours));
    }
    if minutes > 0 {
        out.push_str(&format!("{}m", minutes));
    }
    if seconds > 0 {
        out.push_str(&format!("{}s", seconds));
    }
    out
}

/// Usage banner served at `/`.
pub async fn index(State(state): State<AppState>) -> String {
    let config = state.ctx.config();
    let site = &config.site_url;
    let kept = match describe_lifetime(config.lifetime).as_str() {
        "forever" => "kept until the server runs out of room".to_string(),
        lifetime => format!("deleted after {}", lifetime),
    };
    format!(
        "pastecat\n\n\
         Upload a file:        curl -F {field}=@file {site}\n\
         Upload from a pipe:   command | curl -F '{field}=<-' {site}\n\
         Download a paste:     curl {site}/<id>\n\n\
         Pastes of up to {max} are {kept}.\n",
        field = FIELD_NAME,
        site = site,
        max = config.max_size,
        kept = kept,
    )
}

fn quoted_etag(header: &Header) -> String {
    format!("\"{}\"", header.etag)
}

/// Whether an `If-None-Match` value matches `etag`.
fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
    })
}

fn content_type(content: &[u8]) -> &'static str {
    if std::str::from_utf8(content).is_ok() {
        "text/plain; charset=utf-8"
    } else {
        "application/octet-stream"
    }
}

fn cache_headers(header: &Header) -> Result<HeaderMap, HttpError> {
    let mut headers = HeaderMap::new();
    let mut insert = |name: header::HeaderName, value: String| -> Result<(), HttpError> {
        let value = HeaderValue::from_str(&value)
            .map_err(|err| HttpError::TaskFailed(format!("bad header value: {}", err)))?;
        headers.insert(name, value);
        Ok(())
    };
    insert(header::ETAG, quoted_etag(header))?;
    insert(header::LAST_MODIFIED, header.last_modified_http())?;
    match (header.expires_http(), header.remaining_secs(Utc::now())) {
        (Some(expires), Some(remaining)) => {
            insert(header::EXPIRES, expires)?;
            insert(header::CACHE_CONTROL, format!("max-age={}", remaining))?;
        }
        _ => insert(header::CACHE_CONTROL, "public".to_string())?,
    }
    Ok(headers)
}

/// Fetch a paste by id.
///
/// # Returns
/// The paste content with caching headers, or `304 Not Modified` when the
/// client already holds the current version.
///
/// # Errors
/// Returns `400` for malformed ids and `404` for unknown or expired pastes.
pub async fn get_paste(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    request_headers: HeaderMap,
) -> Result<Response, HttpError> {
    let id = PasteId::parse(&raw_id)?;
    let if_none_match = request_headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let ctx = state.ctx.clone();
    let (header, content) = tokio::task::spawn_blocking(move || {
        let mut paste = ctx.get(&id)?;
        let header = paste.header().clone();
        if if_none_match
            .as_deref()
            .is_some_and(|value| etag_matches(value, &quoted_etag(&header)))
        {
            return Ok::<_, HttpError>((header, None));
        }
        let mut content = Vec::with_capacity(paste.size() as usize);
        paste.read_to_end(&mut content).map_err(AppError::from)?;
        paste.close();
        Ok((header, Some(content)))
    })
    .await??;

    let headers = cache_headers(&header)?;
    let Some(content) = content else {
        return Ok((StatusCode::NOT_MODIFIED, headers).into_response());
    };
    let kind = HeaderValue::from_static(content_type(&content));
    Ok((headers, [(header::CONTENT_TYPE, kind)], content).into_response())
}

/// Store the `paste` field of a multipart form.
///
/// # Returns
/// The URL of the new paste followed by a newline.
///
/// # Errors
/// Returns `400` for malformed forms or empty pastes, `413` for oversized
/// pastes and `503` when the store is full.
pub async fn create_paste(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<String, HttpError> {
    let mut content = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FIELD_NAME) {
            content = Some(field.bytes().await?);
            break;
        }
    }
    let content = content.ok_or(HttpError::MissingForm)?;
    let size = ByteSize(content.len() as u64);

    let ctx = state.ctx.clone();
    let id = tokio::task::spawn_blocking(move || ctx.put(&content)).await??;
    tracing::info!("Created a new paste: {} ({})", id, size);
    Ok(format!("{}/{}\n", state.ctx.config().site_url, id))
}
