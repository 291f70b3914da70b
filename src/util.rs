use std::path::Path;

use futures_util::StreamExt;
use reqwest::Body;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{BytesCodec, FramedRead};

use crate::error::{PostError, Result};
use crate::tiktok_api::TRANSFER_TIMEOUT;

pub fn file_to_body(file: tokio::fs::File) -> Body {
    let stream = FramedRead::new(file, BytesCodec::new());
    let body = Body::wrap_stream(stream);
    body
}

/// A source video fetched to local disk, removed on drop.
#[derive(Debug)]
pub struct Downloaded {
    pub file: NamedTempFile,
    pub size: u64,
    pub content_type: Option<String>,
}

/// Streams `url` into a temp file, refusing anything larger than `max_bytes`.
pub async fn download_to_temp(client: &reqwest::Client, url: &str, max_bytes: u64) -> Result<Downloaded> {
    tracing::info!(url, "downloading source video");
    let res = client
        .get(url)
        .timeout(TRANSFER_TIMEOUT)
        .send()
        .await
        .map_err(|e| PostError::Download { status: None, body: format!("{url}: {e}") })?;

    if !res.status().is_success() {
        let status = res.status().as_u16();
        let body = res.text().await.unwrap_or_default();
        return Err(PostError::Download { status: Some(status), body });
    }
    if let Some(len) = res.content_length() {
        if len > max_bytes {
            let body = format!("{url} is {len} bytes, limit is {max_bytes}");
            return Err(PostError::Download { status: None, body });
        }
    }
    let content_type = res
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let temp = NamedTempFile::new()?;
    let mut file = tokio::fs::File::from_std(temp.reopen()?);
    let mut size: u64 = 0;

    let mut stream = res.bytes_stream();
    while let Some(item) = stream.next().await {
        let bytes = item.map_err(|e| PostError::Download { status: None, body: format!("{url}: {e}") })?;
        size += bytes.len() as u64;
        if size > max_bytes {
            let body = format!("{url} exceeded {max_bytes} bytes");
            return Err(PostError::Download { status: None, body });
        }
        file.write_all(&bytes).await?;
    }
    file.flush().await?;

    Ok(Downloaded { file: temp, size, content_type })
}

/// MIME type from the file extension, `video/mp4` when unknown.
pub fn guess_mime(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "m4v" => "video/x-m4v",
        _ => "video/mp4",
    }
}

/// Last path segment of a URL, used to guess the type of downloaded videos.
pub fn filename_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.path_segments().and_then(|mut s| s.next_back()).map(str::to_owned))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "video.mp4".to_owned())
}
