use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest `Content-Length` body accepted.
const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// How a message arrived on stdio. Replies go out the same way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Framing {
    /// One JSON document per line (MCP stdio transport)
    Line,
    /// LSP-style `Content-Length` header block followed by the body
    ContentLength,
}

#[derive(Debug)]
pub struct Frame {
    pub framing: Framing,
    pub body: Result<Value, serde_json::Error>,
}

/// Reads the next message. `Ok(None)` on clean EOF.
///
/// A body that fails to parse is still returned as a frame so the caller can
/// answer with a JSON-RPC parse error; only broken framing is an I/O error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut in_headers = false;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if !in_headers {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if !in_headers {
            let candidate = line.trim();
            if candidate.is_empty() {
                continue;
            }
            if !is_content_length_header(candidate) {
                return Ok(Some(Frame {
                    framing: Framing::Line,
                    body: serde_json::from_str(candidate),
                }));
            }
            in_headers = true;
        }

        if line.is_empty() {
            break;
        }
        if line.to_ascii_lowercase().starts_with("content-length:") {
            let raw_len = line
                .split_once(':')
                .map(|(_, right)| right.trim())
                .unwrap_or_default();
            let parsed = raw_len.parse::<usize>().map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "Invalid Content-Length header",
                )
            })?;
            if parsed > MAX_FRAME_BYTES {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Content-Length {parsed} exceeds {MAX_FRAME_BYTES} bytes"),
                ));
            }
            content_length = Some(parsed);
        }
    }

    let content_length = content_length.ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Missing Content-Length header",
        )
    })?;
    let mut payload = vec![0_u8; content_length];
    reader.read_exact(&mut payload).await?;

    Ok(Some(Frame {
        framing: Framing::ContentLength,
        body: serde_json::from_slice(&payload),
    }))
}

pub async fn write_frame<W>(
    writer: &mut W,
    value: &Value,
    framing: Framing,
) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    match framing {
        Framing::Line => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
    }
    writer.flush().await?;
    Ok(())
}

fn is_content_length_header(line: &str) -> bool {
    line.get(..15)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("content-length:"))
}
