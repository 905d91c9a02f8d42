//! Server-sent-event parsing for streamed chat completions.

use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use docuchat_core::error::{Error, Result};

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// What a single SSE line means for the token stream.
#[derive(Debug, PartialEq)]
pub enum SseLine {
    Token(String),
    Skip,
    Done,
}

/// Parse one `data:` line of an OpenAI-style stream.
pub fn parse_line(line: &str) -> Result<SseLine> {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else { return Ok(SseLine::Skip) };
    let data = data.trim();
    if data.is_empty() { return Ok(SseLine::Skip); }
    if data == "[DONE]" { return Ok(SseLine::Done); }

    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| Error::generation_unavailable(format!("malformed stream chunk: {e}")))?;
    let content = chunk.choices.into_iter().next().and_then(|c| c.delta.content).unwrap_or_default();
    if content.is_empty() { Ok(SseLine::Skip) } else { Ok(SseLine::Token(content)) }
}

/// Split a byte stream into complete lines. A trailing partial line is
/// emitted when the byte stream ends.
///
/// Bytes are buffered until a newline arrives, so a UTF-8 character split
/// across network chunks is decoded whole.
pub fn lines<S, B, E>(bytes: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    stream::unfold((Box::pin(bytes), Vec::<u8>::new(), false), |(mut bytes, mut buffer, mut ended)| async move {
        loop {
            if let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=pos).collect();
                match decode_line(raw) {
                    Ok(line) if line.trim().is_empty() => continue,
                    res => return Some((res, (bytes, buffer, ended))),
                }
            }
            if ended {
                if buffer.is_empty() { return None; }
                let res = decode_line(std::mem::take(&mut buffer));
                if matches!(&res, Ok(line) if line.trim().is_empty()) { return None; }
                return Some((res, (bytes, buffer, ended)));
            }
            match bytes.next().await {
                Some(Ok(chunk)) => buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    ended = true;
                    buffer.clear();
                    return Some((Err(Error::generation_unavailable(format!("stream read error: {e}"))), (bytes, buffer, ended)));
                }
                None => ended = true,
            }
        }
    })
}

fn decode_line(raw: Vec<u8>) -> Result<String> {
    let line = String::from_utf8(raw).map_err(|e| Error::generation_unavailable(format!("stream is not UTF-8: {e}")))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Turn a byte stream of SSE frames into content tokens, stopping at `[DONE]`.
pub fn tokens<S, B, E>(bytes: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    lines(bytes)
        .map(|line| line.and_then(|l| parse_line(&l)))
        .take_while(|parsed| futures::future::ready(!matches!(parsed, Ok(SseLine::Done))))
        .filter_map(|parsed| async move {
            match parsed {
                Ok(SseLine::Token(t)) => Some(Ok(t)),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            }
        })
}
