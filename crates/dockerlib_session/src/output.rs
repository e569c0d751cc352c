//! Normalization of daemon output into text.
//!
//! The daemon hands output back either as one buffer or as a live stream of
//! chunks. Both are folded into a single UTF-8 string here.

use std::fmt;

use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;

use crate::error::{EngineResult, SessionResult};

/// Lazy, finite, non-restartable sequence of byte chunks.
pub type ChunkStream = BoxStream<'static, EngineResult<Bytes>>;

/// Raw output as returned by the engine.
pub enum EngineOutput {
    Buffer(Bytes),
    Stream(ChunkStream),
}

impl EngineOutput {
    pub fn buffer(data: impl Into<Bytes>) -> Self {
        Self::Buffer(data.into())
    }

    /// Wrap already available chunks as a stream.
    pub fn chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        I::IntoIter: Send + 'static,
        B: Into<Bytes>,
    {
        Self::Stream(stream::iter(chunks.into_iter().map(|c| Ok(c.into()))).boxed())
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }
}

impl fmt::Debug for EngineOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffer(b) => f.debug_tuple("Buffer").field(&b.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Vec<u8>> for EngineOutput {
    fn from(value: Vec<u8>) -> Self {
        Self::Buffer(value.into())
    }
}

impl From<&'static str> for EngineOutput {
    fn from(value: &'static str) -> Self {
        Self::Buffer(Bytes::from_static(value.as_bytes()))
    }
}

/// Decode engine output into a single string.
///
/// Streams are consumed chunk by chunk in arrival order. Each chunk must be
/// valid UTF-8 on its own; a chunk that is not fails the whole call.
pub async fn normalize(output: EngineOutput) -> SessionResult<String> {
    match output {
        EngineOutput::Buffer(data) => decode(data),
        EngineOutput::Stream(mut chunks) => {
            let mut text = String::new();
            while let Some(chunk) = chunks.next().await {
                text.push_str(&decode(chunk?)?);
            }
            Ok(text)
        }
    }
}

fn decode(data: Bytes) -> SessionResult<String> {
    Ok(String::from_utf8(data.to_vec())?)
}
