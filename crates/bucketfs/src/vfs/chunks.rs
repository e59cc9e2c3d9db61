//! Pull-based chunked reader for large files.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures::Stream;

use super::store::ObjectReader;
use super::{VfsError, VfsResult};

/// Default chunk size for streamed reads.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Fixed-size chunks of one open object.
///
/// The reader stays open until the stream is exhausted, [`close`]d, fails,
/// or is dropped. Each [`FileSystem::read`](super::FileSystem::read) call
/// opens a fresh stream.
///
/// [`close`]: ChunkStream::close
pub struct ChunkStream {
    path: String,
    reader: Option<Box<dyn ObjectReader>>,
    chunk_size: usize,
    size: u64,
}

impl std::fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream")
            .field("path", &self.path)
            .field("open", &self.reader.is_some())
            .field("chunk_size", &self.chunk_size)
            .field("size", &self.size)
            .finish()
    }
}

impl ChunkStream {
    pub fn new(path: impl Into<String>, reader: Box<dyn ObjectReader>, chunk_size: usize) -> Self {
        let size = reader.size();
        Self {
            path: path.into(),
            reader: Some(reader),
            chunk_size: chunk_size.max(1),
            size,
        }
    }

    /// Backend path being streamed.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Total object size.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns true while the underlying reader is held.
    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Next chunk of at most `chunk_size` bytes; `None` once exhausted.
    ///
    /// The reader is released on exhaustion and on error.
    pub async fn next_chunk(&mut self) -> VfsResult<Option<Vec<u8>>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        match reader.read_chunk(self.chunk_size).await {
            Ok(Some(chunk)) if !chunk.is_empty() => Ok(Some(chunk)),
            Ok(_) => {
                self.close().await?;
                Ok(None)
            }
            Err(e) => {
                self.reader = None;
                Err(e)
            }
        }
    }

    /// Next chunk, base64-encoded.
    pub async fn next_base64(&mut self) -> VfsResult<Option<String>> {
        Ok(self.next_chunk().await?.map(|chunk| STANDARD.encode(chunk)))
    }

    /// Release the reader early. Further calls yield `None`.
    pub async fn close(&mut self) -> VfsResult<()> {
        match self.reader.take() {
            Some(reader) => {
                tracing::trace!(path = %self.path, "closing chunk stream");
                reader.close().await
            }
            None => Ok(()),
        }
    }

    /// Adapt into a `futures::Stream` of raw chunks.
    pub fn into_stream(self) -> impl Stream<Item = VfsResult<Vec<u8>>> + Send {
        futures::stream::try_unfold(self, |mut chunks| async move {
            Ok::<_, VfsError>(chunks.next_chunk().await?.map(|chunk| (chunk, chunks)))
        })
    }
}
