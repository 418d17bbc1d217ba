//! Stream/buffer bridging
//!
//! Backends expose whole-buffer I/O, streaming handles, or both. The helpers
//! here synthesize whichever shape is missing:
//! - a buffered read handle fetches the whole file once and yields it as a
//!   single final chunk
//! - a buffered write handle accumulates chunks and issues one `write_file`
//!   when closed
//! - `read_to_end` / `write_all` turn handles back into buffer calls

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, Stream};

use crate::backend::{Adapter, ReadChunk, ReadHandle, WriteHandle};
use crate::error::{FsError, FsResult};

enum ReadState {
    Pending,
    Done,
}

/// Read handle over a backend that only has `read_file`
pub struct BufferedReadHandle {
    adapter: Arc<dyn Adapter>,
    path: String,
    state: ReadState,
    size: Option<u64>,
}

impl BufferedReadHandle {
    pub fn new(adapter: Arc<dyn Adapter>, path: impl Into<String>) -> Self {
        Self {
            adapter,
            path: path.into(),
            state: ReadState::Pending,
            size: None,
        }
    }
}

#[async_trait]
impl ReadHandle for BufferedReadHandle {
    async fn read_chunk(&mut self) -> FsResult<ReadChunk> {
        match self.state {
            ReadState::Pending => {
                let data = self.adapter.read_file(&self.path).await?;
                self.size = Some(data.len() as u64);
                self.state = ReadState::Done;
                Ok(ReadChunk {
                    data,
                    offset: 0,
                    is_last: true,
                })
            }
            ReadState::Done => Ok(ReadChunk {
                data: Vec::new(),
                offset: self.size.unwrap_or(0),
                is_last: true,
            }),
        }
    }

    fn size(&self) -> Option<u64> {
        self.size
    }

    async fn close(&mut self) -> FsResult<()> {
        self.state = ReadState::Done;
        Ok(())
    }
}

/// Write handle over a backend that only has `write_file`
pub struct BufferedWriteHandle {
    adapter: Arc<dyn Adapter>,
    path: String,
    buffer: Vec<u8>,
    closed: bool,
}

impl BufferedWriteHandle {
    pub fn new(adapter: Arc<dyn Adapter>, path: impl Into<String>) -> Self {
        Self {
            adapter,
            path: path.into(),
            buffer: Vec::new(),
            closed: false,
        }
    }
}

#[async_trait]
impl WriteHandle for BufferedWriteHandle {
    async fn write_chunk(&mut self, data: &[u8]) -> FsResult<()> {
        if self.closed {
            return Err(FsError::Logic(format!("write after close: {}", self.path)));
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    async fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.adapter.write_file(&self.path, &self.buffer).await?;
        self.closed = true;
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.buffer.len() as u64
    }
}

/// Drain a read handle into a buffer, then close it
pub async fn read_to_end(reader: &mut dyn ReadHandle) -> FsResult<Vec<u8>> {
    let mut data = reader
        .size()
        .and_then(|size| usize::try_from(size).ok())
        .map_or_else(Vec::new, Vec::with_capacity);
    loop {
        let chunk = reader.read_chunk().await?;
        data.extend_from_slice(&chunk.data);
        if chunk.is_last {
            break;
        }
    }
    reader.close().await?;
    Ok(data)
}

/// Write a whole buffer through a write handle and close it
pub async fn write_all(writer: &mut dyn WriteHandle, data: &[u8]) -> FsResult<()> {
    writer.write_chunk(data).await?;
    writer.close().await
}

/// Copy everything from `reader` into `writer`, closing both
///
/// A read error is returned before `writer` is closed, so a buffered writer
/// never commits a partial file.
pub async fn pipe(reader: &mut dyn ReadHandle, writer: &mut dyn WriteHandle) -> FsResult<u64> {
    let mut copied = 0u64;
    loop {
        let chunk = reader.read_chunk().await?;
        if !chunk.data.is_empty() {
            writer.write_chunk(&chunk.data).await?;
            copied += chunk.data.len() as u64;
        }
        if chunk.is_last {
            break;
        }
    }
    reader.close().await?;
    writer.close().await?;
    Ok(copied)
}

/// Expose a read handle as a stream of non-empty chunks
///
/// The stream ends after the final chunk or after the first error.
pub fn into_stream(reader: Box<dyn ReadHandle>) -> impl Stream<Item = FsResult<Vec<u8>>> + Send {
    stream::unfold(Some(reader), |state| async move {
        let mut reader = state?;
        loop {
            match reader.read_chunk().await {
                Ok(chunk) if chunk.is_last => {
                    let _ = reader.close().await;
                    if chunk.data.is_empty() {
                        return None;
                    }
                    return Some((Ok(chunk.data), None));
                }
                Ok(chunk) if chunk.data.is_empty() => continue,
                Ok(chunk) => return Some((Ok(chunk.data), Some(reader))),
                Err(e) => return Some((Err(e), None)),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capabilities, Capability};
    use crate::memory::MemoryAdapter;
    use futures::StreamExt;

    fn buffer_only() -> Arc<dyn Adapter> {
        Arc::new(MemoryAdapter::with_capabilities(
            Capabilities::empty().with(Capability::NativeBuffer),
        ))
    }

    #[tokio::test]
    async fn test_buffered_read_single_chunk() {
        let adapter = buffer_only();
        adapter.write_file("/a.txt", b"hello").await.unwrap();

        let mut reader = BufferedReadHandle::new(adapter, "/a.txt");
        assert_eq!(reader.size(), None);

        let chunk = reader.read_chunk().await.unwrap();
        assert_eq!(chunk.data, b"hello");
        assert!(chunk.is_last);
        assert_eq!(reader.size(), Some(5));

        let chunk = reader.read_chunk().await.unwrap();
        assert!(chunk.data.is_empty());
        assert!(chunk.is_last);
    }

    #[tokio::test]
    async fn test_buffered_read_error_surfaces_on_first_chunk() {
        let mut reader = BufferedReadHandle::new(buffer_only(), "/missing");
        let err = reader.read_chunk().await.unwrap_err();
        assert_eq!(err.code(), "ENOENT");
    }

    #[tokio::test]
    async fn test_buffered_write_commits_on_close() {
        let adapter = buffer_only();
        let mut writer = BufferedWriteHandle::new(adapter.clone(), "/out.txt");
        writer.write_chunk(b"Hello, ").await.unwrap();
        writer.write_chunk(b"World!").await.unwrap();
        assert_eq!(writer.bytes_written(), 13);

        // nothing stored until close
        assert!(adapter.metadata("/out.txt").await.unwrap_err().is_not_found());

        writer.close().await.unwrap();
        assert_eq!(adapter.read_file("/out.txt").await.unwrap(), b"Hello, World!");

        let err = writer.write_chunk(b"late").await.unwrap_err();
        assert_eq!(err.code(), "ELOGIC");
    }

    #[tokio::test]
    async fn test_pipe_and_stream() {
        let adapter = buffer_only();
        adapter.write_file("/src", b"piped bytes").await.unwrap();

        let mut reader = BufferedReadHandle::new(adapter.clone(), "/src");
        let mut writer = BufferedWriteHandle::new(adapter.clone(), "/dst");
        let copied = pipe(&mut reader, &mut writer).await.unwrap();
        assert_eq!(copied, 11);
        assert_eq!(adapter.read_file("/dst").await.unwrap(), b"piped bytes");

        let chunks: Vec<_> = into_stream(Box::new(BufferedReadHandle::new(adapter, "/dst")))
            .collect()
            .await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap(), b"piped bytes");
    }

    #[tokio::test]
    async fn test_pipe_read_error_leaves_destination_untouched() {
        let adapter = buffer_only();
        let mut reader = BufferedReadHandle::new(adapter.clone(), "/missing");
        let mut writer = BufferedWriteHandle::new(adapter.clone(), "/dst");

        let err = pipe(&mut reader, &mut writer).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(adapter.metadata("/dst").await.unwrap_err().is_not_found());
    }
}
