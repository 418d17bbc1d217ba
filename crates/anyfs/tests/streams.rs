use std::sync::Arc;

use anyfs::stream::into_stream;
use anyfs::{pipe, AnyFs, Capabilities, Capability, LocalAdapter, MemoryAdapter};
use futures::TryStreamExt;
use tempfile::tempdir;

fn memory(capabilities: Capabilities) -> AnyFs {
    AnyFs::new(Arc::new(MemoryAdapter::with_capabilities(capabilities))).unwrap()
}

fn buffer_only() -> AnyFs {
    memory(Capabilities::empty().with(Capability::NativeBuffer))
}

fn stream_only() -> AnyFs {
    memory(Capabilities::empty().with(Capability::NativeStream))
}

#[tokio::test]
async fn pipe_on_buffer_only_backend() {
    let fs = buffer_only();
    fs.write_file("/in.txt", "buffered payload").await.unwrap();

    let mut reader = fs.create_read_stream("/in.txt").await.unwrap();
    let mut writer = fs.create_write_stream("/out/copy.txt").await.unwrap();
    let copied = pipe(reader.as_mut(), writer.as_mut()).await.unwrap();

    assert_eq!(copied, 16);
    assert_eq!(fs.read_to_string("/out/copy.txt").await.unwrap(), "buffered payload");
}

#[tokio::test]
async fn buffer_calls_on_stream_only_backend() {
    let fs = stream_only();
    let data = vec![7u8; 200 * 1024];

    fs.write_file("/nested/blob.bin", &data).await.unwrap();
    assert_eq!(fs.read_file("/nested/blob.bin").await.unwrap(), data);
    assert_eq!(
        fs.metadata("/nested/blob.bin").await.unwrap().size,
        Some(data.len() as u64)
    );
}

#[tokio::test]
async fn read_stream_yields_chunks() {
    let fs = stream_only();
    let data: Vec<u8> = (0..=255u8).cycle().take(150 * 1024).collect();
    fs.write_file("/big", &data).await.unwrap();

    let reader = fs.create_read_stream("/big").await.unwrap();
    let chunks: Vec<Vec<u8>> = into_stream(reader).try_collect().await.unwrap();

    assert!(chunks.len() > 1);
    assert!(chunks.iter().all(|c| !c.is_empty()));
    assert_eq!(chunks.concat(), data);
}

#[tokio::test]
async fn failed_read_never_commits_the_write() {
    let fs = buffer_only();

    let mut reader = fs.create_read_stream("/missing").await.unwrap();
    let mut writer = fs.create_write_stream("/dest/out").await.unwrap();
    let err = pipe(reader.as_mut(), writer.as_mut()).await.unwrap_err();

    assert_eq!(err.code(), "ENOENT");
    assert!(!fs.exists("/dest/out").await.unwrap());
    // the parent was prepared when the stream was opened
    assert!(fs.exists("/dest").await.unwrap());
}

#[tokio::test]
async fn write_stream_rejects_directories() {
    let fs = stream_only();
    fs.mkdir("/dir").await.unwrap();

    let err = fs.create_write_stream("/dir").await.err().unwrap();
    assert_eq!(err.code(), "EISDIR");
}

#[tokio::test]
async fn no_content_shape_is_not_implemented() {
    let fs = memory(Capabilities::empty());

    assert_eq!(fs.read_file("/x").await.unwrap_err().code(), "ENOTIMPLEMENTED");
    assert_eq!(fs.write_file("/x", "y").await.unwrap_err().code(), "ENOTIMPLEMENTED");
    assert_eq!(
        fs.create_read_stream("/x").await.err().unwrap().code(),
        "ENOTIMPLEMENTED"
    );
    // directory primitives still work
    fs.mkdir_parents("/a/b").await.unwrap();
}

#[tokio::test]
async fn pipe_between_memory_and_disk() {
    let dir = tempdir().unwrap();
    let disk = AnyFs::new(Arc::new(LocalAdapter::new(dir.path()).unwrap())).unwrap();
    let mem = buffer_only();
    mem.write_file("/notes/today.md", "# notes\n").await.unwrap();

    let mut reader = mem.create_read_stream("/notes/today.md").await.unwrap();
    let mut writer = disk.create_write_stream("/backup/today.md").await.unwrap();
    pipe(reader.as_mut(), writer.as_mut()).await.unwrap();

    let on_disk = std::fs::read_to_string(dir.path().join("backup/today.md")).unwrap();
    assert_eq!(on_disk, "# notes\n");
}
