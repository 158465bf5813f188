use super::ReadAt;
use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::sync::Arc;

#[cfg(unix)]
type Handle = std::fs::File;
#[cfg(not(unix))]
type Handle = std::sync::Mutex<std::fs::File>;

/// Local file reader with random access support.
///
/// Reads run on the blocking pool. The handle is closed when the reader and
/// any in-flight read have been dropped.
pub struct LocalFileReader {
    file: Arc<Handle>,
    size: u64,
}

impl LocalFileReader {
    pub async fn open(path: &Path) -> io::Result<Self> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(path)?;
            let size = file.metadata()?.len();

            #[cfg(not(unix))]
            let file = std::sync::Mutex::new(file);

            Ok::<_, io::Error>(Self {
                file: Arc::new(file),
                size,
            })
        })
        .await
        .map_err(io::Error::other)?
    }
}

fn read_blocking(file: &Handle, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileExt;
        file.read_at(buf, offset)
    }

    #[cfg(not(unix))]
    {
        use std::io::{Read, Seek, SeekFrom};
        let mut file = file
            .lock()
            .map_err(|_| io::Error::other("archive handle poisoned"))?;
        file.seek(SeekFrom::Start(offset))?;
        file.read(buf)
    }
}

#[async_trait]
impl ReadAt for LocalFileReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.size || buf.is_empty() {
            return Ok(0);
        }

        let file = Arc::clone(&self.file);
        let len = buf.len();
        let chunk = tokio::task::spawn_blocking(move || {
            let mut chunk = vec![0u8; len];
            let n = read_blocking(&file, offset, &mut chunk)?;
            chunk.truncate(n);
            Ok::<_, io::Error>(chunk)
        })
        .await
        .map_err(io::Error::other)??;

        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }

    fn size(&self) -> u64 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn reads_at_offsets_and_stops_at_eof() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello world").unwrap();
        tmp.flush().unwrap();

        let reader = LocalFileReader::open(tmp.path()).await.unwrap();
        assert_eq!(reader.size(), 11);

        let mut buf = [0u8; 5];
        reader.read_exact_at(6, &mut buf).await.unwrap();
        assert_eq!(&buf, b"world");

        let mut past = [0u8; 4];
        assert_eq!(reader.read_at(11, &mut past).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn short_read_near_the_end() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"abc").unwrap();
        tmp.flush().unwrap();

        let reader = LocalFileReader::open(tmp.path()).await.unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(reader.read_at(1, &mut buf).await.unwrap(), 2);
        assert_eq!(&buf[..2], b"bc");
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalFileReader::open(&dir.path().join("nope.zip"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
