mod local;

pub use local::LocalFileReader;

use async_trait::async_trait;
use std::io;

/// Trait for random access reading from a data source
#[async_trait]
pub trait ReadAt: Send + Sync {
    /// Read data at the specified offset into the buffer.
    ///
    /// Returns the number of bytes read, which is smaller than `buf.len()`
    /// only when the end of the source is reached.
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Get the total size of the data source
    fn size(&self) -> u64;

    /// Fill `buf` completely or fail with `UnexpectedEof`.
    async fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_at(offset + filled as u64, &mut buf[filled..]).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("short read at offset {}", offset + filled as u64),
                ));
            }
            filled += n;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Chunky {
        data: Vec<u8>,
    }

    #[async_trait]
    impl ReadAt for Chunky {
        async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
            // Hand out at most three bytes per call
            let start = (offset as usize).min(self.data.len());
            let end = (start + 3).min(self.data.len()).min(start + buf.len());
            buf[..end - start].copy_from_slice(&self.data[start..end]);
            Ok(end - start)
        }

        fn size(&self) -> u64 {
            self.data.len() as u64
        }
    }

    #[tokio::test]
    async fn read_exact_at_loops_over_short_reads() {
        let reader = Chunky {
            data: b"0123456789".to_vec(),
        };
        let mut buf = [0u8; 7];
        reader.read_exact_at(2, &mut buf).await.unwrap();
        assert_eq!(&buf, b"2345678");
    }

    #[tokio::test]
    async fn read_exact_at_reports_eof() {
        let reader = Chunky {
            data: b"abc".to_vec(),
        };
        let mut buf = [0u8; 5];
        let err = reader.read_exact_at(0, &mut buf).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
