use std::io;
use std::path::Path;
use tempfile::TempPath;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::ImportError;
use crate::host::ImportSource;

/// Stream `source` into a fresh staging file inside `dir`.
///
/// Both ends are flushed and closed before returning. The staging file is
/// removed when the returned path is dropped, so a failed or cancelled copy
/// leaves nothing behind; the importer moves it onto the managed file once
/// the package has been checked.
pub(crate) async fn copy_into(
    source: &dyn ImportSource,
    dir: &Path,
    buffer_size: usize,
    cancel: &CancellationToken,
) -> Result<(TempPath, u64), ImportError> {
    let name = source.name();
    let copy_err = |e: io::Error| ImportError::Copy {
        name: name.clone(),
        dest: dir.to_path_buf(),
        source: e,
    };

    let mut input = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ImportError::Cancelled),
        opened = source.open() => opened.map_err(|e| ImportError::ResourceOpen {
            name: name.clone(),
            source: e,
        })?,
    };
    if cancel.is_cancelled() {
        return Err(ImportError::Cancelled);
    }

    fs::create_dir_all(dir).await.map_err(copy_err)?;
    let staging = {
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(".import-")
                .suffix(".zip")
                .tempfile_in(dir)
        })
        .await
        .map_err(io::Error::other)
        .and_then(|created| created)
        .map_err(copy_err)?
    };
    let (file, path) = staging.into_parts();
    let mut output = fs::File::from_std(file);
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut copied = 0u64;

    loop {
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ImportError::Cancelled),
            read = input.read(&mut buf) => read.map_err(copy_err)?,
        };
        if n == 0 {
            break;
        }
        output.write_all(&buf[..n]).await.map_err(copy_err)?;
        copied += n as u64;
    }

    output.flush().await.map_err(copy_err)?;
    output.sync_all().await.map_err(copy_err)?;
    drop(output);
    drop(input);

    make_world_readable(&path).await.map_err(copy_err)?;
    debug!(staging = %path.display(), bytes = copied, "package copied");
    Ok((path, copied))
}

/// The install service runs as another user and must be able to read the copy.
#[cfg(unix)]
async fn make_world_readable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path).await?.permissions();
    perms.set_mode(perms.mode() | 0o444);
    fs::set_permissions(path, perms).await
}

#[cfg(not(unix))]
async fn make_world_readable(_path: &Path) -> io::Result<()> {
    Ok(())
}
