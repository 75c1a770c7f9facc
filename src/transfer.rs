//! Chunked file transfer over the frame transport plus the on-disk layout of
//! uploaded games.
//!
//! ```text
//! <root>/
//!   .archives/<name>.zip     developer archive as uploaded, never served
//!   .staging/                in-flight uploads and extractions
//!   <name>/client/           extracted player side
//!   <name>/server/           extracted match server, working dir of spawned matches
//!   <name>.zip               player archive (the client tree, paths relative to client/)
//! ```

use bytes::Bytes;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::lobby_errors::LobbyErr;
use crate::packet::{recv_frame, send_frame, LobbyFramed, LobbyStream, CHUNK_SIZE};

pub const CLIENT_DIR: &str = "client";
pub const SERVER_DIR: &str = "server";

#[derive(Debug, Error)]
pub enum ArchiveErr {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("entry escapes the extraction root: {0}")]
    UnsafePath(String),

    #[error("archive has no `client` directory")]
    MissingClientTree,
}

impl ArchiveErr {
    /// Whether the uploaded bytes are to blame (as opposed to the server's filesystem).
    pub fn is_invalid_archive(&self) -> bool {
        !matches!(self, ArchiveErr::Io(_))
    }
}

/// Paths of an installed game, as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledGame {
    pub archive_path: String,
    pub client_archive_path: String,
}

#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn game_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn server_dir(&self, name: &str) -> PathBuf {
        self.game_dir(name).join(SERVER_DIR)
    }

    pub fn client_archive(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.zip", name))
    }

    pub fn developer_archive(&self, name: &str) -> PathBuf {
        self.root.join(".archives").join(format!("{}.zip", name))
    }

    fn staging_root(&self) -> PathBuf {
        self.root.join(".staging")
    }

    /// Fresh, unique path for an incoming upload.
    pub fn staging_file(&self, name: &str) -> PathBuf {
        self.staging_root()
            .join(format!("{}-{}.upload", name, uuid::Uuid::new_v4()))
    }

    fn staging_dir(&self, name: &str) -> PathBuf {
        self.staging_root()
            .join(format!("{}-{}", name, uuid::Uuid::new_v4()))
    }

    /// Create the directory skeleton. Safe to call repeatedly.
    pub async fn prepare(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(self.root.join(".archives")).await?;
        tokio::fs::create_dir_all(self.staging_root()).await?;
        Ok(())
    }
}

/// Read binary frames until exactly `total` bytes were written to `dest`.
///
/// A frame that would overshoot `total` is a protocol violation. On error the
/// partially written file is left for the caller to remove.
pub async fn receive_to_file<S: LobbyStream>(
    framed: &mut LobbyFramed<S>,
    total: u64,
    dest: &Path,
) -> Result<(), LobbyErr> {
    let mut file = tokio::fs::File::create(dest).await?;
    let mut received: u64 = 0;

    while received < total {
        let chunk = recv_frame(framed).await?;
        received += chunk.len() as u64;
        if received > total {
            return Err(LobbyErr::Protocol(format!(
                "received {} bytes, {} were announced",
                received, total
            )));
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    file.sync_all().await?;
    debug!(target: "transfer", "Received {} bytes into {}", total, dest.display());
    Ok(())
}

/// Stream the first `size` bytes of `path` as frames of at most [`CHUNK_SIZE`] bytes.
pub async fn stream_file<S: LobbyStream>(
    framed: &mut LobbyFramed<S>,
    path: &Path,
    size: u64,
) -> Result<(), LobbyErr> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut sent: u64 = 0;

    while sent < size {
        let want = (size - sent).min(CHUNK_SIZE as u64) as usize;
        let n = file.read(&mut buf[..want]).await?;
        if n == 0 {
            // The announced size can no longer be honoured
            return Err(LobbyErr::Internal(format!(
                "{} shrank to {} bytes while streaming {}",
                path.display(),
                sent,
                size
            )));
        }
        send_frame(framed, Bytes::copy_from_slice(&buf[..n])).await?;
        sent += n as u64;
    }

    debug!(target: "transfer", "Streamed {} bytes from {}", size, path.display());
    Ok(())
}

/// Unpack `archive` below `dest`, refusing entries that would land outside of it.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<(), ArchiveErr> {
    let mut zip = ZipArchive::new(fs::File::open(archive)?)?;
    fs::create_dir_all(dest)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(ArchiveErr::UnsafePath(entry.name().to_string()));
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
    }
    Ok(())
}

/// Zip the contents of `src` into `archive`; entry names are relative to `src`.
pub fn package_directory(src: &Path, archive: &Path) -> Result<(), ArchiveErr> {
    let mut writer = ZipWriter::new(fs::File::create(archive)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut pending = vec![(src.to_path_buf(), String::new())];
    while let Some((dir, prefix)) = pending.pop() {
        let mut entries = fs::read_dir(&dir)?.collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let name = format!("{}{}", prefix, entry.file_name().to_string_lossy());
            if entry.file_type()?.is_dir() {
                writer.add_directory(format!("{}/", name), options)?;
                pending.push((entry.path(), format!("{}/", name)));
            } else {
                writer.start_file(name, options)?;
                let mut file = fs::File::open(entry.path())?;
                io::copy(&mut file, &mut writer)?;
            }
        }
    }

    writer.finish()?;
    Ok(())
}

/// Find the directory holding `client/`. Archives that wrap everything in a
/// single top-level folder are accepted too.
fn locate_content_root(extracted: &Path) -> Result<PathBuf, ArchiveErr> {
    if extracted.join(CLIENT_DIR).is_dir() {
        return Ok(extracted.to_path_buf());
    }

    let entries = fs::read_dir(extracted)?.collect::<Result<Vec<_>, _>>()?;
    if let [only] = entries.as_slice() {
        let nested = only.path();
        if nested.is_dir() && nested.join(CLIENT_DIR).is_dir() {
            return Ok(nested);
        }
    }
    Err(ArchiveErr::MissingClientTree)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// Install an uploaded archive as game `name`, replacing any previous install.
///
/// Extraction and repackaging happen in a private staging directory; the live
/// tree is only swapped once both succeeded, so a broken update leaves the
/// current install untouched. Consumes `staged_archive`.
pub fn install_game(
    layout: &StorageLayout,
    name: &str,
    staged_archive: &Path,
) -> Result<InstalledGame, ArchiveErr> {
    let staging_dir = layout.staging_dir(name);
    let result = stage_and_swap(layout, name, staged_archive, &staging_dir);
    if let Err(err) = remove_if_exists(&staging_dir) {
        warn!(target: "transfer", "Could not clean {}: {}", staging_dir.display(), err);
    }
    result
}

fn stage_and_swap(
    layout: &StorageLayout,
    name: &str,
    staged_archive: &Path,
    staging_dir: &Path,
) -> Result<InstalledGame, ArchiveErr> {
    let extracted = staging_dir.join("tree");
    extract_archive(staged_archive, &extracted)?;
    let content_root = locate_content_root(&extracted)?;

    let staged_client_archive = staging_dir.join("client.zip");
    package_directory(&content_root.join(CLIENT_DIR), &staged_client_archive)?;

    let game_dir = layout.game_dir(name);
    let client_archive = layout.client_archive(name);
    let developer_archive = layout.developer_archive(name);

    remove_if_exists(&game_dir)?;
    fs::rename(&content_root, &game_dir)?;
    fs::rename(&staged_client_archive, &client_archive)?;
    if let Some(parent) = developer_archive.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(staged_archive, &developer_archive)?;

    debug!(target: "transfer", "Installed {} into {}", name, game_dir.display());
    Ok(InstalledGame {
        archive_path: developer_archive.to_string_lossy().into_owned(),
        client_archive_path: client_archive.to_string_lossy().into_owned(),
    })
}

/// Remove the extraction tree and both archive forms of `name`. Missing pieces are fine.
pub fn remove_game_files(layout: &StorageLayout, name: &str) -> Result<(), ArchiveErr> {
    remove_if_exists(&layout.game_dir(name))?;
    remove_if_exists(&layout.client_archive(name))?;
    remove_if_exists(&layout.developer_archive(name))?;
    Ok(())
}

/// Run a blocking archive job on the blocking pool.
pub async fn run_blocking<T, F>(job: F) -> Result<Result<T, ArchiveErr>, LobbyErr>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ArchiveErr> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|err| LobbyErr::Internal(format!("archive task failed: {}", err)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::packet::FrameCodec;
    use std::io::Write;
    use tokio::io::duplex;
    use tokio_util::codec::Framed;

    /// Build a zip at `archive` holding `files` (path, contents).
    pub(crate) fn write_zip(archive: &Path, files: &[(&str, &[u8])]) {
        let mut writer = ZipWriter::new(fs::File::create(archive).unwrap());
        for (name, contents) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn file_transfer_splits_into_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.bin");
        let payload: Vec<u8> = (0..(CHUNK_SIZE * 2 + 123)).map(|i| (i % 253) as u8).collect();
        fs::write(&source, &payload).unwrap();

        let (client, server) = duplex(256 * 1024);
        let mut tx = Framed::new(client, FrameCodec::new());
        let mut rx = Framed::new(server, FrameCodec::new());

        let dest = dir.path().join("dest.bin");
        let size = payload.len() as u64;
        let (sent, received) = tokio::join!(
            stream_file(&mut tx, &source, size),
            receive_to_file(&mut rx, size, &dest)
        );
        sent.unwrap();
        received.unwrap();
        assert_eq!(fs::read(&dest).unwrap(), payload);
    }

    #[tokio::test]
    async fn overshooting_the_announced_size_is_a_protocol_violation() {
        let dir = tempfile::tempdir().unwrap();
        let (client, server) = duplex(1024);
        let mut tx = Framed::new(client, FrameCodec::new());
        let mut rx = Framed::new(server, FrameCodec::new());

        send_frame(&mut tx, Bytes::from_static(b"0123456789")).await.unwrap();
        let result = receive_to_file(&mut rx, 4, &dir.path().join("dest.bin")).await;
        assert!(matches!(result, Err(LobbyErr::Protocol(_))));
    }

    #[test]
    fn install_splits_client_tree_into_player_archive() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("uploaded"));
        fs::create_dir_all(layout.root().join(".staging")).unwrap();

        let upload = layout.staging_file("Foo");
        write_zip(
            &upload,
            &[
                ("client/run.py", b"print('client')"),
                ("client/assets/logo.txt", b"logo"),
                ("server/game_server.py", b"print('server')"),
            ],
        );

        let installed = install_game(&layout, "Foo", &upload).unwrap();
        assert!(!upload.exists());
        assert!(layout.server_dir("Foo").join("game_server.py").is_file());
        assert_eq!(
            PathBuf::from(&installed.client_archive_path),
            layout.client_archive("Foo")
        );

        let unpacked = dir.path().join("player");
        extract_archive(&layout.client_archive("Foo"), &unpacked).unwrap();
        assert_eq!(fs::read(unpacked.join("run.py")).unwrap(), b"print('client')");
        assert_eq!(fs::read(unpacked.join("assets/logo.txt")).unwrap(), b"logo");
        assert!(!unpacked.join("server").exists());
        assert!(!unpacked.join("game_server.py").exists());
    }

    #[test]
    fn single_wrapper_directory_is_unwrapped() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        let upload = dir.path().join("wrapped.zip");
        write_zip(&upload, &[("Foo/client/run.py", b"x"), ("Foo/server/main.py", b"y")]);

        install_game(&layout, "Foo", &upload).unwrap();
        assert!(layout.game_dir("Foo").join("client/run.py").is_file());
        assert!(layout.server_dir("Foo").join("main.py").is_file());
    }

    #[test]
    fn broken_update_keeps_current_install() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());

        let first = dir.path().join("first.zip");
        write_zip(&first, &[("client/run.py", b"v1")]);
        install_game(&layout, "Foo", &first).unwrap();

        let second = dir.path().join("second.zip");
        write_zip(&second, &[("server/only.py", b"v2")]);
        let err = install_game(&layout, "Foo", &second).unwrap_err();
        assert!(matches!(err, ArchiveErr::MissingClientTree));
        assert!(err.is_invalid_archive());
        assert_eq!(fs::read(layout.game_dir("Foo").join("client/run.py")).unwrap(), b"v1");
    }

    #[test]
    fn garbage_is_an_invalid_archive() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        let upload = dir.path().join("garbage.zip");
        fs::write(&upload, b"definitely not a zip file").unwrap();

        let err = install_game(&layout, "Foo", &upload).unwrap_err();
        assert!(err.is_invalid_archive());
    }

    #[test]
    fn escaping_entries_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        write_zip(&archive, &[("../evil.txt", b"boom")]);

        let err = extract_archive(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, ArchiveErr::UnsafePath(_)));
        assert!(!dir.path().join("evil.txt").exists());
    }

    #[test]
    fn removing_files_tolerates_missing_pieces() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path());
        let upload = dir.path().join("foo.zip");
        write_zip(&upload, &[("client/run.py", b"x")]);
        install_game(&layout, "Foo", &upload).unwrap();

        fs::remove_file(layout.developer_archive("Foo")).unwrap();
        remove_game_files(&layout, "Foo").unwrap();
        assert!(!layout.game_dir("Foo").exists());
        assert!(!layout.client_archive("Foo").exists());
        remove_game_files(&layout, "Foo").unwrap();
    }
}
