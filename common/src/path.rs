//! Turning the command-line source and destination into concrete file paths.

use std::os::unix::fs::{FileTypeExt, MetadataExt};

use tracing::instrument;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("source {0:?} does not exist")]
    SourceNotFound(std::path::PathBuf),
    #[error("source {0:?} is a directory, directory copies are not supported (copy files individually)")]
    UnsupportedSource(std::path::PathBuf),
    #[error("{0:?} is a named pipe")]
    SpecialFile(std::path::PathBuf),
    #[error("destination {0:?} already exists")]
    DestinationExists(std::path::PathBuf),
    #[error("{src:?} and {dst:?} are the same file")]
    SameFile {
        src: std::path::PathBuf,
        dst: std::path::PathBuf,
    },
    #[error("failed reading metadata from {path:?}")]
    Metadata {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Source and destination file paths ready to be handed to the copy engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub src: std::path::PathBuf,
    pub dst: std::path::PathBuf,
}

fn metadata(path: &std::path::Path) -> Result<Option<std::fs::Metadata>, Error> {
    match std::fs::metadata(path) {
        Ok(metadata) => Ok(Some(metadata)),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(Error::Metadata {
            path: path.to_owned(),
            source,
        }),
    }
}

/// Resolves `dst` against `src`.
///
/// - `dst` naming an existing directory means "copy into it": the result is `dst/<src file name>`,
///   which must not exist yet.
/// - Any other `dst` is used as given; an existing regular file there gets overwritten.
#[instrument]
pub fn resolve(src: &std::path::Path, dst: &std::path::Path) -> Result<Resolved, Error> {
    let src_metadata = metadata(src)?.ok_or_else(|| Error::SourceNotFound(src.to_owned()))?;
    if src_metadata.is_dir() {
        return Err(Error::UnsupportedSource(src.to_owned()));
    }
    if src_metadata.file_type().is_fifo() {
        return Err(Error::SpecialFile(src.to_owned()));
    }
    let dst_metadata = metadata(dst)?;
    let (dst, dst_metadata) = match dst_metadata {
        Some(dst_metadata) if dst_metadata.is_dir() => {
            let file_name = src
                .file_name()
                .ok_or_else(|| Error::UnsupportedSource(src.to_owned()))?;
            let dst = dst.join(file_name);
            tracing::debug!("destination is a directory, copying into {:?}", &dst);
            if dst.symlink_metadata().is_ok() {
                return Err(Error::DestinationExists(dst));
            }
            (dst, None)
        }
        other => (dst.to_owned(), other),
    };
    if let Some(dst_metadata) = dst_metadata {
        if dst_metadata.dev() == src_metadata.dev() && dst_metadata.ino() == src_metadata.ino() {
            return Err(Error::SameFile {
                src: src.to_owned(),
                dst,
            });
        }
        if dst_metadata.file_type().is_fifo() {
            return Err(Error::SpecialFile(dst));
        }
    }
    Ok(Resolved {
        src: src.to_owned(),
        dst,
    })
}

/// Whether `path` looks like it lives on a network share.
///
/// UNC-style paths (`\\server\share`, `//server/share`) always count. On Linux the filesystem
/// holding the path (or its parent directory, for files that don't exist yet) is checked too.
pub fn is_network_location(path: &std::path::Path) -> bool {
    let raw = path.to_string_lossy();
    if raw.starts_with(r"\\") || raw.starts_with("//") {
        return true;
    }
    let probe = if path.is_dir() {
        path
    } else {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => std::path::Path::new("."),
        }
    };
    netfs::is_network_filesystem(probe)
}

#[cfg(target_os = "linux")]
mod netfs {
    use std::os::unix::ffi::OsStrExt;

    // f_type values from linux/magic.h and the respective filesystem sources
    const NFS_SUPER_MAGIC: u32 = 0x6969;
    const SMB_SUPER_MAGIC: u32 = 0x517b;
    const CIFS_MAGIC_NUMBER: u32 = 0xff53_4d42;
    const SMB2_MAGIC_NUMBER: u32 = 0xfe53_4d42;
    const AFS_SUPER_MAGIC: u32 = 0x5346_414f;
    const CEPH_SUPER_MAGIC: u32 = 0x00c3_6400;
    const V9FS_MAGIC: u32 = 0x0102_1997;
    const FUSE_SUPER_MAGIC: u32 = 0x6573_5546;

    const NETWORK_MAGICS: &[u32] = &[
        NFS_SUPER_MAGIC,
        SMB_SUPER_MAGIC,
        CIFS_MAGIC_NUMBER,
        SMB2_MAGIC_NUMBER,
        AFS_SUPER_MAGIC,
        CEPH_SUPER_MAGIC,
        V9FS_MAGIC,
    ];

    // FUSE also hosts local filesystems (ntfs-3g, AppImage), only these subtypes are remote
    const NETWORK_FUSE_TYPES: &[&str] = &["fuse.sshfs", "fuse.rclone", "fuse.s3fs"];

    fn filesystem_magic(path: &std::path::Path) -> Option<u32> {
        let c_path = std::ffi::CString::new(path.as_os_str().as_bytes()).ok()?;
        // SAFETY: statfs is plain old data and all-zeroes is a valid value
        let mut stat: libc::statfs = unsafe { std::mem::zeroed() };
        // SAFETY: c_path is NUL terminated and stat outlives the call
        let rc = unsafe { libc::statfs(c_path.as_ptr(), &mut stat) };
        if rc != 0 {
            tracing::debug!(
                "statfs {:?} failed: {}",
                path,
                std::io::Error::last_os_error()
            );
            return None;
        }
        // f_type is signed on some targets, compare the raw 32 bits
        #[allow(clippy::unnecessary_cast)]
        let magic = stat.f_type as u32;
        Some(magic)
    }

    pub fn is_network_filesystem(path: &std::path::Path) -> bool {
        match filesystem_magic(path) {
            Some(FUSE_SUPER_MAGIC) => is_network_fuse(path),
            Some(magic) => {
                tracing::debug!("{:?} is on a filesystem with magic {:#x}", path, magic);
                NETWORK_MAGICS.contains(&magic)
            }
            None => false,
        }
    }

    fn is_network_fuse(path: &std::path::Path) -> bool {
        let mounts =
            match procfs::process::Process::myself().and_then(|process| process.mountinfo()) {
                Ok(mounts) => mounts,
                Err(error) => {
                    tracing::debug!("cannot read mountinfo: {}", &error);
                    return false;
                }
            };
        let path = match path.canonicalize() {
            Ok(path) => path,
            Err(error) => {
                tracing::debug!("cannot canonicalize {:?}: {}", path, &error);
                return false;
            }
        };
        match mount_fstype(&mounts.0, &path) {
            Some(fstype) => {
                tracing::debug!("{:?} is on a FUSE mount of type {}", path, fstype);
                NETWORK_FUSE_TYPES.contains(&fstype)
            }
            None => false,
        }
    }

    /// Filesystem type of the innermost mount holding `path`.
    pub fn mount_fstype<'a>(
        mounts: &'a [procfs::process::MountInfo],
        path: &std::path::Path,
    ) -> Option<&'a str> {
        mounts
            .iter()
            .filter(|mount| path.starts_with(&mount.mount_point))
            // later entries win ties, they are mounted on top
            .max_by_key(|mount| mount.mount_point.components().count())
            .map(|mount| mount.fs_type.as_str())
    }
}

#[cfg(not(target_os = "linux"))]
mod netfs {
    pub fn is_network_filesystem(_path: &std::path::Path) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils;

    #[test]
    fn file_to_new_file() -> anyhow::Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        let src = tmp_dir.path().join("a.txt");
        testutils::create_file(&src, b"a", 0o644);
        let dst = tmp_dir.path().join("b.txt");
        let resolved = resolve(&src, &dst)?;
        assert_eq!(resolved, Resolved { src, dst });
        Ok(())
    }

    #[test]
    fn file_over_existing_file() -> anyhow::Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        let src = tmp_dir.path().join("a.txt");
        let dst = tmp_dir.path().join("b.txt");
        testutils::create_file(&src, b"a", 0o644);
        testutils::create_file(&dst, b"b", 0o644);
        assert_eq!(resolve(&src, &dst)?.dst, dst);
        Ok(())
    }

    #[test]
    fn file_into_directory() -> anyhow::Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        let src = tmp_dir.path().join("a.txt");
        testutils::create_file(&src, b"a", 0o644);
        let dir = tmp_dir.path().join("out");
        std::fs::create_dir(&dir)?;
        assert_eq!(resolve(&src, &dir)?.dst, dir.join("a.txt"));
        Ok(())
    }

    #[test]
    fn existing_file_in_directory() -> anyhow::Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        let src = tmp_dir.path().join("a.txt");
        testutils::create_file(&src, b"new", 0o644);
        let dir = tmp_dir.path().join("out");
        std::fs::create_dir(&dir)?;
        testutils::create_file(&dir.join("a.txt"), b"old", 0o644);
        let error = resolve(&src, &dir).unwrap_err();
        assert!(matches!(error, Error::DestinationExists(ref path) if path == &dir.join("a.txt")));
        assert_eq!(std::fs::read(dir.join("a.txt"))?, b"old");
        Ok(())
    }

    #[test]
    fn dangling_symlink_in_directory_counts_as_existing() -> anyhow::Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        let src = tmp_dir.path().join("a.txt");
        testutils::create_file(&src, b"new", 0o644);
        let dir = tmp_dir.path().join("out");
        std::fs::create_dir(&dir)?;
        std::os::unix::fs::symlink(tmp_dir.path().join("nowhere"), dir.join("a.txt"))?;
        assert!(matches!(
            resolve(&src, &dir),
            Err(Error::DestinationExists(_))
        ));
        Ok(())
    }

    #[test]
    fn missing_source() -> anyhow::Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        let error = resolve(&tmp_dir.path().join("nope"), tmp_dir.path()).unwrap_err();
        assert!(matches!(error, Error::SourceNotFound(_)));
        Ok(())
    }

    #[test]
    fn directory_source() -> anyhow::Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        let src = tmp_dir.path().join("dir");
        std::fs::create_dir(&src)?;
        let error = resolve(&src, &tmp_dir.path().join("copy")).unwrap_err();
        assert!(matches!(error, Error::UnsupportedSource(_)));
        Ok(())
    }

    #[test]
    fn fifo_source() -> anyhow::Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        let fifo = tmp_dir.path().join("pipe");
        let c_path = std::ffi::CString::new(fifo.to_str().unwrap())?;
        // SAFETY: c_path is a valid NUL terminated string
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o644) }, 0);
        let error = resolve(&fifo, &tmp_dir.path().join("copy")).unwrap_err();
        assert!(matches!(error, Error::SpecialFile(_)));
        Ok(())
    }

    #[test]
    fn fifo_destination() -> anyhow::Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        let src = tmp_dir.path().join("a.txt");
        testutils::create_file(&src, b"a", 0o644);
        let fifo = tmp_dir.path().join("pipe");
        let c_path = std::ffi::CString::new(fifo.to_str().unwrap())?;
        // SAFETY: c_path is a valid NUL terminated string
        assert_eq!(unsafe { libc::mkfifo(c_path.as_ptr(), 0o644) }, 0);
        let error = resolve(&src, &fifo).unwrap_err();
        assert!(matches!(error, Error::SpecialFile(ref path) if path == &fifo));
        Ok(())
    }

    #[test]
    fn same_file() -> anyhow::Result<()> {
        let tmp_dir = tempfile::tempdir()?;
        let src = tmp_dir.path().join("a.txt");
        testutils::create_file(&src, b"keep me", 0o644);
        let alias = tmp_dir.path().join("alias.txt");
        std::os::unix::fs::symlink(&src, &alias)?;
        assert!(matches!(resolve(&src, &src), Err(Error::SameFile { .. })));
        assert!(matches!(resolve(&src, &alias), Err(Error::SameFile { .. })));
        assert_eq!(std::fs::read(&src)?, b"keep me");
        Ok(())
    }

    #[test]
    fn unc_paths_are_network() {
        assert!(is_network_location(std::path::Path::new(
            r"\\server\share\file.bin"
        )));
        assert!(is_network_location(std::path::Path::new(
            "//server/share/file.bin"
        )));
    }

    #[test]
    fn bare_file_name_probes_current_directory() {
        assert_eq!(
            is_network_location(std::path::Path::new("not-created-yet.bin")),
            netfs::is_network_filesystem(std::path::Path::new("."))
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn innermost_mount_decides_fstype() -> anyhow::Result<()> {
        use procfs::FromBufRead;
        let mountinfo = "\
22 1 8:1 / / rw,relatime shared:1 - ext4 /dev/sda1 rw
40 22 0:35 / /mnt/remote rw,nosuid shared:20 - fuse.sshfs host:/ rw,user_id=0
41 22 0:36 / /mnt/win rw,nosuid shared:21 - fuseblk /dev/sdb1 rw
42 40 0:37 / /mnt/remote/disk rw shared:22 - fuse.ntfs-3g /dev/sdc1 rw
";
        let mounts = procfs::process::MountInfos::from_buf_read(mountinfo.as_bytes())?;
        let fstype = |path: &str| netfs::mount_fstype(&mounts.0, std::path::Path::new(path));
        assert_eq!(fstype("/home/user/file"), Some("ext4"));
        assert_eq!(fstype("/mnt/remote/data/file"), Some("fuse.sshfs"));
        assert_eq!(fstype("/mnt/win/file"), Some("fuseblk"));
        assert_eq!(fstype("/mnt/remote/disk/file"), Some("fuse.ntfs-3g"));
        // a shared name prefix is not a parent mount
        assert_eq!(fstype("/mnt/remote2/file"), Some("ext4"));
        Ok(())
    }
}
