//! Terminal driver: plain files on the local filesystem.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use super::{
    ConfigOption, ConfigValue, FileError, FileHandle, LockKind, OpenFlags, AccessMode, Transfer,
};
use crate::registry::{DirEntry, FileDriver, Registry};

/// Attribute bit reported for read-only files on platforms without mode bits.
pub const ATTR_READONLY: u32 = 0x01;

// ── Handle ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct LocalFile {
    file:    File,
    path:    PathBuf,
    timeout: i64,
}

impl LocalFile {
    pub fn open<P: AsRef<Path>>(path: P, flags: OpenFlags) -> io::Result<Self> {
        let mut opts = OpenOptions::new();
        match flags.access {
            AccessMode::Read      => { opts.read(true); }
            AccessMode::Write     => { opts.write(true); }
            AccessMode::ReadWrite => { opts.read(true).write(true); }
        }
        if flags.access != AccessMode::Read {
            opts.create(flags.create).truncate(flags.truncate);
        }
        Ok(Self {
            file:    opts.open(path.as_ref())?,
            path:    path.as_ref().to_path_buf(),
            timeout: -1,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileHandle for LocalFile {
    // Local files never block long enough for the timeout to matter.
    fn read(&mut self, buf: &mut [u8], _timeout: i64) -> Result<Transfer, FileError> {
        loop {
            match self.file.read(buf) {
                Ok(0) if !buf.is_empty() => return Ok(Transfer::EndOfStream),
                Ok(n) => return Ok(Transfer::Bytes(n)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn write(&mut self, buf: &[u8], _timeout: i64) -> Result<usize, FileError> {
        loop {
            match self.file.write(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<Transfer, FileError> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.read(buf, self.timeout)
    }

    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<usize, FileError> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.write(buf, self.timeout)
    }

    fn truncate_at(&mut self, offset: u64) -> Result<(), FileError> {
        Ok(self.file.set_len(offset)?)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, FileError> {
        Ok(self.file.seek(pos)?)
    }

    fn size(&mut self) -> Result<u64, FileError> {
        Ok(self.file.metadata()?.len())
    }

    fn eof(&mut self) -> bool {
        match (self.file.stream_position(), self.file.metadata()) {
            (Ok(pos), Ok(meta)) => pos >= meta.len(),
            _                   => true,
        }
    }

    fn flush(&mut self, _dirty: bool) -> Result<(), FileError> {
        Ok(self.file.flush()?)
    }

    fn commit(&mut self) -> Result<(), FileError> {
        Ok(self.file.sync_all()?)
    }

    fn lock(&mut self, _start: u64, _len: u64, _kind: LockKind) -> Result<bool, FileError> {
        Err(FileError::Unsupported)
    }

    fn lock_test(&mut self, _start: u64, _len: u64, _kind: LockKind) -> Result<bool, FileError> {
        Err(FileError::Unsupported)
    }

    fn configure(&mut self, option: ConfigOption) -> Result<ConfigValue, FileError> {
        match option {
            ConfigOption::Timeout(new) => {
                let old = self.timeout;
                if let Some(t) = new {
                    self.timeout = t;
                }
                Ok(ConfigValue::Int(old))
            }
            ConfigOption::IoName => Ok(ConfigValue::Text(self.path.display().to_string())),
            ConfigOption::ReadHandle | ConfigOption::WriteHandle => {
                Ok(ConfigValue::Int(self.handle().unwrap_or(-1)))
            }
            _ => Err(FileError::Unsupported),
        }
    }

    #[cfg(unix)]
    fn handle(&self) -> Option<i64> {
        use std::os::unix::io::AsRawFd;
        Some(self.file.as_raw_fd() as i64)
    }

    #[cfg(not(unix))]
    fn handle(&self) -> Option<i64> {
        None
    }

    fn close(self: Box<Self>) -> Result<(), FileError> {
        // `File` reports nothing on drop; surface pending write errors here.
        let mut file = self.file;
        file.flush()?;
        Ok(())
    }
}

// ── Driver ───────────────────────────────────────────────────────────────────

/// Accepts every name; maps it straight onto the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDriver;

impl FileDriver for LocalDriver {
    fn name(&self) -> &'static str { "local" }

    fn accept(&self, _name: &str) -> bool { true }

    fn open(&self, _: &Registry, name: &str, flags: OpenFlags) -> Result<Box<dyn FileHandle>, FileError> {
        Ok(Box::new(LocalFile::open(name, flags)?))
    }

    fn exists(&self, _: &Registry, name: &str) -> Result<bool, FileError> {
        Ok(fs::metadata(name).map(|m| m.is_file()).unwrap_or(false))
    }

    fn delete(&self, _: &Registry, name: &str) -> Result<(), FileError> {
        Ok(fs::remove_file(name)?)
    }

    fn rename(&self, _: &Registry, from: &str, to: &str) -> Result<(), FileError> {
        Ok(fs::rename(from, to)?)
    }

    fn copy(&self, _: &Registry, src: &str, dst: &str) -> Result<u64, FileError> {
        Ok(fs::copy(src, dst)?)
    }

    fn dir_exists(&self, _: &Registry, name: &str) -> Result<bool, FileError> {
        Ok(fs::metadata(name).map(|m| m.is_dir()).unwrap_or(false))
    }

    fn dir_make(&self, _: &Registry, name: &str) -> Result<(), FileError> {
        Ok(fs::create_dir(name)?)
    }

    fn dir_remove(&self, _: &Registry, name: &str) -> Result<(), FileError> {
        Ok(fs::remove_dir(name)?)
    }

    fn directory(&self, _: &Registry, name: &str) -> Result<Vec<DirEntry>, FileError> {
        let mut out = Vec::new();
        for entry in fs::read_dir(name)? {
            let entry = entry?;
            let meta  = entry.metadata()?;
            out.push(DirEntry {
                name:     entry.file_name().to_string_lossy().into_owned(),
                size:     meta.len(),
                modified: meta.modified().ok().map(DateTime::<Local>::from),
                attr:     attr_of(&meta),
                is_dir:   meta.is_dir(),
            });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn time_get(&self, _: &Registry, name: &str) -> Result<DateTime<Local>, FileError> {
        Ok(DateTime::<Local>::from(fs::metadata(name)?.modified()?))
    }

    fn time_set(&self, _: &Registry, name: &str, time: DateTime<Local>) -> Result<(), FileError> {
        let file = OpenOptions::new().write(true).open(name)?;
        Ok(file.set_modified(time.into())?)
    }

    fn attr_get(&self, _: &Registry, name: &str) -> Result<u32, FileError> {
        Ok(attr_of(&fs::metadata(name)?))
    }

    fn attr_set(&self, _: &Registry, name: &str, attr: u32) -> Result<(), FileError> {
        let mut perms = fs::metadata(name)?.permissions();
        set_attr(&mut perms, attr);
        Ok(fs::set_permissions(name, perms)?)
    }

    fn link(&self, _: &Registry, existing: &str, new_name: &str) -> Result<(), FileError> {
        Ok(fs::hard_link(existing, new_name)?)
    }

    #[cfg(unix)]
    fn link_sym(&self, _: &Registry, target: &str, new_name: &str) -> Result<(), FileError> {
        Ok(std::os::unix::fs::symlink(target, new_name)?)
    }

    #[cfg(not(unix))]
    fn link_sym(&self, _: &Registry, _target: &str, _new_name: &str) -> Result<(), FileError> {
        Err(FileError::Unsupported)
    }

    fn link_read(&self, _: &Registry, name: &str) -> Result<String, FileError> {
        Ok(fs::read_link(name)?.to_string_lossy().into_owned())
    }
}

#[cfg(unix)]
fn attr_of(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn attr_of(meta: &fs::Metadata) -> u32 {
    if meta.permissions().readonly() { ATTR_READONLY } else { 0 }
}

#[cfg(unix)]
fn set_attr(perms: &mut fs::Permissions, attr: u32) {
    use std::os::unix::fs::PermissionsExt;
    perms.set_mode(attr);
}

#[cfg(not(unix))]
fn set_attr(perms: &mut fs::Permissions, attr: u32) {
    perms.set_readonly(attr & ATTR_READONLY != 0);
}
