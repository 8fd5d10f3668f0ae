//! Name-resolution chain of file drivers.
//!
//! A [`Registry`] holds drivers in registration order followed by a terminal
//! [`LocalDriver`] that accepts every name.  Each name-level operation is
//! routed to the first driver whose [`FileDriver::accept`] matches.  Filter
//! drivers (like [`Bz2Driver`]) strip their own tag and resolve the rest of
//! the name through the same registry, which is why every driver call gets
//! the registry passed in.
//!
//! # Process-wide registry
//! Nothing is registered at load time.  The composition root calls [`init`]
//! once, reads the active chain through [`global`], and calls [`teardown`]
//! when done:
//!
//! ```no_run
//! use bz2io::config::DriverConfig;
//! use bz2io::file::OpenFlags;
//! use bz2io::registry;
//!
//! registry::init(DriverConfig::default())?;
//! let reg = registry::global()?;
//! let mut f = reg.open("BZ9:log.txt.bz2", OpenFlags::create())?;
//! f.write(b"hello", -1)?;
//! f.close()?;
//! registry::teardown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Local};
use tracing::debug;

use crate::config::{ConfigError, DriverConfig};
use crate::driver::Bz2Driver;
use crate::file::{FileError, FileHandle, LocalDriver, OpenFlags, Transfer};

/// Chunk size used by [`copy_stream`].
pub const COPY_CHUNK_SIZE: usize = 64 * 1024;

// ── Driver trait ─────────────────────────────────────────────────────────────

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq)]
pub struct DirEntry {
    pub name:     String,
    pub size:     u64,
    pub modified: Option<DateTime<Local>>,
    pub attr:     u32,
    pub is_dir:   bool,
}

/// A name-level driver.  `open` produces handles; every other method
/// operates on names.
pub trait FileDriver: Send + Sync {
    /// Short driver name (diagnostics only).
    fn name(&self) -> &'static str;
    fn accept(&self, name: &str) -> bool;

    fn open(&self, registry: &Registry, name: &str, flags: OpenFlags)
        -> Result<Box<dyn FileHandle>, FileError>;

    fn exists(&self, registry: &Registry, name: &str) -> Result<bool, FileError>;
    fn delete(&self, registry: &Registry, name: &str) -> Result<(), FileError>;
    fn rename(&self, registry: &Registry, from: &str, to: &str) -> Result<(), FileError>;
    /// Returns the number of bytes written to `dst`.
    fn copy(&self, registry: &Registry, src: &str, dst: &str) -> Result<u64, FileError>;

    fn dir_exists(&self, registry: &Registry, name: &str) -> Result<bool, FileError>;
    fn dir_make(&self, registry: &Registry, name: &str) -> Result<(), FileError>;
    fn dir_remove(&self, registry: &Registry, name: &str) -> Result<(), FileError>;
    fn directory(&self, registry: &Registry, name: &str) -> Result<Vec<DirEntry>, FileError>;

    fn time_get(&self, registry: &Registry, name: &str) -> Result<DateTime<Local>, FileError>;
    fn time_set(&self, registry: &Registry, name: &str, time: DateTime<Local>) -> Result<(), FileError>;
    fn attr_get(&self, registry: &Registry, name: &str) -> Result<u32, FileError>;
    fn attr_set(&self, registry: &Registry, name: &str, attr: u32) -> Result<(), FileError>;

    fn link(&self, registry: &Registry, existing: &str, new_name: &str) -> Result<(), FileError>;
    fn link_sym(&self, registry: &Registry, target: &str, new_name: &str) -> Result<(), FileError>;
    fn link_read(&self, registry: &Registry, name: &str) -> Result<String, FileError>;
}

// ── Registry ─────────────────────────────────────────────────────────────────

pub struct Registry {
    drivers:  Vec<Arc<dyn FileDriver>>,
    terminal: Arc<dyn FileDriver>,
}

impl Registry {
    /// A chain with only the local filesystem driver.
    pub fn new() -> Self {
        Self { drivers: Vec::new(), terminal: Arc::new(LocalDriver) }
    }

    /// Local filesystem plus the BZIP2 stream driver.
    pub fn with_defaults(config: DriverConfig) -> Result<Self, ConfigError> {
        let mut reg = Self::new();
        reg.register(Arc::new(Bz2Driver::new(config)?));
        Ok(reg)
    }

    /// Append a driver ahead of the terminal driver.
    pub fn register(&mut self, driver: Arc<dyn FileDriver>) {
        debug!(driver = driver.name(), "registering file driver");
        self.drivers.push(driver);
    }

    pub fn driver_names(&self) -> Vec<&'static str> {
        self.drivers.iter().map(|d| d.name())
            .chain(std::iter::once(self.terminal.name()))
            .collect()
    }

    /// First driver accepting `name`; the terminal driver otherwise.
    pub fn resolve(&self, name: &str) -> &dyn FileDriver {
        self.drivers.iter()
            .find(|d| d.accept(name))
            .unwrap_or(&self.terminal)
            .as_ref()
    }

    // ── Routed operations ───────────────────────────────────────────────────

    pub fn open(&self, name: &str, flags: OpenFlags) -> Result<Box<dyn FileHandle>, FileError> {
        self.resolve(name).open(self, name, flags)
    }

    pub fn exists(&self, name: &str) -> Result<bool, FileError> {
        self.resolve(name).exists(self, name)
    }

    pub fn delete(&self, name: &str) -> Result<(), FileError> {
        self.resolve(name).delete(self, name)
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<(), FileError> {
        self.resolve(from).rename(self, from, to)
    }

    pub fn copy(&self, src: &str, dst: &str) -> Result<u64, FileError> {
        // Either side may carry a filter tag; let a tagged side decide.
        let driver = match self.drivers.iter().find(|d| d.accept(src) || d.accept(dst)) {
            Some(d) => d.as_ref(),
            None    => self.terminal.as_ref(),
        };
        driver.copy(self, src, dst)
    }

    pub fn dir_exists(&self, name: &str) -> Result<bool, FileError> {
        self.resolve(name).dir_exists(self, name)
    }

    pub fn dir_make(&self, name: &str) -> Result<(), FileError> {
        self.resolve(name).dir_make(self, name)
    }

    pub fn dir_remove(&self, name: &str) -> Result<(), FileError> {
        self.resolve(name).dir_remove(self, name)
    }

    pub fn directory(&self, name: &str) -> Result<Vec<DirEntry>, FileError> {
        self.resolve(name).directory(self, name)
    }

    pub fn time_get(&self, name: &str) -> Result<DateTime<Local>, FileError> {
        self.resolve(name).time_get(self, name)
    }

    pub fn time_set(&self, name: &str, time: DateTime<Local>) -> Result<(), FileError> {
        self.resolve(name).time_set(self, name, time)
    }

    pub fn attr_get(&self, name: &str) -> Result<u32, FileError> {
        self.resolve(name).attr_get(self, name)
    }

    pub fn attr_set(&self, name: &str, attr: u32) -> Result<(), FileError> {
        self.resolve(name).attr_set(self, name, attr)
    }

    pub fn link(&self, existing: &str, new_name: &str) -> Result<(), FileError> {
        self.resolve(existing).link(self, existing, new_name)
    }

    pub fn link_sym(&self, target: &str, new_name: &str) -> Result<(), FileError> {
        self.resolve(target).link_sym(self, target, new_name)
    }

    pub fn link_read(&self, name: &str) -> Result<String, FileError> {
        self.resolve(name).link_read(self, name)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream every byte of `src` into `dst` through the handle interface.
/// Neither handle is closed.  Returns the number of bytes copied.
pub fn copy_stream(src: &mut dyn FileHandle, dst: &mut dyn FileHandle) -> Result<u64, FileError> {
    let mut chunk = vec![0u8; COPY_CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = match src.read(&mut chunk, -1)? {
            Transfer::EndOfStream => break,
            Transfer::Bytes(0)    => break,
            Transfer::Bytes(n)    => n,
        };
        let mut off = 0;
        while off < n {
            let w = dst.write(&chunk[off..n], -1)?;
            if w == 0 {
                return Err(FileError::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "destination accepted no bytes",
                )));
            }
            off += w;
        }
        total += n as u64;
    }
    Ok(total)
}

/// Open `src` and `dst` through `registry` and stream one into the other,
/// closing both.
pub fn copy_named(registry: &Registry, src: &str, dst: &str) -> Result<u64, FileError> {
    let mut input  = registry.open(src, OpenFlags::read())?;
    let mut output = registry.open(dst, OpenFlags::create())?;
    let copied = copy_stream(input.as_mut(), output.as_mut());
    let closed_out = output.close();
    let closed_in  = input.close();
    let copied = copied?;
    closed_out?;
    closed_in?;
    Ok(copied)
}

// ── Process-wide registry ────────────────────────────────────────────────────

static GLOBAL: RwLock<Option<Arc<Registry>>> = RwLock::new(None);

/// Install the default chain built from `config`, replacing any previous one.
pub fn init(config: DriverConfig) -> Result<Arc<Registry>, ConfigError> {
    let reg = Arc::new(Registry::with_defaults(config)?);
    install(reg.clone());
    Ok(reg)
}

/// Install a caller-built chain.
pub fn install(registry: Arc<Registry>) {
    debug!(drivers = ?registry.driver_names(), "installing driver registry");
    let mut slot = GLOBAL.write().unwrap_or_else(|p| p.into_inner());
    *slot = Some(registry);
}

/// The installed chain.  Fails with `Unsupported` before [`init`].
pub fn global() -> Result<Arc<Registry>, FileError> {
    let slot = GLOBAL.read().unwrap_or_else(|p| p.into_inner());
    slot.clone().ok_or(FileError::Unsupported)
}

/// Remove the installed chain.  Handles already open stay valid.
pub fn teardown() {
    let mut slot = GLOBAL.write().unwrap_or_else(|p| p.into_inner());
    if slot.take().is_some() {
        debug!("driver registry torn down");
    }
}
