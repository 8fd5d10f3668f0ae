//! Name-level BZIP2 driver.
//!
//! Accepts `BZ:` / `BZ<d>:` names.  `open` resolves the rest of the name
//! through the registry and wraps the resulting handle in a [`Bz2File`];
//! every other operation is forwarded on the stripped name.

use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::debug;

use crate::codec::{Bzip2Engine, Engine};
use crate::config::{ConfigError, DriverConfig};
use crate::file::{FileError, FileHandle, OpenFlags};
use crate::io_stream::{Bz2File, StreamOptions};
use crate::name as tag;
use crate::registry::{copy_named, DirEntry, FileDriver, Registry};

pub struct Bz2Driver {
    config: DriverConfig,
    engine: Arc<dyn Engine>,
}

impl Bz2Driver {
    pub fn new(config: DriverConfig) -> Result<Self, ConfigError> {
        let engine = Bzip2Engine {
            small:       config.small_decompress,
            work_factor: config.work_factor,
        };
        Self::with_engine(config, Arc::new(engine))
    }

    pub fn with_engine(config: DriverConfig, engine: Arc<dyn Engine>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, engine })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }
}

impl FileDriver for Bz2Driver {
    fn name(&self) -> &'static str { "bz2" }

    fn accept(&self, name: &str) -> bool {
        tag::is_tagged(name)
    }

    fn open(&self, registry: &Registry, name: &str, flags: OpenFlags)
        -> Result<Box<dyn FileHandle>, FileError>
    {
        let level = tag::level_of(name, self.config.default_level);
        let inner = registry.open(tag::strip(name), flags)?;
        debug!(path = name, level, access = ?flags.access, "opening bzip2 stream");
        Ok(Box::new(Bz2File::with_options(
            inner,
            flags.access,
            StreamOptions::from_config(&self.config, level),
            self.engine.clone(),
        )))
    }

    fn exists(&self, registry: &Registry, name: &str) -> Result<bool, FileError> {
        registry.exists(tag::strip(name))
    }

    fn delete(&self, registry: &Registry, name: &str) -> Result<(), FileError> {
        registry.delete(tag::strip(name))
    }

    fn rename(&self, registry: &Registry, from: &str, to: &str) -> Result<(), FileError> {
        registry.rename(tag::strip(from), tag::strip(to))
    }

    /// Same tag level on both sides: the compressed bytes are already what
    /// the destination wants, so copy them verbatim.  Otherwise stream through
    /// the full names and let each side decode or encode.
    fn copy(&self, registry: &Registry, src: &str, dst: &str) -> Result<u64, FileError> {
        let level = |n: &str| tag::level_of(n, self.config.default_level);
        if tag::is_tagged(src) && tag::is_tagged(dst) && level(src) == level(dst) {
            registry.copy(tag::strip(src), tag::strip(dst))
        } else {
            copy_named(registry, src, dst)
        }
    }

    fn dir_exists(&self, registry: &Registry, name: &str) -> Result<bool, FileError> {
        registry.dir_exists(tag::strip(name))
    }

    fn dir_make(&self, registry: &Registry, name: &str) -> Result<(), FileError> {
        registry.dir_make(tag::strip(name))
    }

    fn dir_remove(&self, registry: &Registry, name: &str) -> Result<(), FileError> {
        registry.dir_remove(tag::strip(name))
    }

    fn directory(&self, registry: &Registry, name: &str) -> Result<Vec<DirEntry>, FileError> {
        registry.directory(tag::strip(name))
    }

    fn time_get(&self, registry: &Registry, name: &str) -> Result<DateTime<Local>, FileError> {
        registry.time_get(tag::strip(name))
    }

    fn time_set(&self, registry: &Registry, name: &str, time: DateTime<Local>) -> Result<(), FileError> {
        registry.time_set(tag::strip(name), time)
    }

    fn attr_get(&self, registry: &Registry, name: &str) -> Result<u32, FileError> {
        registry.attr_get(tag::strip(name))
    }

    fn attr_set(&self, registry: &Registry, name: &str, attr: u32) -> Result<(), FileError> {
        registry.attr_set(tag::strip(name), attr)
    }

    fn link(&self, registry: &Registry, existing: &str, new_name: &str) -> Result<(), FileError> {
        registry.link(tag::strip(existing), tag::strip(new_name))
    }

    fn link_sym(&self, registry: &Registry, target: &str, new_name: &str) -> Result<(), FileError> {
        registry.link_sym(tag::strip(target), tag::strip(new_name))
    }

    fn link_read(&self, registry: &Registry, name: &str) -> Result<String, FileError> {
        registry.link_read(tag::strip(name))
    }
}
