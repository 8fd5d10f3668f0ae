pub mod codec;
pub mod buffer;
pub mod config;
pub mod name;
pub mod file;
pub mod io_stream;
pub mod driver;
pub mod registry;

pub use codec::{Bzip2Engine, Engine, EngineStatus};
pub use config::DriverConfig;
pub use driver::Bz2Driver;
pub use file::{AccessMode, ConfigOption, ConfigValue, FileError, FileHandle, OpenFlags, Transfer};
pub use io_stream::{Bz2File, StreamMode, StreamOptions, StreamStats};
pub use registry::Registry;
