//! The module containing NanoDB server instances.

use std::io::Write;

pub mod properties;

pub use self::properties::{PropertyRegistry, PropertyValue};

use std::cell::Cell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ::commands::{Command, CommandResult};
use ::storage::{StorageManager, TableManager, file_manager};
use ::storage::buffer_manager::EvictionPolicy;

/// Configures global logging through `fern`, writing `[module][level] message` lines to
/// stdout.  Embedders call this once at startup; calling it a second time fails inside the log
/// crate and is reported as an error here.
pub fn init_logging(level: ::log::LogLevelFilter) -> Result<(), String> {
    let config = ::fern::DispatchConfig {
        format: Box::new(|msg: &str, level: &::log::LogLevel, location: &::log::LogLocation| {
            format!("[{}][{}] {}", location.module_path(), level, msg)
        }),
        output: vec![::fern::OutputConfig::stdout()],
        level: level,
    };

    ::fern::init_global_logger(config, level).map_err(|e| format!("{:?}", e))
}

/// This class provides the entry-point operations for managing the database server and
/// executing commands against it.
///
/// The server owns the storage manager (file manager + buffer manager), the table manager, and
/// the property registry; every command executes against this state.  A server instance
/// represents a single session: command execution is strictly sequential.
pub struct Server {
    /// The server's storage manager.
    pub storage: StorageManager,
    /// The server's table manager.
    pub table_manager: TableManager,
    /// The server's property registry.
    pub properties: PropertyRegistry,
    cancel_requested: Cell<bool>,
    shutdown_requested: Cell<bool>,
}

#[derive(Debug)]
/// An error that can occur while starting the server.
pub enum Error {
    /// The data directory could not be created or used.
    DataDirectory(String),
    /// The file manager could not be started.
    FileManager(file_manager::Error),
    /// A property default failed validation.
    Property(properties::Error),
}

impl ::std::fmt::Display for Error {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            Error::DataDirectory(ref e) => write!(f, "Unable to use the data directory: {}", e),
            Error::FileManager(ref e) => write!(f, "{}", e),
            Error::Property(ref e) => write!(f, "{}", e),
        }
    }
}

impl Server {
    /// Instantiates a server storing data under `datafiles/` in the current directory.
    pub fn new() -> Result<Server, Error> {
        let registry = PropertyRegistry::new();
        let base_dir = PathBuf::from(registry.get(properties::PROP_BASE_DIRECTORY)
            .expect("default exists")
            .as_str()
            .expect("base directory is a string"));
        Server::start(registry, &base_dir)
    }

    /// Instantiates a server storing data under the given directory, which is created if it
    /// does not exist.
    pub fn with_data_path<P: AsRef<Path>>(path: P) -> Result<Server, Error> {
        let mut registry = PropertyRegistry::new();
        registry.set(properties::PROP_BASE_DIRECTORY,
                 PropertyValue::String(path.as_ref().to_string_lossy().into_owned()))
            .map_err(Error::Property)?;
        Server::start(registry, path.as_ref())
    }

    fn start(mut registry: PropertyRegistry, base_dir: &Path) -> Result<Server, Error> {
        if !base_dir.exists() {
            fs::create_dir_all(base_dir).map_err(|e| Error::DataDirectory(format!("{}", e)))?;
        }

        let policy = registry.get(properties::PROP_PAGECACHE_POLICY)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .and_then(|s| EvictionPolicy::from_str(&s).ok())
            .unwrap_or(EvictionPolicy::LRU);
        let cache_size = registry.get(properties::PROP_PAGECACHE_SIZE)
            .ok()
            .and_then(PropertyValue::as_int)
            .unwrap_or(::storage::buffer_manager::DEFAULT_PAGECACHE_SIZE as i64) as
                         usize;

        let storage = StorageManager::new(base_dir, policy, cache_size)
            .map_err(Error::FileManager)?;

        registry.startup_complete();
        info!("NanoDB server started; data directory is {}.", base_dir.display());

        Ok(Server {
            storage: storage,
            table_manager: TableManager::new(),
            properties: registry,
            cancel_requested: Cell::new(false),
            shutdown_requested: Cell::new(false),
        })
    }

    /// The default page size for newly created table files.
    pub fn current_pagesize(&self) -> u32 {
        self.properties
            .get(properties::PROP_PAGESIZE)
            .ok()
            .and_then(PropertyValue::as_int)
            .unwrap_or(::storage::dbfile::DEFAULT_PAGESIZE as i64) as u32
    }

    /// Requests cooperative cancellation of the currently executing command.
    pub fn request_cancel(&self) {
        self.cancel_requested.set(true);
    }

    /// Whether cancellation has been requested.  Command drive loops poll this between tuples.
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.get()
    }

    /// Whether an `EXIT`/`QUIT` command has been executed.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.get()
    }

    /// Requests a clean shutdown, used by the `EXIT` command.
    pub fn request_shutdown(&self) {
        self.shutdown_requested.set(true);
    }

    /// Executes a provided command against this server, writing its output to stdout.
    ///
    /// Whatever happens inside the command, the session's page pins are released before this
    /// method returns, and the post-command flush runs if the
    /// [`flushAfterCmd`](properties/constant.PROP_FLUSH_AFTER_CMD.html) property is set.
    /// Failures are reported as a one-line `ERROR` on the output.
    pub fn handle_command(&mut self, command: &mut Command) -> CommandResult {
        let mut out = io::stdout();
        self.handle_command_to(command, &mut out)
    }

    /// Like [`handle_command`](#method.handle_command), but with an explicit output sink.
    pub fn handle_command_to(&mut self,
                             command: &mut Command,
                             out: &mut io::Write)
                             -> CommandResult {
        debug!("Executing command: {:?}", command);
        self.cancel_requested.set(false);

        let result = command.execute(self, out);

        // Pin conservation: however the command ended, the session holds no page pins now.
        let leftover = self.storage.release_session_pins();
        if leftover > 0 && result.is_ok() {
            warn!("Command completed successfully but left {} page pin(s) behind.",
                  leftover);
        }

        let flush_after = self.properties
            .get(properties::PROP_FLUSH_AFTER_CMD)
            .ok()
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false);
        if flush_after {
            if let Err(e) = self.storage.flush_all() {
                error!("Post-command flush failed: {}", e);
            }
        }

        if let Err(ref e) = result {
            let _ = writeln!(out, "ERROR: {}", e);
        }
        result
    }
}
