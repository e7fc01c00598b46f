//! The server's property registry: named, typed configuration values with per-property
//! validation, some of which may only be set before the server finishes starting up.

use std::collections::HashMap;
use std::str::FromStr;

use ::storage::buffer_manager::EvictionPolicy;
use ::storage::dbfile;

/// The directory data files live in.
pub const PROP_BASE_DIRECTORY: &'static str = "nanodb.baseDirectory";
/// The page-cache capacity, in bytes.
pub const PROP_PAGECACHE_SIZE: &'static str = "nanodb.pagecache.size";
/// The page-cache eviction policy, `FIFO` or `LRU`.
pub const PROP_PAGECACHE_POLICY: &'static str = "nanodb.pagecache.policy";
/// The page size used for newly created table files.
pub const PROP_PAGESIZE: &'static str = "nanodb.pagesize";
/// Whether transaction support is enabled.
pub const PROP_ENABLE_TRANSACTIONS: &'static str = "nanodb.enableTransactions";
/// Whether key constraints are enforced on DML.
pub const PROP_ENFORCE_KEY_CONSTRAINTS: &'static str = "nanodb.enforceKeyConstraints";
/// Whether index support is enabled.
pub const PROP_ENABLE_INDEXES: &'static str = "nanodb.enableIndexes";
/// Whether indexes are automatically created on declared keys.
pub const PROP_CREATE_INDEXES_ON_KEYS: &'static str = "nanodb.createIndexesOnKeys";
/// The planner implementation to use.
pub const PROP_PLANNER_CLASS: &'static str = "nanodb.plannerClass";
/// Whether every command is followed by a full page flush.
pub const PROP_FLUSH_AFTER_CMD: &'static str = "nanodb.flushAfterCmd";

/// The smallest allowed page-cache capacity: one maximum-size page.
const MIN_PAGECACHE_SIZE: i64 = dbfile::MAX_PAGESIZE as i64;
/// The largest allowed page-cache capacity, in bytes (1 GiB).
const MAX_PAGECACHE_SIZE: i64 = 1 << 30;

/// A property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// An integer-valued property.
    Int(i64),
    /// A boolean-valued property.
    Bool(bool),
    /// A string-valued property.
    String(String),
}

impl PropertyValue {
    /// The value as an integer, when it is one.
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            PropertyValue::Int(i) => Some(i),
            _ => None,
        }
    }

    /// The value as a boolean, when it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            PropertyValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// The value as a string, when it is one.
    pub fn as_str(&self) -> Option<&str> {
        match *self {
            PropertyValue::String(ref s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl ::std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::String(ref s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// An error from the property registry.
pub enum Error {
    /// The named property is not recognized.
    UnknownProperty(String),
    /// The property may only be set before startup completes.
    ReadOnlyProperty(String),
    /// The value is not acceptable for the property.
    InvalidValue(String, String),
}

impl ::std::fmt::Display for Error {
    fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match *self {
            Error::UnknownProperty(ref name) => {
                write!(f, "The property {} is not recognized.", name)
            }
            Error::ReadOnlyProperty(ref name) => {
                write!(f, "The property {} can only be set at startup.", name)
            }
            Error::InvalidValue(ref name, ref value) => {
                write!(f, "The value {} is not valid for property {}.", value, name)
            }
        }
    }
}

/// The registry of recognized properties and their current values.
pub struct PropertyRegistry {
    values: HashMap<String, PropertyValue>,
    startup_complete: bool,
}

fn read_only_after_startup(name: &str) -> bool {
    match name {
        PROP_BASE_DIRECTORY |
        PROP_PAGECACHE_POLICY |
        PROP_ENABLE_TRANSACTIONS |
        PROP_ENABLE_INDEXES => true,
        _ => false,
    }
}

impl PropertyRegistry {
    /// Creates a registry holding every recognized property at its default value.
    pub fn new() -> PropertyRegistry {
        let mut values = HashMap::new();
        values.insert(PROP_BASE_DIRECTORY.to_string(),
                      PropertyValue::String("datafiles".into()));
        values.insert(PROP_PAGECACHE_SIZE.to_string(),
                      PropertyValue::Int(::storage::buffer_manager::DEFAULT_PAGECACHE_SIZE as
                                         i64));
        values.insert(PROP_PAGECACHE_POLICY.to_string(), PropertyValue::String("LRU".into()));
        values.insert(PROP_PAGESIZE.to_string(),
                      PropertyValue::Int(dbfile::DEFAULT_PAGESIZE as i64));
        values.insert(PROP_ENABLE_TRANSACTIONS.to_string(), PropertyValue::Bool(false));
        values.insert(PROP_ENFORCE_KEY_CONSTRAINTS.to_string(), PropertyValue::Bool(true));
        values.insert(PROP_ENABLE_INDEXES.to_string(), PropertyValue::Bool(false));
        values.insert(PROP_CREATE_INDEXES_ON_KEYS.to_string(), PropertyValue::Bool(false));
        values.insert(PROP_PLANNER_CLASS.to_string(),
                      PropertyValue::String("CostBasedPlanner".into()));
        values.insert(PROP_FLUSH_AFTER_CMD.to_string(), PropertyValue::Bool(false));

        PropertyRegistry {
            values: values,
            startup_complete: false,
        }
    }

    /// Marks startup as finished; read-only-after-startup properties reject changes from here
    /// on.
    pub fn startup_complete(&mut self) {
        self.startup_complete = true;
    }

    /// Reads a property's current value.
    pub fn get(&self, name: &str) -> Result<&PropertyValue, Error> {
        self.values.get(name).ok_or_else(|| Error::UnknownProperty(name.into()))
    }

    /// A sorted snapshot of the properties, optionally filtered by a substring of the name.
    pub fn list(&self, filter: Option<&str>) -> Vec<(String, PropertyValue)> {
        let mut entries: Vec<(String, PropertyValue)> = self.values
            .iter()
            .filter(|&(name, _)| filter.map(|f| name.contains(f)).unwrap_or(true))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Sets a property, enforcing its type, its validation rule, and the
    /// read-only-after-startup restriction.
    pub fn set(&mut self, name: &str, value: PropertyValue) -> Result<(), Error> {
        if !self.values.contains_key(name) {
            return Err(Error::UnknownProperty(name.into()));
        }
        if self.startup_complete && read_only_after_startup(name) {
            return Err(Error::ReadOnlyProperty(name.into()));
        }

        self.validate(name, &value)?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    fn validate(&self, name: &str, value: &PropertyValue) -> Result<(), Error> {
        let bad = || Error::InvalidValue(name.into(), format!("{}", value));

        match name {
            PROP_PAGESIZE => {
                let size = value.as_int().ok_or_else(&bad)?;
                if size < 0 || !dbfile::is_valid_pagesize(size as u32) {
                    return Err(bad());
                }
            }
            PROP_PAGECACHE_SIZE => {
                let size = value.as_int().ok_or_else(&bad)?;
                if size < MIN_PAGECACHE_SIZE || size > MAX_PAGECACHE_SIZE {
                    return Err(bad());
                }
            }
            PROP_PAGECACHE_POLICY => {
                let policy = value.as_str().ok_or_else(&bad)?;
                EvictionPolicy::from_str(policy).map_err(|_| bad())?;
            }
            PROP_BASE_DIRECTORY | PROP_PLANNER_CLASS => {
                value.as_str().ok_or_else(&bad)?;
            }
            _ => {
                // The remaining properties are booleans.
                value.as_bool().ok_or_else(&bad)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_present() {
        let registry = PropertyRegistry::new();
        assert_eq!(Some(8192), registry.get(PROP_PAGESIZE).unwrap().as_int());
        assert_eq!(Some("LRU"), registry.get(PROP_PAGECACHE_POLICY).unwrap().as_str());
        assert_eq!(Some(true),
                   registry.get(PROP_ENFORCE_KEY_CONSTRAINTS).unwrap().as_bool());
    }

    #[test]
    fn test_unknown_property() {
        let mut registry = PropertyRegistry::new();
        assert_eq!(Err(Error::UnknownProperty("nanodb.nope".into())),
                   registry.set("nanodb.nope", PropertyValue::Int(1)));
        assert!(registry.get("nanodb.nope").is_err());
    }

    #[test]
    fn test_pagesize_validation() {
        let mut registry = PropertyRegistry::new();
        assert!(registry.set(PROP_PAGESIZE, PropertyValue::Int(4096)).is_ok());
        assert!(registry.set(PROP_PAGESIZE, PropertyValue::Int(1000)).is_err());
        assert!(registry.set(PROP_PAGESIZE, PropertyValue::Int(131072)).is_err());
        assert!(registry.set(PROP_PAGESIZE, PropertyValue::Bool(true)).is_err());
    }

    #[test]
    fn test_policy_validation() {
        let mut registry = PropertyRegistry::new();
        assert!(registry.set(PROP_PAGECACHE_POLICY, PropertyValue::String("FIFO".into()))
            .is_ok());
        assert!(registry.set(PROP_PAGECACHE_POLICY, PropertyValue::String("RANDOM".into()))
            .is_err());
    }

    #[test]
    fn test_read_only_after_startup() {
        let mut registry = PropertyRegistry::new();
        assert!(registry.set(PROP_PAGECACHE_POLICY, PropertyValue::String("FIFO".into()))
            .is_ok());

        registry.startup_complete();
        assert_eq!(Err(Error::ReadOnlyProperty(PROP_PAGECACHE_POLICY.into())),
                   registry.set(PROP_PAGECACHE_POLICY, PropertyValue::String("LRU".into())));

        // Ordinary properties stay settable.
        assert!(registry.set(PROP_FLUSH_AFTER_CMD, PropertyValue::Bool(true)).is_ok());
    }
}
