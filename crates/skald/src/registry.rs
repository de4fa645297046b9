//! Concurrency-safe registries backing the bus.
//!
//! `AppenderRegistry` holds the ordered set of sinks for one event domain;
//! `CollectorRegistry` holds the named, level-bearing producers (loggers,
//! tracers, meters) together with the muted-by-name set that survives
//! re-registration.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::appenders::Appender;
use crate::error::{Result, TelemetryError};
use crate::level::Level;

/// Ordered, mutable set of named appenders for one event domain.
///
/// Iteration order is registration order. `all()` returns a point-in-time
/// snapshot, safe to walk while other threads register or unregister.
pub struct AppenderRegistry<E> {
    appenders: Mutex<Vec<Arc<dyn Appender<E>>>>,
}

impl<E: Send + Sync + 'static> AppenderRegistry<E> {
    pub fn new() -> Self {
        Self {
            appenders: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of the registered appenders, in registration order.
    pub fn all(&self) -> Vec<Arc<dyn Appender<E>>> {
        self.appenders.lock().unwrap().clone()
    }

    /// Existence probe: `None` when no appender carries the name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Appender<E>>> {
        self.appenders
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.name() == name)
            .cloned()
    }

    /// Lookup that expects the appender to exist.
    pub fn expect(&self, name: &str) -> Result<Arc<dyn Appender<E>>> {
        self.get(name)
            .ok_or_else(|| TelemetryError::NotFound(format!("appender '{name}'")))
    }

    pub fn register(&self, appender: Arc<dyn Appender<E>>) {
        self.appenders.lock().unwrap().push(appender);
    }

    /// Removes every appender with the given name.
    pub fn unregister(&self, name: &str) {
        self.appenders.lock().unwrap().retain(|a| a.name() != name);
    }

    pub fn unregister_all(&self) {
        self.appenders.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.appenders.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: Send + Sync + 'static> Default for AppenderRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Level state shared by every collector: the live level plus the level
/// saved when the collector was muted.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LevelState {
    pub level: Level,
    pub before_mute: Level,
}

impl LevelState {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            before_mute: level,
        }
    }

    pub fn mute(&mut self) {
        self.before_mute = self.level;
        self.level = Level::Off;
    }

    /// Restores the pre-mute level. Refreshing `before_mute` afterwards
    /// makes a second unmute a no-op.
    pub fn unmute(&mut self) {
        self.level = self.before_mute;
        self.before_mute = self.level;
    }

    pub fn set(&mut self, level: Level) {
        self.level = level;
    }
}

/// A named, level-bearing, muteable entity: logger, tracer, or meter.
pub trait Collector: Send + Sync {
    fn name(&self) -> &str;
    fn level(&self) -> Level;
    fn set_level(&self, level: Level);
    fn mute(&self);
    fn unmute(&self);

    fn is_muted(&self) -> bool {
        self.level() == Level::Off
    }
}

struct CollectorInner<T> {
    entries: HashMap<String, Arc<T>>,
    muted: HashSet<String>,
}

/// Registry of named collectors with mute/level management.
///
/// The muted-name set is kept separately from the live entities so a name
/// can be pre-muted before registration and stays muted when the entity is
/// re-registered.
pub struct CollectorRegistry<T: Collector> {
    inner: Mutex<CollectorInner<T>>,
}

impl<T: Collector> CollectorRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CollectorInner {
                entries: HashMap::new(),
                muted: HashSet::new(),
            }),
        }
    }

    /// Registers the entity, applying the muted-name set if it matches.
    pub fn register(&self, entity: Arc<T>) {
        let mut inner = self.inner.lock().unwrap();
        if inner.muted.contains(entity.name()) {
            entity.mute();
        }
        inner.entries.insert(entity.name().to_string(), entity);
    }

    /// Returns the registered entity, or registers and returns the one
    /// produced by `create`.
    pub fn get_or_register(&self, name: &str, create: impl FnOnce() -> Arc<T>) -> Arc<T> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.entries.get(name) {
            return existing.clone();
        }
        let entity = create();
        if inner.muted.contains(name) {
            entity.mute();
        }
        inner.entries.insert(name.to_string(), entity.clone());
        entity
    }

    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.inner.lock().unwrap().entries.get(name).cloned()
    }

    /// Lookup that expects the collector to exist.
    pub fn expect(&self, name: &str) -> Result<Arc<T>> {
        self.get(name)
            .ok_or_else(|| TelemetryError::NotFound(format!("collector '{name}'")))
    }

    pub fn set_level(&self, name: &str, level: Level) {
        if let Some(entity) = self.inner.lock().unwrap().entries.get(name) {
            entity.set_level(level);
        }
    }

    /// Adds the name to the muted set and mutes the live entity if present.
    pub fn mute(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.muted.insert(name.to_string());
        if let Some(entity) = inner.entries.get(name) {
            entity.mute();
        }
    }

    pub fn unmute(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.muted.remove(name);
        if let Some(entity) = inner.entries.get(name) {
            entity.unmute();
        }
    }

    pub fn is_muted(&self, name: &str) -> bool {
        self.inner.lock().unwrap().muted.contains(name)
    }
}

impl<T: Collector> Default for CollectorRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
