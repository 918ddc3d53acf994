//! In-memory bucket backend (default). Also the substrate the test
//! suites run against.

use crate::bucket::views::{run_view, DesignDoc};
use crate::bucket::{Bucket, ViewOptions, ViewRow};
use crate::common::{Error, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// In-memory bucket: a mutex-guarded ordered map plus the registered
/// design documents.
pub struct MemoryBucket {
    entries: Mutex<BTreeMap<String, Value>>,
    designs: Mutex<HashMap<String, DesignDoc>>,
}

impl MemoryBucket {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            designs: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl Bucket for MemoryBucket {
    fn get(&self, key: &str) -> Result<Value> {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn add(&self, key: &str, value: &Value) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(key) {
            return Err(Error::AlreadyExists(key.to_string()));
        }
        entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.entries.lock().unwrap().remove(key) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(key.to_string())),
        }
    }

    fn incr(&self, key: &str, delta: u64, initial: u64) -> Result<u64> {
        let mut entries = self.entries.lock().unwrap();
        let current = entries.get(key).and_then(Value::as_u64);
        match (current, delta) {
            (None, 0) => Err(Error::NotFound(key.to_string())),
            (None, _) => {
                entries.insert(key.to_string(), initial.into());
                Ok(initial)
            }
            (Some(v), 0) => Ok(v),
            (Some(v), d) => {
                let next = v.saturating_add(d);
                entries.insert(key.to_string(), next.into());
                Ok(next)
            }
        }
    }

    fn view(&self, design: &str, name: &str, opts: &ViewOptions) -> Result<Vec<ViewRow>> {
        let ddoc = self
            .designs
            .lock()
            .unwrap()
            .get(design)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("design doc {}", design)))?;
        let view = ddoc
            .view(name)
            .ok_or_else(|| Error::NotFound(format!("view {}/{}", design, name)))?;
        let entries: Vec<(String, Value)> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        run_view(entries, view, opts)
    }

    fn install_design(&self, ddoc: &DesignDoc) -> Result<()> {
        self.set(&format!("_design/{}", ddoc.name), &ddoc.descriptor())?;
        self.designs
            .lock()
            .unwrap()
            .insert(ddoc.name.to_string(), ddoc.clone());
        Ok(())
    }
}
