//! Persistent bucket backend on sled (feature `sled`).
//!
//! Values are stored as JSON bytes. Counters go through sled's
//! `update_and_fetch` so increments stay atomic under concurrent
//! writers; create-only writes use `compare_and_swap`.

use crate::bucket::views::{run_view, DesignDoc};
use crate::bucket::{Bucket, ViewOptions, ViewRow};
use crate::common::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

pub struct SledBucket {
    db: sled::Db,
    designs: Mutex<HashMap<String, DesignDoc>>,
}

impl SledBucket {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self {
            db,
            designs: Mutex::new(HashMap::new()),
        })
    }

    fn decode(bytes: &[u8]) -> Result<Value> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::BadGateway(format!("corrupt bucket value: {}", e)))
    }

    fn encode(value: &Value) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| Error::Internal(e.to_string()))
    }
}

impl Bucket for SledBucket {
    fn get(&self, key: &str) -> Result<Value> {
        let bytes = self
            .db
            .get(key)?
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        Self::decode(&bytes)
    }

    fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.db.insert(key, Self::encode(value)?)?;
        Ok(())
    }

    fn add(&self, key: &str, value: &Value) -> Result<()> {
        let bytes = Self::encode(value)?;
        match self.db.compare_and_swap(key, None as Option<&[u8]>, Some(bytes))? {
            Ok(()) => Ok(()),
            Err(_) => Err(Error::AlreadyExists(key.to_string())),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.db.remove(key)? {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(key.to_string())),
        }
    }

    fn incr(&self, key: &str, delta: u64, initial: u64) -> Result<u64> {
        if delta == 0 {
            let bytes = self
                .db
                .get(key)?
                .ok_or_else(|| Error::NotFound(key.to_string()))?;
            return Self::decode(&bytes)?
                .as_u64()
                .ok_or_else(|| Error::BadGateway(format!("counter {} is not a number", key)));
        }
        let updated = self.db.update_and_fetch(key, |old| {
            let next = match old
                .and_then(|b| serde_json::from_slice::<Value>(b).ok())
                .and_then(|v| v.as_u64())
            {
                Some(v) => v.saturating_add(delta),
                None => initial,
            };
            serde_json::to_vec(&Value::from(next)).ok()
        })?;
        let bytes = updated.ok_or_else(|| Error::Internal("counter update lost".into()))?;
        Self::decode(&bytes)?
            .as_u64()
            .ok_or_else(|| Error::BadGateway(format!("counter {} is not a number", key)))
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

        let mut entries = Vec::new();
        for item in self.db.iter() {
            let (key, value) = item?;
            let key = String::from_utf8(key.to_vec())
                .map_err(|_| Error::BadGateway("non-UTF-8 bucket key".into()))?;
            entries.push((key, Self::decode(&value)?));
        }
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
