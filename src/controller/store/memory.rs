//! In-memory object store
//!
//! Behaves like the API server for the verbs the engine uses:
//!
//! - create assigns `uid`, `resourceVersion`, `creationTimestamp` and `generation`
//! - update is guarded by `resourceVersion` and never touches status
//! - update_status only touches status
//! - delete of an object with finalizers only sets `deletionTimestamp`; the
//!   object disappears once its last finalizer is removed
//!
//! Faults can be injected per verb and kind to exercise failure paths.
//! This is ephemeral - data does not persist across restarts.

use super::{ObjectStore, ResourceKey, StoreError};
use async_trait::async_trait;
use kube::core::DynamicObject;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tracing::debug;

/// Store verbs faults can target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Create,
    Patch,
    Update,
    UpdateStatus,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaultEffect {
    ServerError,
    Conflict,
    Gone,
    /// The write lands (as if another writer won) but the caller sees AlreadyExists
    LostCreateRace,
}

/// An injected failure
#[derive(Debug, Clone)]
pub struct Fault {
    verb: Verb,
    kind: String,
    name: Option<String>,
    effect: FaultEffect,
    /// `None` fires forever
    remaining: Option<usize>,
}

impl Fault {
    fn new(verb: Verb, kind: &str, effect: FaultEffect) -> Self {
        Self {
            verb,
            kind: kind.to_string(),
            name: None,
            effect,
            remaining: None,
        }
    }

    /// 500 InternalError on every matching call
    #[must_use]
    pub fn server_error(verb: Verb, kind: &str) -> Self {
        Self::new(verb, kind, FaultEffect::ServerError)
    }

    /// 409 Conflict on every matching call
    #[must_use]
    pub fn conflict(verb: Verb, kind: &str) -> Self {
        Self::new(verb, kind, FaultEffect::Conflict)
    }

    /// 410 Gone on every matching call
    #[must_use]
    pub fn gone(verb: Verb, kind: &str) -> Self {
        Self::new(verb, kind, FaultEffect::Gone)
    }

    /// The next create of `kind` is committed but reported as AlreadyExists
    #[must_use]
    pub fn lost_create_race(kind: &str) -> Self {
        Self::new(Verb::Create, kind, FaultEffect::LostCreateRace).times(1)
    }

    /// Only match objects with this name
    #[must_use]
    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Fire at most `n` times
    #[must_use]
    pub fn times(mut self, n: usize) -> Self {
        self.remaining = Some(n);
        self
    }

    fn matches(&self, verb: Verb, key: &ResourceKey) -> bool {
        self.verb == verb
            && self.kind == key.gvk.kind
            && self.name.as_ref().is_none_or(|n| *n == key.name)
            && self.remaining != Some(0)
    }

    fn error(&self, key: &ResourceKey) -> StoreError {
        match self.effect {
            FaultEffect::ServerError => StoreError::Api {
                key: key.clone(),
                code: 500,
                reason: "InternalError".to_string(),
                message: "injected failure".to_string(),
            },
            FaultEffect::Conflict => StoreError::Conflict {
                key: key.clone(),
                message: "injected conflict".to_string(),
            },
            FaultEffect::Gone => StoreError::Gone(key.clone()),
            FaultEffect::LostCreateRace => StoreError::AlreadyExists(key.clone()),
        }
    }
}

type Slot = (String, String, Option<String>, String);

fn slot(key: &ResourceKey) -> Slot {
    (
        key.api_version(),
        key.gvk.kind.clone(),
        key.namespace.clone(),
        key.name.clone(),
    )
}

/// In-memory object store
///
/// Thread-safe using `Arc<RwLock>` for concurrent access; clones share state.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<BTreeMap<Slot, Value>>>,
    faults: Arc<Mutex<Vec<Fault>>>,
    resource_version: Arc<AtomicU64>,
    writes: Arc<AtomicU64>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject_fault(&self, fault: Fault) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(fault);
    }

    pub fn clear_faults(&self) {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of successful mutating calls so far
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Insert or overwrite an object as-is, bypassing faults and bookkeeping
    /// other than a fresh `resourceVersion` and a `uid` if it has none.
    pub async fn seed(&self, key: &ResourceKey, obj: &DynamicObject) {
        let mut value = object_value(key, obj);
        if value["metadata"]["uid"].is_null() {
            value["metadata"]["uid"] = Value::String(uuid::Uuid::new_v4().to_string());
        }
        value["metadata"]["resourceVersion"] = Value::String(self.next_resource_version());
        self.objects.write().await.insert(slot(key), value);
    }

    /// Whether an object exists (including one that is terminating)
    pub async fn contains(&self, key: &ResourceKey) -> bool {
        self.objects.read().await.contains_key(&slot(key))
    }

    /// All stored objects of a kind, in key order
    pub async fn list(&self, kind: &str) -> Vec<DynamicObject> {
        self.objects
            .read()
            .await
            .iter()
            .filter(|((_, k, _, _), _)| k == kind)
            .filter_map(|(_, v)| serde_json::from_value(v.clone()).ok())
            .collect()
    }

    /// Total number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn next_resource_version(&self) -> String {
        (self.resource_version.fetch_add(1, Ordering::Relaxed) + 1).to_string()
    }

    fn check_fault(&self, verb: Verb, key: &ResourceKey) -> Option<Fault> {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        let fault = faults.iter_mut().find(|f| f.matches(verb, key))?;
        if let Some(n) = fault.remaining.as_mut() {
            *n -= 1;
        }
        Some(fault.clone())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Bump bookkeeping after a write and drop objects whose deletion is complete.
    /// Returns the stored object, or `None` if it was removed.
    fn commit(
        &self,
        objects: &mut BTreeMap<Slot, Value>,
        key: &ResourceKey,
        previous: Option<&Value>,
        mut value: Value,
    ) -> Option<Value> {
        if let Some(previous) = previous {
            if body(previous) != body(&value) {
                let generation = previous["metadata"]["generation"].as_i64().unwrap_or(0) + 1;
                value["metadata"]["generation"] = json!(generation);
            }
        }
        value["metadata"]["resourceVersion"] = Value::String(self.next_resource_version());
        self.record_write();

        let terminating = !value["metadata"]["deletionTimestamp"].is_null();
        let finalizers_empty = value["metadata"]["finalizers"]
            .as_array()
            .is_none_or(Vec::is_empty);
        if terminating && finalizers_empty {
            debug!(resource = %key, "Last finalizer removed, object deleted");
            objects.remove(&slot(key));
            None
        } else {
            objects.insert(slot(key), value.clone());
            Some(value)
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &ResourceKey) -> Result<DynamicObject, StoreError> {
        if let Some(fault) = self.check_fault(Verb::Get, key) {
            return Err(fault.error(key));
        }
        let objects = self.objects.read().await;
        let value = objects
            .get(&slot(key))
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        to_object(key, value.clone())
    }

    async fn create(
        &self,
        key: &ResourceKey,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let fault = self.check_fault(Verb::Create, key);
        if let Some(fault) = fault.as_ref().filter(|f| f.effect != FaultEffect::LostCreateRace) {
            return Err(fault.error(key));
        }

        let mut objects = self.objects.write().await;
        if objects.contains_key(&slot(key)) {
            return Err(StoreError::AlreadyExists(key.clone()));
        }

        let mut value = object_value(key, obj);
        value["metadata"]["uid"] = Value::String(uuid::Uuid::new_v4().to_string());
        value["metadata"]["creationTimestamp"] = Value::String(now());
        value["metadata"]["generation"] = json!(1);
        remove_meta(&mut value, "deletionTimestamp");

        let stored = self
            .commit(&mut objects, key, None, value)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        if let Some(fault) = fault {
            return Err(fault.error(key));
        }
        to_object(key, stored)
    }

    async fn patch(
        &self,
        key: &ResourceKey,
        patch: &json_patch::Patch,
    ) -> Result<DynamicObject, StoreError> {
        if let Some(fault) = self.check_fault(Verb::Patch, key) {
            return Err(fault.error(key));
        }

        let mut objects = self.objects.write().await;
        let previous = objects
            .get(&slot(key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        let mut value = previous.clone();
        json_patch::patch(&mut value, &patch.0).map_err(|e| StoreError::InvalidPatch {
            key: key.clone(),
            message: e.to_string(),
        })?;
        if value == previous {
            return to_object(key, value);
        }

        match self.commit(&mut objects, key, Some(&previous), value) {
            Some(stored) => to_object(key, stored),
            None => Err(StoreError::NotFound(key.clone())),
        }
    }

    async fn update(
        &self,
        key: &ResourceKey,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        if let Some(fault) = self.check_fault(Verb::Update, key) {
            return Err(fault.error(key));
        }

        let mut objects = self.objects.write().await;
        let previous = objects
            .get(&slot(key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        check_resource_version(key, &previous, obj)?;

        let mut value = object_value(key, obj);
        carry_server_fields(&previous, &mut value);
        match previous.get("status") {
            Some(status) => {
                value["status"] = status.clone();
            }
            None => {
                if let Some(map) = value.as_object_mut() {
                    map.remove("status");
                }
            }
        }

        match self.commit(&mut objects, key, Some(&previous), value) {
            Some(stored) => to_object(key, stored),
            None => {
                // Finalizers cleared on a terminating object: the update succeeded
                // and the object is gone. Report the last state like the API server does.
                let mut last = object_value(key, obj);
                carry_server_fields(&previous, &mut last);
                to_object(key, last)
            }
        }
    }

    async fn update_status(
        &self,
        key: &ResourceKey,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        if let Some(fault) = self.check_fault(Verb::UpdateStatus, key) {
            return Err(fault.error(key));
        }

        let mut objects = self.objects.write().await;
        let previous = objects
            .get(&slot(key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        check_resource_version(key, &previous, obj)?;

        let mut value = previous.clone();
        match obj.data.get("status") {
            Some(status) => value["status"] = status.clone(),
            None => {
                if let Some(map) = value.as_object_mut() {
                    map.remove("status");
                }
            }
        }

        match self.commit(&mut objects, key, Some(&previous), value) {
            Some(stored) => to_object(key, stored),
            None => Err(StoreError::NotFound(key.clone())),
        }
    }

    async fn delete(&self, key: &ResourceKey) -> Result<(), StoreError> {
        if let Some(fault) = self.check_fault(Verb::Delete, key) {
            return Err(fault.error(key));
        }

        let mut objects = self.objects.write().await;
        let previous = objects
            .get(&slot(key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;

        let has_finalizers = previous["metadata"]["finalizers"]
            .as_array()
            .is_some_and(|f| !f.is_empty());
        if !has_finalizers {
            objects.remove(&slot(key));
            self.record_write();
            debug!(resource = %key, "Object deleted");
            return Ok(());
        }

        if previous["metadata"]["deletionTimestamp"].is_null() {
            let mut value = previous.clone();
            value["metadata"]["deletionTimestamp"] = Value::String(now());
            self.commit(&mut objects, key, Some(&previous), value);
            debug!(resource = %key, "Object marked for deletion, waiting on finalizers");
        }
        Ok(())
    }
}

/// Serialize an incoming object with its type meta filled from the key
fn object_value(key: &ResourceKey, obj: &DynamicObject) -> Value {
    let mut value = serde_json::to_value(obj).unwrap_or_else(|_| json!({}));
    if !value.is_object() {
        value = json!({});
    }
    value["apiVersion"] = Value::String(key.api_version());
    value["kind"] = Value::String(key.gvk.kind.clone());
    if !value["metadata"].is_object() {
        value["metadata"] = json!({});
    }
    value["metadata"]["name"] = Value::String(key.name.clone());
    match &key.namespace {
        Some(ns) => value["metadata"]["namespace"] = Value::String(ns.clone()),
        None => remove_meta(&mut value, "namespace"),
    }
    value
}

fn remove_meta(value: &mut Value, field: &str) {
    if let Some(meta) = value["metadata"].as_object_mut() {
        meta.remove(field);
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Everything except metadata and status
fn body(value: &Value) -> Value {
    let mut body = value.clone();
    if let Some(map) = body.as_object_mut() {
        map.remove("metadata");
        map.remove("status");
    }
    body
}

/// Fields a client cannot change through update
fn carry_server_fields(previous: &Value, value: &mut Value) {
    for field in ["uid", "creationTimestamp", "generation", "deletionTimestamp"] {
        let prior = previous["metadata"][field].clone();
        if prior.is_null() {
            remove_meta(value, field);
        } else {
            value["metadata"][field] = prior;
        }
    }
}

fn check_resource_version(
    key: &ResourceKey,
    previous: &Value,
    obj: &DynamicObject,
) -> Result<(), StoreError> {
    let Some(requested) = obj.metadata.resource_version.as_deref() else {
        return Ok(());
    };
    let current = previous["metadata"]["resourceVersion"].as_str().unwrap_or("");
    if requested == current {
        Ok(())
    } else {
        Err(StoreError::Conflict {
            key: key.clone(),
            message: format!(
                "the object has been modified; resourceVersion {requested} is stale (current {current})"
            ),
        })
    }
}

fn to_object(key: &ResourceKey, value: Value) -> Result<DynamicObject, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Serialization {
        key: key.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::GroupVersionKind;

    fn key(name: &str) -> ResourceKey {
        ResourceKey::new(
            GroupVersionKind::gvk("", "v1", "ConfigMap"),
            Some("ns".into()),
            name,
        )
    }

    fn object(name: &str, extra: Value) -> DynamicObject {
        let mut value = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": name, "namespace": "ns"},
        });
        if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_server_fields() {
        let store = MemoryStore::new();
        let created = store
            .create(&key("a"), &object("a", json!({"data": {"x": "1"}})))
            .await
            .unwrap();
        assert!(created.metadata.uid.is_some());
        assert!(created.metadata.resource_version.is_some());
        assert!(created.metadata.creation_timestamp.is_some());
        assert_eq!(created.metadata.generation, Some(1));

        let err = store.create(&key("a"), &object("a", json!({}))).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_update_rejects_stale_resource_version() {
        let store = MemoryStore::new();
        let created = store.create(&key("a"), &object("a", json!({}))).await.unwrap();

        let mut first = created.clone();
        first.data["data"] = json!({"x": "1"});
        store.update(&key("a"), &first).await.unwrap();

        let mut stale = created;
        stale.data["data"] = json!({"x": "2"});
        let err = store.update(&key("a"), &stale).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_update_and_update_status_touch_disjoint_fields() {
        let store = MemoryStore::new();
        let created = store.create(&key("a"), &object("a", json!({}))).await.unwrap();

        let mut with_status = created.clone();
        with_status.data["status"] = json!({"conditions": [{"type": "Ready", "status": "True"}]});
        with_status.data["data"] = json!({"ignored": "yes"});
        let after_status = store.update_status(&key("a"), &with_status).await.unwrap();
        assert_eq!(after_status.data["status"]["conditions"][0]["type"], "Ready");
        assert!(after_status.data.get("data").is_none());

        let mut spec_change = after_status.clone();
        spec_change.data["status"] = json!({});
        spec_change.data["data"] = json!({"x": "1"});
        let after_update = store.update(&key("a"), &spec_change).await.unwrap();
        assert_eq!(after_update.data["data"]["x"], "1");
        assert_eq!(after_update.data["status"]["conditions"][0]["type"], "Ready");
        assert_eq!(after_update.metadata.generation, Some(2));
    }

    #[tokio::test]
    async fn test_delete_waits_for_finalizers() {
        let store = MemoryStore::new();
        let created = store
            .create(
                &key("a"),
                &object("a", json!({"metadata": {"name": "a", "finalizers": ["f"]}})),
            )
            .await
            .unwrap();

        store.delete(&key("a")).await.unwrap();
        let terminating = store.get(&key("a")).await.unwrap();
        assert!(terminating.metadata.deletion_timestamp.is_some());
        assert_ne!(terminating.metadata.resource_version, created.metadata.resource_version);

        let mut released = terminating;
        released.metadata.finalizers = Some(Vec::new());
        store.update(&key("a"), &released).await.unwrap();
        assert!(!store.contains(&key("a")).await);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = MemoryStore::new();
        assert!(store.delete(&key("missing")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_noop_patch_does_not_write() {
        let store = MemoryStore::new();
        store.create(&key("a"), &object("a", json!({}))).await.unwrap();
        let writes = store.writes();
        store
            .patch(&key("a"), &json_patch::Patch(Vec::new()))
            .await
            .unwrap();
        assert_eq!(store.writes(), writes);
    }

    #[tokio::test]
    async fn test_faults_are_scoped_and_counted() {
        let store = MemoryStore::new();
        store.inject_fault(Fault::server_error(Verb::Create, "ConfigMap").named("b").times(1));

        store.create(&key("a"), &object("a", json!({}))).await.unwrap();
        assert!(store.create(&key("b"), &object("b", json!({}))).await.is_err());
        store.create(&key("b"), &object("b", json!({}))).await.unwrap();
    }
}
