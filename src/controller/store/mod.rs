//! # Object Store
//!
//! The seam between the reconciliation engine and wherever objects live.
//!
//! - `KubeStore` talks to the API server through `kube::Api<DynamicObject>`
//! - `MemoryStore` keeps objects in-process with API-server-like semantics
//!
//! Objects cross the seam as `DynamicObject`; typed views are converted with
//! [`to_dynamic`] / [`from_dynamic`]. [`create_or_patch`] builds the
//! idempotent apply on top of the raw verbs.

mod kube_store;
mod memory;

pub use kube_store::KubeStore;
pub use memory::{Fault, MemoryStore, Verb};

use crate::constants::CREATE_OR_PATCH_ATTEMPTS;
use async_trait::async_trait;
use kube::core::{DynamicObject, GroupVersionKind, TypeMeta};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Identity of a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKey {
    pub gvk: GroupVersionKind,
    /// `None` for cluster-scoped kinds
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceKey {
    pub fn new(gvk: GroupVersionKind, namespace: Option<String>, name: impl Into<String>) -> Self {
        Self {
            gvk,
            namespace,
            name: name.into(),
        }
    }

    /// Key for a statically typed kind
    pub fn of<K>(namespace: Option<String>, name: impl Into<String>) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        let gvk = GroupVersionKind::gvk(&K::group(&()), &K::version(&()), &K::kind(&()));
        Self::new(gvk, namespace, name)
    }

    /// `group/version`, or just `version` for the core group
    #[must_use]
    pub fn api_version(&self) -> String {
        if self.gvk.group.is_empty() {
            self.gvk.version.clone()
        } else {
            format!("{}/{}", self.gvk.group, self.gvk.version)
        }
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.gvk.kind
    }

    pub(crate) fn type_meta(&self) -> TypeMeta {
        TypeMeta {
            api_version: self.api_version(),
            kind: self.gvk.kind.clone(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.gvk.kind, ns, self.name),
            None => write!(f, "{} {}", self.gvk.kind, self.name),
        }
    }
}

/// Object store errors
///
/// `NotFound`, `AlreadyExists`, `Conflict` and `Gone` are the conditions the
/// engine reacts to; everything else is propagated as-is.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(ResourceKey),
    #[error("{0} already exists")]
    AlreadyExists(ResourceKey),
    #[error("conflict writing {key}: {message}")]
    Conflict { key: ResourceKey, message: String },
    #[error("{0} is gone")]
    Gone(ResourceKey),
    #[error("API error on {key}: {message} ({code} {reason})")]
    Api {
        key: ResourceKey,
        code: u16,
        reason: String,
        message: String,
    },
    #[error("Kubernetes client error on {key}: {source}")]
    Client {
        key: ResourceKey,
        #[source]
        source: kube::Error,
    },
    #[error("failed to convert {key}: {source}")]
    Serialization {
        key: ResourceKey,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid patch for {key}: {message}")]
    InvalidPatch { key: ResourceKey, message: String },
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Not found, or gone while being deleted
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, StoreError::NotFound(_) | StoreError::Gone(_))
    }

    /// Classify a client error against the object it concerned
    pub fn from_kube(key: &ResourceKey, err: kube::Error) -> Self {
        match err {
            kube::Error::Api(api_err) => match api_err.code {
                404 => StoreError::NotFound(key.clone()),
                409 if api_err.reason == "AlreadyExists" => StoreError::AlreadyExists(key.clone()),
                409 => StoreError::Conflict {
                    key: key.clone(),
                    message: api_err.message,
                },
                410 => StoreError::Gone(key.clone()),
                code => StoreError::Api {
                    key: key.clone(),
                    code,
                    reason: api_err.reason,
                    message: api_err.message,
                },
            },
            other => StoreError::Client {
                key: key.clone(),
                source: other,
            },
        }
    }
}

/// Verbs the engine needs from a store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &ResourceKey) -> Result<DynamicObject, StoreError>;

    async fn create(
        &self,
        key: &ResourceKey,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    /// Apply an RFC 6902 JSON patch
    async fn patch(
        &self,
        key: &ResourceKey,
        patch: &json_patch::Patch,
    ) -> Result<DynamicObject, StoreError>;

    /// Replace the object (not its status), guarded by `resourceVersion`
    async fn update(
        &self,
        key: &ResourceKey,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    /// Replace the status subresource with `obj`'s status
    async fn update_status(
        &self,
        key: &ResourceKey,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;

    /// Delete with background propagation
    async fn delete(&self, key: &ResourceKey) -> Result<(), StoreError>;
}

/// Outcome of [`create_or_patch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    Created,
    Updated,
}

impl OperationResult {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OperationResult::Created => "created",
            OperationResult::Updated => "updated",
        }
    }
}

impl fmt::Display for OperationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert a typed object to its dynamic form
pub fn to_dynamic<K: Serialize>(key: &ResourceKey, obj: &K) -> Result<DynamicObject, StoreError> {
    serde_json::to_value(obj)
        .and_then(serde_json::from_value)
        .map_err(|source| StoreError::Serialization {
            key: key.clone(),
            source,
        })
}

/// Convert a dynamic object to a typed view
pub fn from_dynamic<K: DeserializeOwned>(
    key: &ResourceKey,
    obj: &DynamicObject,
) -> Result<K, StoreError> {
    serde_json::to_value(obj)
        .and_then(serde_json::from_value)
        .map_err(|source| StoreError::Serialization {
            key: key.clone(),
            source,
        })
}

/// Create the object if absent, otherwise patch the fields `mutate` changed
///
/// `mutate` receives either a bare object (name and namespace only) or the
/// live object, and must bring it to the desired state. It learns which case
/// it is in from `metadata.creation_timestamp` / `metadata.uid` being set.
/// An empty diff issues no write and still reports `Updated`.
pub async fn create_or_patch<K, F, E>(
    store: &dyn ObjectStore,
    key: &ResourceKey,
    mut mutate: F,
) -> Result<OperationResult, E>
where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Clone + Send,
    F: FnMut(&mut K) -> Result<(), E> + Send,
    E: From<StoreError>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match store.get(key).await {
            Err(StoreError::NotFound(_)) => {
                let mut obj: K = bare_object(key)?;
                mutate(&mut obj)?;
                let mut dynamic = to_dynamic(key, &obj)?;
                dynamic.types = Some(key.type_meta());

                match store.create(key, &dynamic).await {
                    Ok(_) => return Ok(OperationResult::Created),
                    Err(StoreError::AlreadyExists(_)) if attempt < CREATE_OR_PATCH_ATTEMPTS => {
                        info!(
                            resource = %key,
                            attempt = attempt,
                            "Resource appeared concurrently, retrying as update"
                        );
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
            Ok(live) => {
                let before: K = from_dynamic(key, &live)?;
                let mut after = before.clone();
                mutate(&mut after)?;

                let before = serde_json::to_value(&before).map_err(|source| {
                    StoreError::Serialization {
                        key: key.clone(),
                        source,
                    }
                })?;
                let after = serde_json::to_value(&after).map_err(|source| {
                    StoreError::Serialization {
                        key: key.clone(),
                        source,
                    }
                })?;

                let patch = json_patch::diff(&before, &after);
                if patch.0.is_empty() {
                    debug!(resource = %key, "No changes to apply");
                } else {
                    debug!(resource = %key, operations = patch.0.len(), "Patching resource");
                    store.patch(key, &patch).await?;
                }
                return Ok(OperationResult::Updated);
            }
        }
    }
}

/// A typed object carrying only the identity fields of `key`
///
/// Custom resource types require a `spec`, so an empty one is supplied when
/// the identity alone does not decode.
fn bare_object<K: DeserializeOwned>(key: &ResourceKey) -> Result<K, StoreError> {
    let mut metadata = serde_json::Map::new();
    metadata.insert("name".into(), key.name.clone().into());
    if let Some(ns) = &key.namespace {
        metadata.insert("namespace".into(), ns.clone().into());
    }
    let mut identity = serde_json::json!({
        "apiVersion": key.api_version(),
        "kind": key.gvk.kind,
        "metadata": metadata,
    });
    if let Ok(obj) = serde_json::from_value(identity.clone()) {
        return Ok(obj);
    }
    identity["spec"] = serde_json::json!({});
    serde_json::from_value(identity).map_err(|source| StoreError::Serialization {
        key: key.clone(),
        source,
    })
}
