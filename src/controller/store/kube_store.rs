//! API server backed object store

use super::{ObjectStore, ResourceKey, StoreError};
use crate::constants::FIELD_MANAGER;
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::core::{ApiResource, DynamicObject};
use kube::Client;
use serde_json::json;
use tracing::debug;

/// Object store on top of a Kubernetes client
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, key: &ResourceKey) -> Api<DynamicObject> {
        let resource = ApiResource::from_gvk(&key.gvk);
        match &key.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        }
    }

    fn patch_params() -> PatchParams {
        PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PatchParams::default()
        }
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(&self, key: &ResourceKey) -> Result<DynamicObject, StoreError> {
        self.api(key)
            .get(&key.name)
            .await
            .map_err(|e| StoreError::from_kube(key, e))
    }

    async fn create(
        &self,
        key: &ResourceKey,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        debug!(resource = %key, "Creating resource");
        self.api(key)
            .create(&Self::post_params(), obj)
            .await
            .map_err(|e| StoreError::from_kube(key, e))
    }

    async fn patch(
        &self,
        key: &ResourceKey,
        patch: &json_patch::Patch,
    ) -> Result<DynamicObject, StoreError> {
        self.api(key)
            .patch(
                &key.name,
                &Self::patch_params(),
                &Patch::<()>::Json(patch.clone()),
            )
            .await
            .map_err(|e| StoreError::from_kube(key, e))
    }

    async fn update(
        &self,
        key: &ResourceKey,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        self.api(key)
            .replace(&key.name, &Self::post_params(), obj)
            .await
            .map_err(|e| StoreError::from_kube(key, e))
    }

    async fn update_status(
        &self,
        key: &ResourceKey,
        obj: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        // Merge patch replaces lists wholesale, so the condition list is written
        // as a whole. The resourceVersion makes it a guarded read-modify-write.
        let body = json!({
            "metadata": { "resourceVersion": obj.metadata.resource_version },
            "status": obj.data.get("status").cloned().unwrap_or_else(|| json!({})),
        });
        self.api(key)
            .patch_status(
                &key.name,
                &Self::patch_params(),
                &Patch::Merge(&body),
            )
            .await
            .map_err(|e| StoreError::from_kube(key, e))
    }

    async fn delete(&self, key: &ResourceKey) -> Result<(), StoreError> {
        debug!(resource = %key, "Deleting resource");
        self.api(key)
            .delete(&key.name, &DeleteParams::background())
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube(key, e))
    }
}
