//! Common test utilities for the integration tests
//!
//! A [`Harness`] pairs an in-memory object store with a reconciler reading
//! bundles from a scratch directory (or the shipped `manifests/`).

#![allow(dead_code, reason = "not every test binary uses every helper")]

use crane_operator::controller::store::{from_dynamic, to_dynamic};
use crane_operator::prelude::*;
use kube::Resource;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub const OWNER: &str = "openshift-migration";
pub const NAMESPACE: &str = "openshift-migration";

/// Image every scratch operand runs
pub fn image_for(manifest: &str) -> String {
    format!("registry.test/{}:v1", manifest.trim_end_matches(".yaml"))
}

pub struct Harness {
    pub store: MemoryStore,
    pub reconciler: Reconciler,
    _dir: Option<TempDir>,
}

impl Harness {
    /// Bundles written to a scratch directory, one operand per bundle in the
    /// given order, each with a fixed image from [`image_for`].
    pub fn with_bundles(bundles: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in bundles {
            std::fs::write(dir.path().join(name), contents).unwrap();
        }
        let catalog = OperandCatalog::new(
            bundles
                .iter()
                .map(|(name, _)| Operand::with_image(*name, image_for(name)))
                .collect(),
        );
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(
            Arc::new(store.clone()),
            ManifestSource::new(dir.path()),
            catalog,
            OWNER,
            NAMESPACE,
        );
        Self {
            store,
            reconciler,
            _dir: Some(dir),
        }
    }

    /// The shipped bundles and the Crane catalog, images resolved from `vars`
    pub fn shipped(strategy: ImageEnvStrategy, vars: &[(&str, &str)]) -> Self {
        let resolver = Arc::new(ImageResolver::new(
            strategy,
            vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())),
        ));
        let store = MemoryStore::new();
        let reconciler = Reconciler::new(
            Arc::new(store.clone()),
            ManifestSource::new(shipped_manifest_dir()),
            OperandCatalog::crane(resolver),
            OWNER,
            NAMESPACE,
        );
        Self {
            store,
            reconciler,
            _dir: None,
        }
    }

    /// Create an `OperatorConfig` as a user would
    pub async fn seed_config(&self, name: &str) -> ResourceKey {
        let key = ResourceKey::of::<OperatorConfig>(None, name);
        let config = OperatorConfig::new(name, OperatorConfigSpec {});
        self.store
            .seed(&key, &to_dynamic(&key, &config).unwrap())
            .await;
        key
    }

    pub async fn config(&self, name: &str) -> Option<OperatorConfig> {
        self.get::<OperatorConfig>(None, name).await
    }

    pub async fn reconcile(&self, name: &str) -> Result<ReconcileOutcome, ReconcilerError> {
        reconcile(&self.reconciler, name).await
    }

    /// Reconcile until a pass reports `Done`
    pub async fn converge(&self, name: &str) -> Result<(), ReconcilerError> {
        for _ in 0..3 {
            if self.reconcile(name).await? == ReconcileOutcome::Done {
                return Ok(());
            }
        }
        panic!("{name} did not converge in 3 passes");
    }

    /// Mark the `OperatorConfig` for deletion
    pub async fn delete_config(&self, name: &str) {
        let key = ResourceKey::of::<OperatorConfig>(None, name);
        self.store.delete(&key).await.unwrap();
    }

    pub async fn get<K>(&self, namespace: Option<&str>, name: &str) -> Option<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let key = ResourceKey::of::<K>(namespace.map(str::to_string), name);
        match self.store.get(&key).await {
            Ok(obj) => Some(from_dynamic(&key, &obj).unwrap()),
            Err(e) if e.is_not_found() => None,
            Err(e) => panic!("get {key} failed: {e}"),
        }
    }

    /// Overwrite a stored object, as another writer would
    pub async fn put<K>(&self, obj: &K)
    where
        K: Resource<DynamicType = ()> + serde::Serialize,
    {
        let meta = obj.meta();
        let key = ResourceKey::of::<K>(
            meta.namespace.clone(),
            meta.name.clone().unwrap_or_default(),
        );
        let mut dynamic = to_dynamic(&key, obj).unwrap();
        dynamic.metadata.resource_version = None;
        self.store.update(&key, &dynamic).await.unwrap();
    }
}

pub fn shipped_manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("manifests")
}

/// A minimal namespaced Deployment document
pub fn deployment_doc(name: &str) -> String {
    format!(
        "apiVersion: apps/v1
kind: Deployment
metadata:
  name: {name}
  labels:
    app: {name}
spec:
  replicas: 1
  selector:
    matchLabels:
      app: {name}
  template:
    metadata:
      labels:
        app: {name}
    spec:
      containers:
        - name: main
          image: placeholder:latest
        - name: sidecar
          image: other:latest
"
    )
}

pub fn service_doc(name: &str) -> String {
    format!(
        "apiVersion: v1
kind: Service
metadata:
  name: {name}
spec:
  selector:
    app: {name}
  ports:
    - name: https
      port: 8443
      targetPort: 8443
"
    )
}

pub fn config_map_doc(name: &str, value: &str) -> String {
    format!(
        "apiVersion: v1
kind: ConfigMap
metadata:
  name: {name}
data:
  key: \"{value}\"
"
    )
}

pub fn cluster_task_doc(name: &str) -> String {
    format!(
        "apiVersion: tekton.dev/v1beta1
kind: ClusterTask
metadata:
  name: {name}
spec:
  params:
    - name: target
      type: string
  steps:
    - name: first
      image: placeholder:latest
      script: echo one
    - name: second
      script: echo two
"
    )
}

/// Join documents into one bundle
pub fn bundle(docs: &[String]) -> String {
    docs.iter()
        .map(|doc| format!("---\n{doc}"))
        .collect::<String>()
}
