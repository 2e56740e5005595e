//! Integration tests for per-kind reconciliation
//!
//! Field ownership, drift healing, image injection and the unsupported-kind
//! guard, each on a converged `OperatorConfig`.

mod common;

use common::*;
use crane_operator::controller::store::{to_dynamic, Fault};
use crane_operator::prelude::*;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::collections::BTreeMap;

const SECRET_DOC: &str = "apiVersion: v1
kind: Secret
metadata:
  name: not-managed
stringData:
  token: abc
";

/// A harness with one operand, past the finalizer pass
async fn installed(manifest: &str, contents: &str) -> Harness {
    let h = Harness::with_bundles(&[(manifest, contents)]);
    h.seed_config(OWNER).await;
    assert_eq!(h.reconcile(OWNER).await.unwrap(), ReconcileOutcome::Requeue);
    h
}

mod deployments {
    use super::*;

    #[tokio::test]
    async fn test_every_container_runs_operand_image() {
        let h = installed("app.yaml", &bundle(&[deployment_doc("app")])).await;
        h.reconcile(OWNER).await.unwrap();

        let deployment: Deployment = h.get(Some(NAMESPACE), "app").await.unwrap();
        let pod = deployment.spec.unwrap().template.spec.unwrap();
        assert_eq!(pod.containers.len(), 2);
        for container in &pod.containers {
            assert_eq!(container.image.as_deref(), Some(image_for("app.yaml").as_str()));
        }
    }

    #[tokio::test]
    async fn test_replicas_stay_with_cluster_template_is_healed() {
        let h = installed("app.yaml", &bundle(&[deployment_doc("app")])).await;
        h.reconcile(OWNER).await.unwrap();

        let mut live: Deployment = h.get(Some(NAMESPACE), "app").await.unwrap();
        let spec = live.spec.as_mut().unwrap();
        spec.replicas = Some(5);
        let pod = spec.template.spec.as_mut().unwrap();
        pod.containers[0].image = Some("tampered:latest".into());
        pod.containers.push(pod.containers[1].clone());
        h.put(&live).await;

        assert_eq!(h.reconcile(OWNER).await.unwrap(), ReconcileOutcome::Done);

        let healed: Deployment = h.get(Some(NAMESPACE), "app").await.unwrap();
        let spec = healed.spec.unwrap();
        assert_eq!(spec.replicas, Some(5));
        let pod = spec.template.spec.unwrap();
        assert_eq!(pod.containers.len(), 2);
        assert_eq!(pod.containers[0].image.as_deref(), Some(image_for("app.yaml").as_str()));
    }

    #[tokio::test]
    async fn test_removed_owner_reference_restored_replicas_kept() {
        let h = installed("app.yaml", &bundle(&[deployment_doc("app")])).await;
        h.reconcile(OWNER).await.unwrap();
        let uid = h.config(OWNER).await.unwrap().metadata.uid.unwrap();

        let mut live: Deployment = h.get(Some(NAMESPACE), "app").await.unwrap();
        live.metadata.owner_references = None;
        live.spec.as_mut().unwrap().replicas = Some(7);
        h.put(&live).await;

        assert_eq!(h.reconcile(OWNER).await.unwrap(), ReconcileOutcome::Done);

        let healed: Deployment = h.get(Some(NAMESPACE), "app").await.unwrap();
        let refs = healed.metadata.owner_references.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].uid, uid);
        assert_eq!(refs[0].block_owner_deletion, Some(true));
        assert_eq!(healed.spec.unwrap().replicas, Some(7));
    }

    #[tokio::test]
    async fn test_foreign_controller_is_rejected() {
        let h = installed("app.yaml", &bundle(&[deployment_doc("app")])).await;

        let mut foreign: Deployment = serde_yaml::from_str(&deployment_doc("app")).unwrap();
        foreign.metadata.namespace = Some(NAMESPACE.to_string());
        foreign.metadata.owner_references = Some(vec![OwnerReference {
            api_version: "apps/v1".into(),
            kind: "ReplicaSet".into(),
            name: "someone-else".into(),
            uid: "1234".into(),
            controller: Some(true),
            block_owner_deletion: None,
        }]);
        let key = ResourceKey::of::<Deployment>(Some(NAMESPACE.to_string()), "app");
        h.store.seed(&key, &to_dynamic(&key, &foreign).unwrap()).await;

        let err = h.reconcile(OWNER).await.unwrap_err();
        assert!(matches!(err, ReconcilerError::AlreadyOwned { .. }), "{err:?}");
    }
}

mod services {
    use super::*;

    #[tokio::test]
    async fn test_cluster_assigned_fields_survive_reconcile() {
        let h = installed("svc.yaml", &bundle(&[service_doc("svc")])).await;
        h.reconcile(OWNER).await.unwrap();

        let mut live: Service = h.get(Some(NAMESPACE), "svc").await.unwrap();
        let spec = live.spec.as_mut().unwrap();
        spec.cluster_ip = Some("172.30.12.7".into());
        spec.cluster_ips = Some(vec!["172.30.12.7".into()]);
        spec.ip_family_policy = Some("SingleStack".into());
        spec.ports.as_mut().unwrap()[0].node_port = Some(31443);
        h.put(&live).await;

        let writes = h.store.writes();
        assert_eq!(h.reconcile(OWNER).await.unwrap(), ReconcileOutcome::Done);
        assert_eq!(h.store.writes(), writes, "nothing to patch");

        let spec = h
            .get::<Service>(Some(NAMESPACE), "svc")
            .await
            .unwrap()
            .spec
            .unwrap();
        assert_eq!(spec.cluster_ip.as_deref(), Some("172.30.12.7"));
        assert_eq!(spec.ports.unwrap()[0].node_port, Some(31443));
    }

    #[tokio::test]
    async fn test_selector_drift_is_healed() {
        let h = installed("svc.yaml", &bundle(&[service_doc("svc")])).await;
        h.reconcile(OWNER).await.unwrap();

        let mut live: Service = h.get(Some(NAMESPACE), "svc").await.unwrap();
        live.spec.as_mut().unwrap().selector =
            Some(BTreeMap::from([("app".to_string(), "other".to_string())]));
        h.put(&live).await;

        h.reconcile(OWNER).await.unwrap();
        let spec = h
            .get::<Service>(Some(NAMESPACE), "svc")
            .await
            .unwrap()
            .spec
            .unwrap();
        assert_eq!(spec.selector.unwrap()["app"], "svc");
    }
}

mod config_maps {
    use super::*;

    #[tokio::test]
    async fn test_data_drift_is_healed_and_foreign_labels_kept() {
        let h = installed("cm.yaml", &bundle(&[config_map_doc("cm", "want")])).await;
        h.reconcile(OWNER).await.unwrap();

        let mut live: ConfigMap = h.get(Some(NAMESPACE), "cm").await.unwrap();
        live.data = Some(BTreeMap::from([("key".to_string(), "drifted".to_string())]));
        live.metadata.labels = Some(BTreeMap::from([("team".to_string(), "ops".to_string())]));
        h.put(&live).await;

        h.reconcile(OWNER).await.unwrap();

        let healed: ConfigMap = h.get(Some(NAMESPACE), "cm").await.unwrap();
        assert_eq!(healed.data.unwrap()["key"], "want");
        // The template has no labels, so they are not ours to reset
        assert_eq!(healed.metadata.labels.unwrap()["team"], "ops");
    }

    #[tokio::test]
    async fn test_template_namespace_wins_over_install_namespace() {
        let doc = config_map_doc("elsewhere", "x").replace(
            "  name: elsewhere\n",
            "  name: elsewhere\n  namespace: other-ns\n",
        );
        let h = installed("cm.yaml", &bundle(&[doc])).await;
        h.reconcile(OWNER).await.unwrap();

        assert!(h.get::<ConfigMap>(Some("other-ns"), "elsewhere").await.is_some());
        assert!(h.get::<ConfigMap>(Some(NAMESPACE), "elsewhere").await.is_none());
    }

    #[tokio::test]
    async fn test_lost_create_race_recovers_as_update() {
        let h = installed("cm.yaml", &bundle(&[config_map_doc("cm", "want")])).await;
        h.store.inject_fault(Fault::lost_create_race("ConfigMap"));

        assert_eq!(h.reconcile(OWNER).await.unwrap(), ReconcileOutcome::Done);
        assert_eq!(h.store.list("ConfigMap").await.len(), 1);
    }
}

mod cluster_tasks {
    use super::*;

    #[tokio::test]
    async fn test_steps_get_operand_image_other_fields_kept() {
        let h = installed("tasks.yaml", &bundle(&[cluster_task_doc("build")])).await;
        h.reconcile(OWNER).await.unwrap();

        let task: ClusterTask = h.get(None, "build").await.unwrap();
        assert!(task.metadata.namespace.is_none());
        assert_eq!(task.spec.steps.len(), 2);
        for step in &task.spec.steps {
            assert_eq!(step.image.as_deref(), Some(image_for("tasks.yaml").as_str()));
        }
        assert_eq!(task.spec.steps[0].rest["script"], "echo one");
        assert!(task.spec.rest.contains_key("params"));
    }
}

mod unsupported_kinds {
    use super::*;

    #[tokio::test]
    async fn test_unsupported_kind_first_applies_nothing() {
        let h = installed(
            "mixed.yaml",
            &bundle(&[SECRET_DOC.to_string(), config_map_doc("cm", "x")]),
        )
        .await;

        let err = h.reconcile(OWNER).await.unwrap_err();
        match err {
            ReconcilerError::UnsupportedKind { kind, manifest, .. } => {
                assert_eq!(kind, "Secret");
                assert_eq!(manifest, "mixed.yaml");
            }
            other => panic!("expected UnsupportedKind, got {other:?}"),
        }
        assert!(h.get::<ConfigMap>(Some(NAMESPACE), "cm").await.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_kind_last_keeps_earlier_documents() {
        let h = installed(
            "mixed.yaml",
            &bundle(&[config_map_doc("cm", "x"), SECRET_DOC.to_string()]),
        )
        .await;

        let err = h.reconcile(OWNER).await.unwrap_err();
        assert!(matches!(err, ReconcilerError::UnsupportedKind { .. }));
        assert!(h.get::<ConfigMap>(Some(NAMESPACE), "cm").await.is_some());
    }

    #[tokio::test]
    async fn test_failure_stops_later_operands() {
        let bad = bundle(&[SECRET_DOC.to_string()]);
        let good = bundle(&[config_map_doc("later", "x")]);
        let h = Harness::with_bundles(&[
            ("bad.yaml", bad.as_str()),
            ("good.yaml", good.as_str()),
        ]);
        h.seed_config(OWNER).await;

        assert!(h.converge(OWNER).await.is_err());
        assert!(h.get::<ConfigMap>(Some(NAMESPACE), "later").await.is_none());
    }

    #[tokio::test]
    async fn test_same_kind_other_group_is_unsupported() {
        let doc = deployment_doc("old").replace("apps/v1", "extensions/v1beta1");
        let h = installed("old.yaml", &bundle(&[doc])).await;

        let err = h.reconcile(OWNER).await.unwrap_err();
        assert!(matches!(err, ReconcilerError::UnsupportedKind { .. }));
    }

    #[tokio::test]
    async fn test_missing_bundle_is_reported() {
        let h = installed("present.yaml", "").await;
        std::fs::remove_file(h.reconciler.manifests.path_for("present.yaml")).unwrap();

        let err = h.reconcile(OWNER).await.unwrap_err();
        assert!(matches!(err, ReconcilerError::ManifestUnreadable(_)));
        assert!(err.to_string().contains("present.yaml"));
    }
}
