//! # Ownership
//!
//! Controller owner references and finalizer bookkeeping.

use super::types::ReconcilerError;
use crate::crd::OperatorConfig;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;

/// Make `owner` the controlling owner of the object described by `meta`.
///
/// An existing reference to the same owner is refreshed in place. A
/// different controlling owner is an error; non-controller references are
/// left alone.
pub fn set_controller_reference(
    owner: &OperatorConfig,
    meta: &mut ObjectMeta,
) -> Result<(), ReconcilerError> {
    let owner_name = owner.metadata.name.clone().unwrap_or_default();
    let reference = owner
        .controller_owner_ref(&())
        .map(|reference| OwnerReference {
            block_owner_deletion: Some(true),
            ..reference
        })
        .ok_or_else(|| ReconcilerError::OwnerWithoutUid(owner_name.clone()))?;

    let refs = meta.owner_references.get_or_insert_with(Vec::new);

    if let Some(other) = refs
        .iter()
        .find(|r| r.controller == Some(true) && !same_owner(r, &reference))
    {
        return Err(ReconcilerError::AlreadyOwned {
            resource: meta.name.clone().unwrap_or_default(),
            owner: format!("{} {}", other.kind, other.name),
        });
    }

    match refs.iter_mut().find(|r| same_owner(r, &reference)) {
        Some(existing) => *existing = reference,
        None => refs.push(reference),
    }
    Ok(())
}

/// Same group, kind and name; the version part of `apiVersion` is ignored
fn same_owner(a: &OwnerReference, b: &OwnerReference) -> bool {
    group_of(&a.api_version) == group_of(&b.api_version) && a.kind == b.kind && a.name == b.name
}

fn group_of(api_version: &str) -> &str {
    api_version.split_once('/').map_or("", |(group, _)| group)
}

#[must_use]
pub fn has_finalizer(meta: &ObjectMeta, finalizer: &str) -> bool {
    meta.finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|x| x == finalizer))
}

/// Returns `true` if the finalizer was added
pub fn add_finalizer(meta: &mut ObjectMeta, finalizer: &str) -> bool {
    if has_finalizer(meta, finalizer) {
        return false;
    }
    meta.finalizers
        .get_or_insert_with(Vec::new)
        .push(finalizer.to_string());
    true
}

/// Returns `true` if the finalizer was present
pub fn remove_finalizer(meta: &mut ObjectMeta, finalizer: &str) -> bool {
    let Some(finalizers) = meta.finalizers.as_mut() else {
        return false;
    };
    let before = finalizers.len();
    finalizers.retain(|f| f != finalizer);
    finalizers.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::OperatorConfigSpec;

    fn owner(uid: Option<&str>) -> OperatorConfig {
        let mut config = OperatorConfig::new("openshift-migration", OperatorConfigSpec {});
        config.metadata.uid = uid.map(String::from);
        config
    }

    #[test]
    fn test_controller_reference_is_set_once() {
        let owner = owner(Some("uid-1"));
        let mut meta = ObjectMeta::default();

        set_controller_reference(&owner, &mut meta).unwrap();
        set_controller_reference(&owner, &mut meta).unwrap();

        let refs = meta.owner_references.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].uid, "uid-1");
        assert_eq!(refs[0].kind, "OperatorConfig");
        assert_eq!(refs[0].api_version, "crane.konveyor.io/v1alpha1");
        assert_eq!(refs[0].controller, Some(true));
        assert_eq!(refs[0].block_owner_deletion, Some(true));
    }

    #[test]
    fn test_reference_refreshed_after_owner_recreated() {
        let mut meta = ObjectMeta::default();
        set_controller_reference(&owner(Some("old")), &mut meta).unwrap();
        set_controller_reference(&owner(Some("new")), &mut meta).unwrap();

        let refs = meta.owner_references.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].uid, "new");
    }

    #[test]
    fn test_foreign_controller_is_rejected() {
        let mut meta = ObjectMeta {
            name: Some("crane-proxy".into()),
            owner_references: Some(vec![OwnerReference {
                api_version: "apps/v1".into(),
                kind: "ReplicaSet".into(),
                name: "other".into(),
                uid: "x".into(),
                controller: Some(true),
                block_owner_deletion: None,
            }]),
            ..ObjectMeta::default()
        };

        let err = set_controller_reference(&owner(Some("uid-1")), &mut meta).unwrap_err();
        assert!(matches!(err, ReconcilerError::AlreadyOwned { .. }));
    }

    #[test]
    fn test_owner_without_uid() {
        let err = set_controller_reference(&owner(None), &mut ObjectMeta::default()).unwrap_err();
        assert!(matches!(err, ReconcilerError::OwnerWithoutUid(_)));
    }

    #[test]
    fn test_finalizer_helpers() {
        let mut meta = ObjectMeta::default();
        assert!(!has_finalizer(&meta, "a"));
        assert!(add_finalizer(&mut meta, "a"));
        assert!(!add_finalizer(&mut meta, "a"));
        assert!(add_finalizer(&mut meta, "b"));
        assert!(remove_finalizer(&mut meta, "a"));
        assert!(!remove_finalizer(&mut meta, "a"));
        assert_eq!(meta.finalizers.unwrap(), vec!["b".to_string()]);
    }
}
