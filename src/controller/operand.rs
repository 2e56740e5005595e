//! # Operand Catalog
//!
//! The fixed list of operands the operator installs, each a manifest bundle
//! paired with the image its workloads run.
//!
//! The catalog is a value handed to the reconciler, so tests can swap in a
//! smaller one. Declaration order is reconciliation and teardown order.

use crate::controller::images::{Component, ImageResolver};
use std::fmt;
use std::sync::Arc;

/// Zero-argument image lookup for one operand
pub type ImageFn = Arc<dyn Fn() -> String + Send + Sync>;

/// One operand: a bundle and the image injected into it
#[derive(Clone)]
pub struct Operand {
    /// Bundle name, resolved against the manifest directory
    pub manifest: String,
    pub image: ImageFn,
}

impl Operand {
    pub fn new(manifest: impl Into<String>, image: ImageFn) -> Self {
        Self {
            manifest: manifest.into(),
            image,
        }
    }

    /// Operand whose image is a fixed string
    pub fn with_image(manifest: impl Into<String>, image: impl Into<String>) -> Self {
        let image = image.into();
        Self::new(manifest, Arc::new(move || image.clone()))
    }

    #[must_use]
    pub fn resolve_image(&self) -> String {
        (self.image)()
    }
}

impl fmt::Debug for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operand")
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}

/// Ordered operand list
#[derive(Debug, Clone, Default)]
pub struct OperandCatalog {
    operands: Vec<Operand>,
}

impl OperandCatalog {
    #[must_use]
    pub fn new(operands: Vec<Operand>) -> Self {
        Self { operands }
    }

    /// The Crane operands, in install order
    #[must_use]
    pub fn crane(resolver: Arc<ImageResolver>) -> Self {
        let operand = |manifest: &str, component: Component| {
            let resolver = Arc::clone(&resolver);
            Operand::new(manifest, Arc::new(move || resolver.resolve(component)))
        };

        Self::new(vec![
            operand("crane-reverse-proxy.yaml", Component::ReverseProxy),
            operand("crane-secret-service.yaml", Component::SecretService),
            operand("crane-ui-plugin.yaml", Component::UiPlugin),
            operand("crane-runner.yaml", Component::Runner),
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operand> {
        self.operands.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.operands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }
}

impl<'a> IntoIterator for &'a OperandCatalog {
    type Item = &'a Operand;
    type IntoIter = std::slice::Iter<'a, Operand>;

    fn into_iter(self) -> Self::IntoIter {
        self.operands.iter()
    }
}
