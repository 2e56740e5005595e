//! # Image Resolution
//!
//! Maps each operand component to the container image injected into its
//! workloads.
//!
//! Two environment conventions exist for overriding an image, and exactly one
//! is active per process:
//!
//! - `direct`: `CRANE_RUNNER_IMAGE`, `CRANE_UI_PLUGIN_IMAGE`, ...
//! - `related-image`: `RELATED_IMAGE_CRANE_RUNNER`, `RELATED_IMAGE_CRANE_UI_PLUGIN`, ...
//!
//! Either way an unset variable falls back to the component's hardcoded default.
//! The environment is snapshotted once, so resolution is a pure lookup.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Prefix of the related-image convention
pub const RELATED_IMAGE_PREFIX: &str = "RELATED_IMAGE_";

/// An operand component that carries its own image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    ReverseProxy,
    SecretService,
    UiPlugin,
    Runner,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::ReverseProxy,
        Component::SecretService,
        Component::UiPlugin,
        Component::Runner,
    ];

    /// Upper-case component identifier shared by both env conventions
    #[must_use]
    pub fn env_stem(self) -> &'static str {
        match self {
            Component::ReverseProxy => "CRANE_REVERSE_PROXY",
            Component::SecretService => "CRANE_SECRET_SERVICE",
            Component::UiPlugin => "CRANE_UI_PLUGIN",
            Component::Runner => "CRANE_RUNNER",
        }
    }

    /// Image used when no override is present
    #[must_use]
    pub fn default_image(self) -> &'static str {
        match self {
            Component::ReverseProxy => "quay.io/konveyor/crane-reverse-proxy:latest",
            Component::SecretService => "quay.io/konveyor/crane-secret-service:latest",
            Component::UiPlugin => "quay.io/konveyor/crane-ui-plugin:latest",
            Component::Runner => "quay.io/konveyor/crane-runner:latest",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Component::ReverseProxy => "reverse-proxy",
            Component::SecretService => "secret-service",
            Component::UiPlugin => "ui-plugin",
            Component::Runner => "runner",
        };
        f.write_str(name)
    }
}

/// Which environment convention resolves images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageEnvStrategy {
    /// `<COMPONENT>_IMAGE`
    #[default]
    Direct,
    /// `RELATED_IMAGE_<COMPONENT>`
    RelatedImage,
}

impl ImageEnvStrategy {
    /// Environment variable consulted for a component under this strategy
    #[must_use]
    pub fn env_var(self, component: Component) -> String {
        match self {
            ImageEnvStrategy::Direct => format!("{}_IMAGE", component.env_stem()),
            ImageEnvStrategy::RelatedImage => {
                format!("{RELATED_IMAGE_PREFIX}{}", component.env_stem())
            }
        }
    }
}

impl FromStr for ImageEnvStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Ok(ImageEnvStrategy::Direct),
            "related-image" | "related_image" | "relatedimage" => {
                Ok(ImageEnvStrategy::RelatedImage)
            }
            other => Err(format!(
                "unknown image env strategy '{other}' (expected 'direct' or 'related-image')"
            )),
        }
    }
}

impl fmt::Display for ImageEnvStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageEnvStrategy::Direct => f.write_str("direct"),
            ImageEnvStrategy::RelatedImage => f.write_str("related-image"),
        }
    }
}

/// Resolves component images from a snapshot of the environment
#[derive(Debug, Clone, Default)]
pub struct ImageResolver {
    strategy: ImageEnvStrategy,
    overrides: BTreeMap<String, String>,
}

impl ImageResolver {
    /// Build a resolver from an explicit set of variables
    pub fn new(
        strategy: ImageEnvStrategy,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let overrides = Component::ALL
            .iter()
            .map(|c| strategy.env_var(*c))
            .collect::<Vec<_>>();
        Self {
            strategy,
            overrides: vars
                .into_iter()
                .filter(|(k, _)| overrides.contains(k))
                .collect(),
        }
    }

    /// Snapshot the process environment
    pub fn from_env(strategy: ImageEnvStrategy) -> Self {
        Self::new(strategy, std::env::vars())
    }

    #[must_use]
    pub fn strategy(&self) -> ImageEnvStrategy {
        self.strategy
    }

    /// Image reference for a component. Never fails.
    #[must_use]
    pub fn resolve(&self, component: Component) -> String {
        self.overrides
            .get(&self.strategy.env_var(component))
            .cloned()
            .unwrap_or_else(|| component.default_image().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_unset() {
        let resolver = ImageResolver::new(ImageEnvStrategy::Direct, Vec::new());
        for component in Component::ALL {
            assert_eq!(resolver.resolve(component), component.default_image());
        }
    }

    #[test]
    fn test_direct_strategy_reads_component_variable() {
        let resolver = ImageResolver::new(
            ImageEnvStrategy::Direct,
            vars(&[
                ("CRANE_RUNNER_IMAGE", "registry.local/runner:v2"),
                ("RELATED_IMAGE_CRANE_UI_PLUGIN", "ignored:v1"),
            ]),
        );
        assert_eq!(resolver.resolve(Component::Runner), "registry.local/runner:v2");
        assert_eq!(
            resolver.resolve(Component::UiPlugin),
            Component::UiPlugin.default_image()
        );
    }

    #[test]
    fn test_related_image_strategy_reads_prefixed_variable() {
        let resolver = ImageResolver::new(
            ImageEnvStrategy::RelatedImage,
            vars(&[
                ("RELATED_IMAGE_CRANE_UI_PLUGIN", "registry.local/ui@sha256:abc"),
                ("CRANE_RUNNER_IMAGE", "ignored:v1"),
            ]),
        );
        assert_eq!(
            resolver.resolve(Component::UiPlugin),
            "registry.local/ui@sha256:abc"
        );
        assert_eq!(
            resolver.resolve(Component::Runner),
            Component::Runner.default_image()
        );
    }

    #[test]
    fn test_empty_override_counts_as_set() {
        let resolver =
            ImageResolver::new(ImageEnvStrategy::Direct, vars(&[("CRANE_RUNNER_IMAGE", "")]));
        assert_eq!(resolver.resolve(Component::Runner), "");
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("direct".parse(), Ok(ImageEnvStrategy::Direct));
        assert_eq!("Related-Image".parse(), Ok(ImageEnvStrategy::RelatedImage));
        assert!("olm".parse::<ImageEnvStrategy>().is_err());
    }
}
