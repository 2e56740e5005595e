//! # Images Command
//!
//! Prints the image each operand resolves to under a given strategy.

use crane_operator::controller::images::{Component, ImageEnvStrategy, ImageResolver};

pub fn images_command(strategy: ImageEnvStrategy) {
    let resolver = ImageResolver::from_env(strategy);

    println!("Image strategy: {strategy}");
    println!();
    for line in render(&resolver) {
        println!("{line}");
    }
}

fn render(resolver: &ImageResolver) -> Vec<String> {
    Component::ALL
        .iter()
        .map(|component| {
            let var = resolver.strategy().env_var(*component);
            let image = resolver.resolve(*component);
            let source = if image == component.default_image() {
                "default"
            } else {
                var.as_str()
            };
            format!("  {component:<16} {image}  ({source})")
        })
        .collect()
}
