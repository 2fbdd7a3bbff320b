//! `ragbridge providers`: list the providers the configuration registers.

use std::path::Path;

use ragbridge_providers::{ProviderRouter, build_from_config};

pub fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let router = build_from_config(&config);

    println!("Registered providers");
    println!("====================");
    for line in describe(&router) {
        println!("  {line}");
    }
    println!();
    println!("  Unlisted models are {}.", match config.model_fallback {
        ragbridge_config::ModelFallback::Reject => "rejected",
        ragbridge_config::ModelFallback::Default => "replaced by the provider default",
    });

    Ok(())
}

fn describe(router: &ProviderRouter) -> Vec<String> {
    router
        .list()
        .into_iter()
        .filter_map(|name| {
            let (default_model, allowed) = router.models(name)?;
            let marker = if name == router.default_provider() { " (default)" } else { "" };
            let allowed = if allowed.is_empty() {
                "any model".to_string()
            } else {
                allowed.join(", ")
            };
            Some(format!("{name}{marker}: {default_model} [{allowed}]"))
        })
        .collect()
}
