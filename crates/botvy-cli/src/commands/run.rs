//! `botvy run` - load and initialize the configured plugins.

use std::path::Path;

use anyhow::Context;
use botvy_plugins::{
    DirectoryPluginLoader, InitializationReport, ModulePluginInstantiator, ModuleTable,
    PluginManager, PluginSummary, ServiceRegistry, StubModuleSource, services,
};
use serde::Serialize;
use tracing::info;

use crate::builtin::builtin_modules;
use crate::config_bridge::HostSettings;
use crate::formatter::{OutputFormat, print_json};
use crate::theme::Theme;

/// Bring plugins up with the exports in `table`.
pub(crate) async fn start_plugins(
    settings: &HostSettings,
    workspace: &Path,
    table: ModuleTable,
) -> anyhow::Result<(PluginManager, InitializationReport)> {
    let mut registry = ServiceRegistry::new();
    registry.bind(services::CURRENT_WORKING_DIRECTORY, workspace.to_path_buf())?;

    let loader = DirectoryPluginLoader::new(&settings.plugins_dir);
    let instantiator = ModulePluginInstantiator::new(StubModuleSource::new(table));
    let mut builder = PluginManager::builder(instantiator)
        .loader(loader)
        .registry(registry)
        .side(settings.side);
    if let Some(timeout) = settings.init_timeout {
        builder = builder.init_timeout(timeout);
    }
    let mut manager = builder.build()?;

    manager
        .load_plugins(settings.active.as_deref())
        .await
        .context("failed to load plugins")?;
    info!(
        loaded = manager.loaded_plugins().len(),
        failed = manager.failed_plugins().len(),
        "Plugins instantiated"
    );

    let report = manager.initialize_plugins().await;
    Ok((manager, report))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunOutput {
    plugins: Vec<PluginSummary>,
    not_loaded: Vec<FailureLine>,
}

#[derive(Serialize)]
struct FailureLine {
    id: String,
    error: String,
}

/// `botvy run`
pub(crate) async fn run(
    settings: &HostSettings,
    workspace: &Path,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let (manager, report) = start_plugins(settings, workspace, builtin_modules()).await?;

    let not_loaded: Vec<FailureLine> = manager
        .failed_plugins()
        .iter()
        .map(|(id, e)| FailureLine {
            id: id.to_string(),
            error: e.to_string(),
        })
        .collect();

    if format == OutputFormat::Json {
        return print_json(&RunOutput {
            plugins: manager.plugin_listing(),
            not_loaded,
        });
    }

    println!(
        "{}",
        Theme::heading(&format!(
            "Plugins ({}) from {}",
            manager.side(),
            settings.plugins_dir.display()
        ))
    );
    println!("{}", Theme::rule());
    for instance in manager.loaded_plugins() {
        println!(
            "  {}  {} {}",
            Theme::plugin_state(instance.state()),
            instance.id(),
            Theme::muted(&format!("v{}", instance.version()))
        );
    }
    for (id, e) in &report.failed {
        println!("{}", Theme::fail(&format!("{id}: {e}")));
    }
    for line in &not_loaded {
        println!(
            "{}",
            Theme::warn(&format!("{} not loaded: {}", line.id, line.error))
        );
    }

    if manager.loaded_plugins().is_empty() && not_loaded.is_empty() {
        println!("{}", Theme::note("No plugins to run"));
    } else if report.all_ready() && not_loaded.is_empty() {
        println!("{}", Theme::ok(&format!("{} plugin(s) ready", report.ready.len())));
    } else {
        println!(
            "{}",
            Theme::muted(&format!(
                "{} ready, {} failed, {} not loaded",
                report.ready.len(),
                report.failed.len(),
                not_loaded.len()
            ))
        );
    }
    Ok(())
}
