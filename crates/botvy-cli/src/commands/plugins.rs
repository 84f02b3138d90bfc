//! `botvy plugins` - inspect plugin directories without running them.

use std::path::Path;

use anyhow::{Context, bail};
use botvy_plugins::{
    CandidateError, DependencyResolver, Diagnostic, DirectoryPluginLoader, PluginId, PluginLoader,
    PluginResult, ResolvedManifest, format_authors,
};
use serde::Serialize;

use crate::formatter::{OutputFormat, print_json};
use crate::theme::Theme;

/// Run the directory loader over `dir`.
pub(crate) async fn discover(dir: &Path) -> anyhow::Result<Vec<ResolvedManifest>> {
    DirectoryPluginLoader::new(dir)
        .load_plugins()
        .await
        .with_context(|| format!("failed to scan plugin directory {}", dir.display()))
}

/// Order `manifests` for loading, keeping only `active` ids when given.
pub(crate) fn resolve_order(
    manifests: Vec<ResolvedManifest>,
    active: Option<&[PluginId]>,
) -> PluginResult<Vec<ResolvedManifest>> {
    DependencyResolver::from_active(manifests, active).resolve_plugins()
}

/// `botvy plugins list`
pub(crate) async fn list(dir: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let manifests = discover(dir).await?;

    if format == OutputFormat::Json {
        return print_json(&manifests);
    }

    if manifests.is_empty() {
        println!(
            "{}",
            Theme::note(&format!("No plugins found in {}", dir.display()))
        );
        return Ok(());
    }

    println!(
        "{}",
        Theme::heading(&format!("Plugins in {}", dir.display()))
    );
    println!("  {:<28} {:<10} {:<24} AUTHORS", "ID", "VERSION", "NAME");
    println!("{}", Theme::rule());
    for m in &manifests {
        println!(
            "  {:<28} {:<10} {:<24} {}",
            m.id.as_str(),
            m.version,
            m.name,
            Theme::muted(&format_authors(&m.authors))
        );
    }
    println!(
        "\n{}",
        Theme::muted(&format!("{} plugin(s)", manifests.len()))
    );
    Ok(())
}

/// `botvy plugins resolve`
pub(crate) async fn resolve(
    dir: &Path,
    active: Option<&[PluginId]>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let manifests = discover(dir).await?;
    let ordered = resolve_order(manifests, active).context("could not resolve plugin order")?;

    if format == OutputFormat::Json {
        let ids: Vec<&PluginId> = ordered.iter().map(|m| &m.id).collect();
        return print_json(&ids);
    }

    println!("{}", Theme::heading("Load order"));
    println!("{}", Theme::rule());
    for (position, m) in (1..).zip(&ordered) {
        let deps = if m.depends_on.is_empty() {
            String::new()
        } else {
            let names: Vec<&str> = m.depends_on.iter().map(PluginId::as_str).collect();
            Theme::muted(&format!("(after {})", names.join(", ")))
        };
        println!("  {position:>3}. {} {deps}", m.id);
    }
    Ok(())
}

/// Result of validating one plugin directory.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ValidationOutcome {
    /// Whether the loader would accept the directory.
    pub(crate) valid: bool,
    /// The plugin id, when the manifest got far enough to have one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) id: Option<PluginId>,
    /// Schema violations.
    pub(crate) diagnostics: Vec<Diagnostic>,
    /// Why the directory was rejected, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

/// Run every loader check on one plugin directory.
pub(crate) async fn check_directory(path: &Path) -> anyhow::Result<ValidationOutcome> {
    let dir = std::path::absolute(path)
        .with_context(|| format!("invalid plugin path {}", path.display()))?;

    Ok(match DirectoryPluginLoader::load_candidate(&dir).await {
        Ok(manifest) => ValidationOutcome {
            valid: true,
            id: Some(manifest.id),
            diagnostics: Vec::new(),
            error: None,
        },
        Err(CandidateError::Invalid { diagnostics, .. }) => ValidationOutcome {
            valid: false,
            id: None,
            diagnostics,
            error: Some("manifest does not match the plugin descriptor schema".to_owned()),
        },
        Err(e) => ValidationOutcome {
            valid: false,
            id: match &e {
                CandidateError::PathEscape { plugin_id, .. }
                | CandidateError::MissingEntrypoint { plugin_id, .. } => Some(plugin_id.clone()),
                _ => None,
            },
            diagnostics: Vec::new(),
            error: Some(e.to_string()),
        },
    })
}

/// `botvy plugins validate`
pub(crate) async fn validate(path: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let outcome = check_directory(path).await?;

    if format == OutputFormat::Json {
        print_json(&outcome)?;
    } else if outcome.valid {
        let id = outcome.id.as_ref().map_or("", PluginId::as_str);
        println!("{}", Theme::ok(&format!("{id} is a valid plugin")));
    } else {
        if let Some(error) = &outcome.error {
            println!("{}", Theme::fail(error));
        }
        for diagnostic in &outcome.diagnostics {
            println!("    - {diagnostic}");
        }
    }

    if !outcome.valid {
        bail!("{} is not a valid plugin", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use botvy_test::{PluginDirBuilder, PluginFixture};
    use serde_json::json;

    use super::*;

    fn ids(manifests: &[ResolvedManifest]) -> Vec<&str> {
        manifests.iter().map(|m| m.id.as_str()).collect()
    }

    #[tokio::test]
    async fn resolve_honors_the_activation_list() {
        let plugins = PluginDirBuilder::new();
        plugins.add(&PluginFixture::new("com.test.base"));
        plugins.add(&PluginFixture::new("com.test.addon").depends_on(&["com.test.base"]));
        plugins.add(&PluginFixture::new("com.test.other"));

        let all = resolve_order(discover(plugins.path()).await.unwrap(), None).unwrap();
        assert_eq!(
            ids(&all),
            vec!["com.test.base", "com.test.addon", "com.test.other"]
        );

        let active = [PluginId::from_static("com.test.other")];
        let some = resolve_order(discover(plugins.path()).await.unwrap(), Some(&active)).unwrap();
        assert_eq!(ids(&some), vec!["com.test.other"]);

        let active = [PluginId::from_static("com.test.addon")];
        assert!(resolve_order(discover(plugins.path()).await.unwrap(), Some(&active)).is_err());
    }

    #[tokio::test]
    async fn valid_directory_reports_its_id() {
        let plugins = PluginDirBuilder::new();
        let dir = plugins.add(&PluginFixture::new("com.test.ok"));

        let outcome = check_directory(&dir).await.unwrap();
        assert!(outcome.valid);
        assert_eq!(outcome.id, Some(PluginId::from_static("com.test.ok")));
        assert!(validate(&dir, OutputFormat::Pretty).await.is_ok());
    }

    #[tokio::test]
    async fn schema_violations_are_listed() {
        let plugins = PluginDirBuilder::new();
        let mut manifest = PluginFixture::new("com.test.bad").manifest();
        manifest["version"] = json!("one");
        manifest["authors"] = json!([{ "name": "Jane", "email": "nope" }]);
        let dir = plugins.add_manifest("bad", &manifest);

        let outcome = check_directory(&dir).await.unwrap();
        assert!(!outcome.valid);
        let paths: Vec<&str> = outcome.diagnostics.iter().map(|d| d.path.as_str()).collect();
        assert!(paths.contains(&"version"));
        assert!(paths.contains(&"authors[0].email"));
        assert!(validate(&dir, OutputFormat::Json).await.is_err());
    }

    #[tokio::test]
    async fn missing_entrypoint_names_the_plugin() {
        let plugins = PluginDirBuilder::new();
        let manifest = PluginFixture::new("com.test.noentry").manifest();
        let dir = plugins.add_manifest("noentry", &manifest);

        let outcome = check_directory(&dir).await.unwrap();
        assert!(!outcome.valid);
        assert_eq!(outcome.id, Some(PluginId::from_static("com.test.noentry")));
        assert!(outcome.error.unwrap().contains("entrypoint"));
    }
}
