//! End-to-end tests: plugin directories on disk through to initialized plugins.

use std::path::Path;
use std::time::Duration;

use botvy_plugins::{
    InitializationSide, ModuleTable, PluginError, PluginId, PluginManager, PluginState,
    ResolvedManifest, services,
};
use botvy_test::{
    InitLog, PluginDirBuilder, PluginFixture, StringBindings, manager_builder, manager_over,
    recording_table, setup_test_logging_default, with_failing, with_service_reader, with_slow,
    write_stub,
};

fn manager_for(plugins: &[&PluginDirBuilder], table: ModuleTable) -> PluginManager {
    let roots: Vec<&Path> = plugins.iter().map(|p| p.path()).collect();
    manager_over(&roots, table, InitializationSide::Client)
}

fn ids(manifests: &[ResolvedManifest]) -> Vec<&str> {
    manifests.iter().map(|m| m.id.as_str()).collect()
}

#[tokio::test]
async fn dependencies_load_and_initialize_first() {
    setup_test_logging_default();
    let plugins = PluginDirBuilder::new();
    plugins.add(
        &PluginFixture::new("com.test.root").depends_on(&["com.test.child", "com.test.another"]),
    );
    plugins.add(&PluginFixture::new("com.test.another"));
    plugins.add(&PluginFixture::new("com.test.child").depends_on(&["com.test.another"]));

    let log = InitLog::new();
    let table = recording_table(&log, ["com.test.root", "com.test.another", "com.test.child"]);
    let mut manager = manager_for(&[&plugins], table);

    manager.load_plugins(None).await.unwrap();
    assert_eq!(
        ids(manager.ordered_plugins()),
        vec!["com.test.another", "com.test.child", "com.test.root"]
    );

    let report = manager.initialize_plugins().await;
    assert!(report.all_ready());
    assert_eq!(
        log.ids(),
        vec!["com.test.another", "com.test.child", "com.test.root"]
    );
    assert!(
        manager
            .loaded_plugins()
            .iter()
            .all(|p| p.state() == &PluginState::Ready)
    );
}

#[tokio::test]
async fn bindings_are_available_to_the_entrypoint_factory() {
    let plugins = PluginDirBuilder::new();
    plugins.add(&PluginFixture::new("com.test.greeter").binding("com.test.greeter.services"));

    let log = InitLog::new();
    let table = with_service_reader(ModuleTable::new(), &log, "com.test.greeter", "greeting")
        .with_bindings(
            "com.test.greeter.services",
            StringBindings::new("greeting", "hello"),
        );
    let mut manager = manager_for(&[&plugins], table);

    manager.load_plugins(None).await.unwrap();
    assert!(manager.failed_plugins().is_empty());
    assert_eq!(
        *manager.registry().get::<String>("greeting").unwrap(),
        "hello"
    );
}

#[tokio::test]
async fn missing_default_export_fails_the_plugin_and_its_dependents() {
    let plugins = PluginDirBuilder::new();
    let broken = plugins.add(&PluginFixture::new("com.test.broken"));
    plugins.write(&broken.join("main.toml"), "other = \"com.test.broken\"\n");
    plugins.add(&PluginFixture::new("com.test.dependent").depends_on(&["com.test.broken"]));
    plugins.add(&PluginFixture::new("com.test.standalone"));

    let log = InitLog::new();
    let table = recording_table(
        &log,
        ["com.test.broken", "com.test.dependent", "com.test.standalone"],
    );
    let mut manager = manager_for(&[&plugins], table);
    manager.load_plugins(None).await.unwrap();

    let failed = manager.failed_plugins();
    assert_eq!(failed.len(), 2);
    assert_eq!(failed[0].0.as_str(), "com.test.broken");
    assert!(matches!(failed[0].1, PluginError::NoDefaultExport { .. }));
    assert_eq!(failed[1].0.as_str(), "com.test.dependent");
    assert!(matches!(failed[1].1, PluginError::DependencyFailed { .. }));

    let loaded: Vec<&str> = manager
        .loaded_plugins()
        .iter()
        .map(|p| p.id().as_str())
        .collect();
    assert_eq!(loaded, vec!["com.test.standalone"]);

    manager.initialize_plugins().await;
    assert_eq!(log.ids(), vec!["com.test.standalone"]);
}

#[tokio::test]
async fn traversal_entrypoint_is_rejected_whether_or_not_it_exists() {
    let plugins = PluginDirBuilder::new();
    plugins.add(&PluginFixture::new("com.test.good"));

    let mut manifest = PluginFixture::new("com.test.evil").manifest();
    manifest["entrypoint"] = "../../etc/passwd".into();
    plugins.add_manifest("evil", &manifest);

    let mut other = PluginFixture::new("com.test.evil2").manifest();
    other["entrypoint"] = "../nowhere/main.toml".into();
    plugins.add_manifest("evil2", &other);

    let log = InitLog::new();
    let mut manager = manager_for(&[&plugins], recording_table(&log, ["com.test.good"]));
    manager.load_plugins(None).await.unwrap();
    assert_eq!(ids(manager.ordered_plugins()), vec!["com.test.good"]);
}

#[tokio::test]
async fn malformed_candidate_does_not_hide_its_neighbours() {
    let plugins = PluginDirBuilder::new();
    plugins.add(&PluginFixture::new("com.test.first").dir_name("a-first"));
    plugins.add_raw_manifest("b-middle", "{ \"id\": ");
    plugins.add(&PluginFixture::new("com.test.last").dir_name("c-last"));

    let log = InitLog::new();
    let table = recording_table(&log, ["com.test.first", "com.test.last"]);
    let mut manager = manager_for(&[&plugins], table);
    manager.load_plugins(None).await.unwrap();
    assert_eq!(
        ids(manager.ordered_plugins()),
        vec!["com.test.first", "com.test.last"]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_entrypoint_outside_the_plugin_is_rejected() {
    let outside = PluginDirBuilder::new();
    let target = outside.path().join("main.toml");
    write_stub(&target, "com.test.linked");

    let plugins = PluginDirBuilder::new();
    let dir = plugins.add(&PluginFixture::new("com.test.linked"));
    std::fs::remove_file(dir.join("main.toml")).unwrap();
    std::os::unix::fs::symlink(&target, dir.join("main.toml")).unwrap();

    let log = InitLog::new();
    let mut manager = manager_for(&[&plugins], recording_table(&log, ["com.test.linked"]));
    manager.load_plugins(None).await.unwrap();
    assert!(manager.ordered_plugins().is_empty());
}

#[tokio::test]
async fn cycle_fails_the_whole_load() {
    let plugins = PluginDirBuilder::new();
    plugins.add(&PluginFixture::new("com.test.a").depends_on(&["com.test.b"]));
    plugins.add(&PluginFixture::new("com.test.b").depends_on(&["com.test.a"]));

    let log = InitLog::new();
    let table = recording_table(&log, ["com.test.a", "com.test.b"]);
    let mut manager = manager_for(&[&plugins], table);
    let err = manager.load_plugins(None).await.unwrap_err();
    let PluginError::CircularDependency { chain } = &err else {
        panic!("expected a cycle, got {err}");
    };
    let chain: Vec<&str> = chain.iter().map(PluginId::as_str).collect();
    assert_eq!(chain, vec!["com.test.a", "com.test.b", "com.test.a"]);
    assert!(manager.loaded_plugins().is_empty());
}

#[tokio::test]
async fn missing_dependency_is_named_in_the_error() {
    let plugins = PluginDirBuilder::new();
    plugins.add(&PluginFixture::new("com.test.needy").depends_on(&["missing.id"]));

    let log = InitLog::new();
    let mut manager = manager_for(&[&plugins], recording_table(&log, ["com.test.needy"]));
    let err = manager.load_plugins(None).await.unwrap_err();
    assert!(matches!(err, PluginError::DependencyNotFound { .. }));
    assert!(err.to_string().contains("\"missing.id\""));
}

#[tokio::test]
async fn undotted_unknown_dependency_fails_the_whole_load() {
    let plugins = PluginDirBuilder::new();
    plugins.add(&PluginFixture::new("com.test.base"));
    plugins.add(&PluginFixture::new("com.test.needy").depends_on(&["missing"]));

    let log = InitLog::new();
    let table = recording_table(&log, ["com.test.base", "com.test.needy"]);
    let mut manager = manager_for(&[&plugins], table);
    let err = manager.load_plugins(None).await.unwrap_err();
    let PluginError::DependencyNotFound { plugin, dependency } = &err else {
        panic!("expected a missing dependency, got {err}");
    };
    assert_eq!(plugin.as_str(), "com.test.needy");
    assert_eq!(dependency.as_str(), "missing");
    assert!(manager.loaded_plugins().is_empty());
    assert!(log.ids().is_empty());
}

#[tokio::test]
async fn failing_initialize_does_not_stop_later_plugins() {
    let plugins = PluginDirBuilder::new();
    plugins.add(&PluginFixture::new("com.test.a"));
    plugins.add(&PluginFixture::new("com.test.b").depends_on(&["com.test.a"]));
    plugins.add(&PluginFixture::new("com.test.c").depends_on(&["com.test.b"]));

    let log = InitLog::new();
    let table = with_failing(
        recording_table(&log, ["com.test.a", "com.test.c"]),
        &log,
        "com.test.b",
        "database unreachable",
    );
    let mut manager = manager_for(&[&plugins], table);
    manager.load_plugins(None).await.unwrap();

    let report = manager.initialize_plugins().await;
    assert_eq!(log.ids(), vec!["com.test.a", "com.test.b", "com.test.c"]);
    assert_eq!(report.ready.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0.as_str(), "com.test.b");

    let b = manager.plugin(&PluginId::from_static("com.test.b")).unwrap();
    assert_eq!(
        b.state(),
        &PluginState::Failed("plugin execution failed: database unreachable".to_string())
    );
    let c = manager.plugin(&PluginId::from_static("com.test.c")).unwrap();
    assert_eq!(c.state(), &PluginState::Ready);

    // A second pass leaves everything alone.
    let again = manager.initialize_plugins().await;
    assert!(again.ready.is_empty() && again.failed.is_empty());
    assert_eq!(log.len(), 3);
}

#[tokio::test]
async fn slow_initialize_times_out_and_the_rest_continue() {
    let plugins = PluginDirBuilder::new();
    plugins.add(&PluginFixture::new("com.test.slow"));
    plugins.add(&PluginFixture::new("com.test.quick").depends_on(&["com.test.slow"]));

    let log = InitLog::new();
    let table = with_slow(
        recording_table(&log, ["com.test.quick"]),
        &log,
        "com.test.slow",
        Duration::from_secs(30),
    );
    let mut manager = manager_builder(&[plugins.path()], table)
        .init_timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    manager.load_plugins(None).await.unwrap();

    let report = manager.initialize_plugins().await;
    assert_eq!(report.ready.len(), 1);
    assert_eq!(report.ready[0].as_str(), "com.test.quick");
    assert!(matches!(
        report.failed[0].1,
        PluginError::InitTimeout { .. }
    ));

    let slow = manager
        .plugin(&PluginId::from_static("com.test.slow"))
        .unwrap();
    assert!(matches!(slow.state(), PluginState::Failed(reason) if reason.starts_with("timed out")));
}

#[tokio::test]
async fn loaders_merge_and_dependencies_cross_them() {
    let core = PluginDirBuilder::new();
    core.add(&PluginFixture::new("com.test.base").name("Core base"));
    let user = PluginDirBuilder::new();
    user.add(&PluginFixture::new("com.test.base").name("User base"));
    user.add(&PluginFixture::new("com.test.addon").depends_on(&["com.test.base"]));

    let log = InitLog::new();
    let table = recording_table(&log, ["com.test.base", "com.test.addon"]);
    let mut manager = manager_for(&[&core, &user], table);
    manager.load_plugins(None).await.unwrap();

    assert_eq!(
        ids(manager.ordered_plugins()),
        vec!["com.test.base", "com.test.addon"]
    );
    let base = manager
        .plugin(&PluginId::from_static("com.test.base"))
        .unwrap();
    assert_eq!(base.name(), "Core base");
}

#[tokio::test]
async fn activation_list_limits_what_loads() {
    let plugins = PluginDirBuilder::new();
    plugins.add(&PluginFixture::new("com.test.on").author("Jane", Some("jane@example.com")));
    plugins.add(&PluginFixture::new("com.test.off"));

    let log = InitLog::new();
    let table = recording_table(&log, ["com.test.on", "com.test.off"]);
    let mut manager = manager_for(&[&plugins], table);
    let active = [
        PluginId::from_static("com.test.on"),
        PluginId::from_static("com.test.nowhere"),
    ];
    manager.load_plugins(Some(&active)).await.unwrap();
    manager.initialize_plugins().await;

    assert_eq!(log.ids(), vec!["com.test.on"]);
    let listing = serde_json::to_value(manager.plugin_listing()).unwrap();
    assert_eq!(listing[0]["id"], "com.test.on");
    assert_eq!(listing[0]["authors"], "Jane <jane@example.com>");
    assert_eq!(listing[0]["state"]["state"], "ready");
}

#[tokio::test]
async fn initialization_side_reaches_the_registry() {
    let plugins = PluginDirBuilder::new();
    let mut manager = manager_over(
        &[plugins.path()],
        ModuleTable::new(),
        InitializationSide::Server,
    );
    manager.load_plugins(None).await.unwrap();

    assert!(manager.loaded_plugins().is_empty());
    assert_eq!(
        *manager
            .registry()
            .get::<InitializationSide>(services::INITIALIZATION_SIDE)
            .unwrap(),
        InitializationSide::Server
    );
}
