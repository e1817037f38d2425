//! Dependency ordering tests
//!
//! Load order, cycle handling and the partial-success reports of the bulk
//! lifecycle operations.

mod common;

use common::{Fixture, ModuleSpec};
use realm_core::PluginHostError;
use realm_core::api::ModuleState;

fn chain() -> Vec<ModuleSpec> {
    vec![
        ModuleSpec::new("a"),
        ModuleSpec::new("b").depends_on(&["a"]),
        ModuleSpec::new("c").depends_on(&["b"]),
    ]
}

#[test]
fn load_order_is_dependency_first_for_any_registration_order() {
    let permutations: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    for perm in permutations {
        let fixture = Fixture::new();
        let specs = chain();
        let host = fixture.host();
        for &i in &perm {
            let path = fixture.add(specs[i].clone());
            host.load_plugin(&path).unwrap();
        }

        assert_eq!(
            host.get_plugin_load_order().unwrap(),
            ["a", "b", "c"],
            "registration order {perm:?}"
        );
    }
}

#[test]
fn initialize_all_follows_load_order() {
    let fixture = Fixture::new();
    for spec in chain().into_iter().rev() {
        fixture.add(spec);
    }
    let host = fixture.host();
    host.load_all_plugins(&fixture.module_dir()).unwrap();
    fixture.clear();

    let report = host.initialize_all_plugins();
    assert_eq!(report.succeeded, ["a", "b", "c"]);
    assert_eq!(
        fixture.calls(),
        ["a:initialize", "b:initialize", "c:initialize"]
    );
}

#[test]
fn failed_dependency_fails_dependents_only() {
    let fixture = Fixture::new();
    fixture.add(ModuleSpec::new("economy").failing("initialize"));
    fixture.add(ModuleSpec::new("shop").depends_on(&["economy"]));
    fixture.add(ModuleSpec::new("chat"));
    let host = fixture.host();
    host.load_all_plugins(&fixture.module_dir()).unwrap();

    let report = host.initialize_all_plugins();
    assert_eq!(report.succeeded, ["chat"]);
    assert_eq!(report.failed_names(), ["economy", "shop"]);
    assert!(matches!(
        report.failed[1].1,
        PluginHostError::DependenciesNotMet { .. }
    ));
    assert_eq!(host.plugin_state("economy"), Some(ModuleState::Error));
    assert_eq!(host.plugin_state("shop"), Some(ModuleState::Loaded));
}

#[test]
fn missing_dependency_reported_at_initialize() {
    let fixture = Fixture::new();
    fixture.add(ModuleSpec::new("rewards").depends_on(&["economy"]));
    let host = fixture.host();
    host.load_all_plugins(&fixture.module_dir()).unwrap();

    assert_eq!(host.get_plugin_load_order().unwrap(), ["rewards"]);

    let report = host.initialize_all_plugins();
    match &report.failed[..] {
        [(name, PluginHostError::DependenciesNotMet { missing, .. })] => {
            assert_eq!(name, "rewards");
            assert_eq!(missing, &["economy"]);
        }
        other => panic!("unexpected report {other:?}"),
    }
}

#[test]
fn cycle_is_reported_and_siblings_proceed() {
    let fixture = Fixture::new();
    fixture.add(ModuleSpec::new("left").depends_on(&["right"]));
    fixture.add(ModuleSpec::new("right").depends_on(&["left"]));
    fixture.add(ModuleSpec::new("solo"));
    let host = fixture.host();
    host.load_all_plugins(&fixture.module_dir()).unwrap();

    let err = host.get_plugin_load_order().unwrap_err();
    match err {
        PluginHostError::CircularDependency { cycle } => {
            assert_eq!(cycle, ["left", "right", "left"]);
        }
        other => panic!("expected CircularDependency, got {other}"),
    }

    let report = host.initialize_all_plugins();
    assert_eq!(report.succeeded, ["solo"]);
    assert_eq!(report.failed_names(), ["left", "right"]);
    assert!(
        report
            .failed
            .iter()
            .all(|(_, e)| matches!(e, PluginHostError::CircularDependency { .. }))
    );
    assert_eq!(host.plugin_state("left"), Some(ModuleState::Loaded));
}

#[test]
fn cycle_members_not_due_for_initialize_are_skipped() {
    let fixture = Fixture::new();
    fixture.add(ModuleSpec::new("left").depends_on(&["right"]).manual());
    fixture.add(ModuleSpec::new("right").depends_on(&["left"]));
    fixture.add(ModuleSpec::new("solo"));
    let host = fixture.host();
    host.load_all_plugins(&fixture.module_dir()).unwrap();

    let report = host.initialize_all_plugins();
    assert_eq!(report.succeeded, ["solo"]);
    assert_eq!(report.skipped, ["left"]);
    assert_eq!(report.failed_names(), ["right"]);
    assert!(matches!(
        report.failed[0].1,
        PluginHostError::CircularDependency { .. }
    ));
}

#[test]
fn runtime_dependencies_drive_order_and_missing_list() {
    let fixture = Fixture::new();
    // The descriptor declares nothing; `dependencies()` asks for omega
    let alpha = fixture.add(ModuleSpec::new("alpha").runtime_deps(&["omega"]));
    let omega = fixture.add(ModuleSpec::new("omega"));
    let host = fixture.host();

    host.load_plugin(&alpha).unwrap();
    match host.initialize_plugin("alpha").unwrap_err() {
        PluginHostError::DependenciesNotMet { missing, .. } => assert_eq!(missing, ["omega"]),
        other => panic!("expected DependenciesNotMet, got {other}"),
    }

    host.load_plugin(&omega).unwrap();
    assert_eq!(host.get_plugin_load_order().unwrap(), ["omega", "alpha"]);

    let report = host.initialize_all_plugins();
    assert_eq!(report.succeeded, ["omega", "alpha"]);
}

#[test]
fn load_all_continues_past_panicking_queries() {
    let fixture = Fixture::new();
    fixture.add(ModuleSpec::new("faceless").panicking("descriptor"));
    fixture.add(ModuleSpec::new("good"));
    fixture.add(ModuleSpec::new("tangled").panicking("dependencies"));
    let host = fixture.host();

    let report = host.load_all_plugins(&fixture.module_dir()).unwrap();
    assert_eq!(report.loaded, ["good"]);
    assert_eq!(report.failed.len(), 2);
    assert!(
        report
            .failed
            .iter()
            .all(|(_, e)| matches!(e, PluginHostError::InvalidDescriptor { .. }))
    );

    assert!(host.initialize_all_plugins().is_complete());
    assert_eq!(host.plugins_by_state(ModuleState::Initialized), ["good"]);
}

#[test]
fn start_all_skips_modules_not_initialized() {
    let fixture = Fixture::new();
    fixture.add(ModuleSpec::new("ready"));
    fixture.add(ModuleSpec::new("lazy").manual());
    let host = fixture.host();
    host.load_all_plugins(&fixture.module_dir()).unwrap();
    host.initialize_all_plugins();

    let report = host.start_all_plugins();
    assert_eq!(report.succeeded, ["ready"]);
    assert_eq!(report.skipped, ["lazy"]);
    assert!(report.is_complete());
}

#[test]
fn stop_all_runs_dependents_first() {
    let fixture = Fixture::new();
    for spec in chain() {
        fixture.add(spec);
    }
    let host = fixture.host();
    host.load_all_plugins(&fixture.module_dir()).unwrap();
    host.initialize_all_plugins();
    host.start_all_plugins();
    fixture.clear();

    let report = host.stop_all_plugins();
    assert_eq!(report.succeeded, ["c", "b", "a"]);
    assert_eq!(fixture.calls(), ["c:stop", "b:stop", "a:stop"]);
    assert_eq!(host.plugins_by_state(ModuleState::Loaded), ["a", "b", "c"]);
}

#[test]
fn load_all_continues_past_bad_files() {
    let fixture = Fixture::new();
    fixture.add(ModuleSpec::new("good"));
    fixture.add_at(&fixture.path_of("nameless"), ModuleSpec::new(""));
    // A library file nobody registered a constructor for
    std::fs::write(fixture.path_of("stray"), b"").unwrap();

    let host = fixture.host();
    let report = host.load_all_plugins(&fixture.module_dir()).unwrap();

    assert_eq!(report.loaded, ["good"]);
    assert_eq!(report.failed.len(), 2);
    assert!(report.failed.iter().any(|(_, e)| matches!(
        e,
        PluginHostError::InvalidDescriptor { .. }
    )));
    assert!(report.failed.iter().any(|(_, e)| matches!(
        e,
        PluginHostError::MissingEntryPoint { .. }
    )));
}

#[test]
fn unload_all_reports_every_module() {
    let fixture = Fixture::new();
    for spec in chain() {
        fixture.add(spec);
    }
    let host = fixture.host();
    host.load_all_plugins(&fixture.module_dir()).unwrap();

    let report = host.unload_all_plugins();
    assert_eq!(report.succeeded, ["c", "b", "a"]);
    assert_eq!(host.plugin_count(), 0);
}
