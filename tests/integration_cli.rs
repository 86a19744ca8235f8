//! CLI-level smoke tests driving the compiled binary.

use assert_cmd::Command;
use predicates::prelude::*;

mod common;
use common::TestProject;

fn combo(project: &TestProject) -> Command {
    let mut cmd = Command::cargo_bin("combo").unwrap();
    cmd.env("COMBO_CACHE_DIR", project.cache_dir());
    cmd
}

#[test]
fn resolve_then_is_dirty_reports_clean() {
    let mut project = TestProject::new();
    project.add_lib("Lib A", "1.0", &[]);
    project.set_root(&[("Lib A", "1.0")]);

    combo(&project)
        .arg("resolve")
        .arg("--path")
        .arg(project.project_dir())
        .arg("--sources-json")
        .arg(project.sources_path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Caching dependency (Lib A, v1.0)"));

    assert_eq!(project.contrib_names(), vec!["lib_a"]);

    combo(&project)
        .arg("is-dirty")
        .arg("--path")
        .arg(project.project_dir())
        .arg("--sources-json")
        .arg(project.sources_path())
        .assert()
        .success()
        .stdout(predicate::str::contains("not dirty"));
}

#[test]
fn resolve_outside_a_combo_repository_fails() {
    let project = TestProject::new();
    let empty = project.path().join("empty");
    std::fs::create_dir_all(&empty).unwrap();

    combo(&project)
        .arg("resolve")
        .arg("--path")
        .arg(&empty)
        .arg("--sources-json")
        .arg(project.sources_path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not a combo repository"));
}

#[test]
fn clear_old_outputs_sweeps_materialized_libraries() {
    let mut project = TestProject::new();
    project.add_lib("Lib A", "1.0", &[]);
    project.set_root(&[("Lib A", "1.0")]);

    combo(&project)
        .arg("resolve")
        .arg("--path")
        .arg(project.project_dir())
        .arg("--sources-json")
        .arg(project.sources_path())
        .assert()
        .success();

    combo(&project)
        .arg("clear-old-outputs")
        .arg(project.contrib_dir())
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 directories"));

    assert!(project.contrib_names().is_empty());
}

#[test]
fn upload_publishes_to_a_local_sources_file() {
    let mut project = TestProject::new();
    // The library working copy to publish
    let lib_dir = project.add_lib("Lib A", "1.0", &[]);

    combo(&project)
        .arg("upload")
        .arg("--path")
        .arg(&lib_dir)
        .arg("--sources-json")
        .arg(project.sources_path())
        .arg("--source-type")
        .arg("local_path")
        .assert()
        .success()
        .stdout(predicate::str::contains("Published (Lib A, v1.0)"));
}
