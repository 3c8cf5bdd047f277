use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Runs the `tracker` binary against a database and storage root inside `dir`.
fn tracker(dir: &Path, args: &[&str]) -> Output {
    let output = Command::new(env!("CARGO_BIN_EXE_tracker"))
        .args(args)
        .current_dir(dir)
        .env("DATABASE_URL", format!("sqlite://{}", dir.join("tracker.db").display()))
        .env("STORAGE_BACKEND", "local")
        .env("STORAGE_ROOT", dir.join("storage"))
        .env_remove("TRACKER_USER")
        .output()
        .expect("failed to run tracker");
    if !output.status.success() {
        eprintln!("stderr: {}", String::from_utf8_lossy(&output.stderr));
    }
    output
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_full_lifecycle() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    assert!(tracker(root, &["rebuild"]).status.success());

    let admin = tracker(root, &["add-user", "--username", "admin", "--full-name", "Site Admin", "--role", "system_admin"]);
    assert!(admin.status.success());
    assert!(stdout(&admin).contains("admin"));

    std::fs::write(
        root.join("masters.csv"),
        "kind,code,name,is_default\ncluster,WASH,Water and Sanitation,\nfunder,GRZ,Government of Zambia,\n",
    )
    .unwrap();
    let seed = tracker(root, &["--user", "admin", "seed", "--file", "masters.csv"]);
    assert!(seed.status.success());
    assert!(stdout(&seed).contains("2 created"));

    let officer = tracker(
        root,
        &["add-user", "--username", "mbanda", "--full-name", "Mary Banda", "--role", "viewer", "--cluster", "WASH"],
    );
    assert!(officer.status.success());

    std::fs::write(
        root.join("plan.csv"),
        "Activity Name,Cluster,Funder,Planned Implementation Month,Budget Amount\n\
         Borehole drilling,WASH,GRZ,Aug-2026,1500\n\
         Hygiene campaign,WASH,GRZ,Sep-2026,-1\n\
         Latrines,WASH,GRZ,Oct-2026,800\n",
    )
    .unwrap();
    let upload = tracker(root, &["--user", "admin", "upload", "--file", "plan.csv", "--year", "2026"]);
    assert!(upload.status.success());
    let out = stdout(&upload);
    assert!(out.contains("Accepted: 2"));
    assert!(out.contains("Rejected: 1"));
    assert!(out.contains("Y26-000001"));
    assert!(out.contains("Y26-000002"));
    assert!(out.contains("row 3 planned_budget"));

    std::fs::write(root.join("contract.pdf"), b"%PDF-1.7 signed contract").unwrap();
    let attach = tracker(
        root,
        &["--user", "admin", "attach", "--id", "Y26-000001", "--file", "contract.pdf", "--type", "contract"],
    );
    assert!(attach.status.success());
    assert!(stdout(&attach).contains("v1"));

    let dashboard = tracker(root, &["--user", "mbanda", "dashboard", "--year", "2026"]);
    assert!(dashboard.status.success());
    let summary: serde_json::Value = serde_json::from_str(&stdout(&dashboard)).unwrap();
    assert_eq!(summary["total_activities"], 2);

    let export = tracker(root, &["--user", "mbanda", "export", "--year", "2026"]);
    assert!(export.status.success());
    assert!(root.join("activities_2026.xlsx").exists());

    // The export carries Activity IDs, so loading it back updates in place.
    let reupload = tracker(root, &["--user", "admin", "upload", "--file", "activities_2026.xlsx", "--year", "2026"]);
    assert!(reupload.status.success());
    let out = stdout(&reupload);
    assert!(out.contains("Accepted: 0"));
    assert!(out.contains("Updated: 2"));
    assert!(out.contains("~ Y26-000001"));

    let template = tracker(root, &["--user", "mbanda", "template"]);
    assert!(template.status.success());
    assert!(root.join("activity_upload_template.xlsx").exists());
}

#[test]
fn commands_need_a_known_user() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    let anonymous = tracker(root, &["dashboard"]);
    assert!(!anonymous.status.success());

    let unknown = tracker(root, &["--user", "nobody", "dashboard"]);
    assert!(!unknown.status.success());
    assert!(String::from_utf8_lossy(&unknown.stderr).contains("Not authenticated"));
}

#[test]
fn rebuild_needs_no_user_and_can_be_repeated() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    for _ in 0..2 {
        let rebuild = tracker(root, &["rebuild"]);
        assert!(rebuild.status.success());
        assert!(stdout(&rebuild).contains("Schema applied"));
    }
    let admin = tracker(root, &["add-user", "--username", "admin", "--full-name", "Site Admin", "--role", "system_admin"]);
    assert!(admin.status.success());
}
