use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::tempdir;

const HEADER: &str = "Date,Item-Code,Item-Brand,Item-POS description,Sub-department-Number,Sub-department-Description,Category-Number,Category-Description,Vendor-ID,Vendor-Name,Units-Sum,Amount-Sum,Weight/Volume-Sum,Bottom line-Profit,Bottom line-Margin,Bottom line-Rank,Bottom line-Ratio,Proportion-Rank,Proportion-Ratio";

fn tillroll(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tillroll").expect("binary exists");
    cmd.env("HOME", home)
        .env("TILLROLL_DATA_DIR", home.join("data"))
        .env_remove("TILLROLL_MAX_UPLOAD_MB")
        .env("RUST_LOG", "off");
    cmd
}

fn write_export(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let body = format!(
        "{HEADER}\n\
         07/05/2024,4011,Dole,BANANAS,12,PRODUCE,3,FRUIT,V1,Dole Inc,3,\"1,234.50\",0,0,0,0,0,0,0\n\
         07/06/2024,4011,Dole,BANANAS,12,PRODUCE,3,FRUIT,V1,Dole Inc,2,10.00,0,0,0,0,0,0,0\n\
         2024-07-06,0-12345-67890-5,Acme,SOAP,40,HOUSEHOLD,9,CLEANING,V2,Acme Co,1,4.25,0,0,0,0,0,0,0\n\
         not a date,999,X,SKIPPED,1,X,1,X,V3,X,1,1,0,0,0,0,0,0,0\n"
    );
    fs::write(&path, body).expect("write export");
    path
}

#[test]
fn upload_then_reupload_is_idempotent() {
    let home = tempdir().expect("temp dir");
    let file = write_export(home.path(), "week.csv");
    tillroll(home.path()).arg("init").assert().success();

    tillroll(home.path())
        .args(["upload", file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("Inserted:    3"));

    tillroll(home.path())
        .args(["upload", file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("Inserted:    0"))
        .stdout(contains("Ignored:     3"));
}

#[test]
fn missing_headers_fail_with_message() {
    let home = tempdir().expect("temp dir");
    let file = home.path().join("bad.csv");
    fs::write(&file, "Date,Units-Sum\n2024-07-05,1\n").unwrap();

    tillroll(home.path())
        .args(["upload", file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("Header validation failed"));
}

#[test]
fn unsupported_extension_is_rejected() {
    let home = tempdir().expect("temp dir");
    let file = home.path().join("report.pdf");
    fs::write(&file, "%PDF").unwrap();

    tillroll(home.path())
        .args(["upload", file.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("Unsupported file type"));
}

#[test]
fn async_upload_is_processed_by_worker() {
    let home = tempdir().expect("temp dir");
    let file = write_export(home.path(), "week.csv");

    let out = tillroll(home.path())
        .args(["upload", "--async", file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("Queued job"))
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(out).unwrap();
    let id = text.trim().rsplit(' ').next().unwrap().to_string();
    assert_eq!(id.len(), 32);

    tillroll(home.path())
        .args(["worker", "--once"])
        .assert()
        .success()
        .stdout(contains("Processed 1 job(s)"));

    tillroll(home.path())
        .args(["job", &id])
        .assert()
        .success()
        .stdout(contains("\"status\": \"done\""))
        .stdout(contains("\"inserted\": 3"));

    assert_eq!(fs::read_dir(home.path().join("data").join("tmp")).unwrap().count(), 0);
}

#[test]
fn unknown_job_fails() {
    let home = tempdir().expect("temp dir");
    tillroll(home.path())
        .args(["job", "deadbeef"])
        .assert()
        .failure()
        .stderr(contains("Unknown job"));
}

#[test]
fn range_and_export_aggregate_by_item() {
    let home = tempdir().expect("temp dir");
    let file = write_export(home.path(), "week.csv");
    tillroll(home.path()).args(["upload", file.to_str().unwrap()]).assert().success();

    tillroll(home.path())
        .args(["range", "--start", "2024-07-01", "--end", "2024-07-31", "--subdept", "12"])
        .assert()
        .success()
        .stdout(contains("0000000004011"))
        .stdout(contains("1,244.50"));

    tillroll(home.path())
        .args(["subdepartments"])
        .assert()
        .success()
        .stdout(contains("12 - PRODUCE"))
        .stdout(contains("40 - HOUSEHOLD"));

    tillroll(home.path())
        .args(["export", "--start", "2024-07-01", "--end", "2024-07-31"])
        .assert()
        .success();
    let exported = home
        .path()
        .join("data")
        .join("exports")
        .join("item_movement_20240701_20240731.csv");
    let csv = fs::read_to_string(exported).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("0000000004011,Dole,BANANAS,12,PRODUCE"));
    assert!(lines[2].starts_with("0012345678905,Acme"));
}

#[test]
fn range_rejects_bad_dates() {
    let home = tempdir().expect("temp dir");
    tillroll(home.path())
        .args(["range", "--start", "07/01/2024", "--end", "2024-07-31"])
        .assert()
        .failure()
        .stderr(contains("Invalid date range"));
}
