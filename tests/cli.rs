use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn flowbook(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("flowbook").unwrap();
    cmd.env("FLOWBOOK_CONFIG_DIR", config_dir);
    cmd
}

fn init(config_dir: &Path) {
    flowbook(config_dir)
        .args(["init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized Flowbook"));
}

fn open_file_session(config_dir: &Path, statement: &Path) -> String {
    let output = flowbook(config_dir)
        .args(["import", "file", statement.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success(), "import file failed: {output:?}");
    let stdout = String::from_utf8(output.stdout).unwrap();
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("Opened import session "))
        .and_then(|rest| rest.split_whitespace().next())
        .expect("session id in output")
        .to_string()
}

#[test]
fn test_full_import_flow() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path();
    init(config);

    let statement = config.join("statement.csv");
    std::fs::write(
        &statement,
        "Date,Description,Amount\n01/02/2024,Salary,10000\n03/02/2024,Supermarket,-350.45\n",
    )
    .unwrap();

    let session = open_file_session(config, &statement);

    let mapping = config.join("mapping.json");
    std::fs::write(
        &mapping,
        r#"{
            "mapping": {
                "date": {"mode": "column", "column": 0},
                "description": {"column": 1},
                "amount": {"mode": "single", "column": 2}
            },
            "header_row_index": 0
        }"#,
    )
    .unwrap();

    flowbook(config)
        .args([
            "import",
            "preview",
            "--session",
            &session,
            "--mapping",
            mapping.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Salary"))
        .stdout(predicate::str::contains("₪10,000.00"))
        .stdout(predicate::str::contains("Dry run only"));

    flowbook(config)
        .args([
            "import",
            "commit",
            "--session",
            &session,
            "--mapping",
            mapping.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 2 transaction(s)"));

    // The session is deleted on a clean commit; a second commit must fail.
    flowbook(config)
        .args([
            "import",
            "commit",
            "--session",
            &session,
            "--mapping",
            mapping.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing or has expired"));
}

#[test]
fn test_commit_refuses_unresolved_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path();
    init(config);

    let statement = config.join("statement.csv");
    std::fs::write(
        &statement,
        "Date,Description,Amount\n01/02/2024,Salary,10000\n02/02/2024,Mystery,oops\n",
    )
    .unwrap();
    let session = open_file_session(config, &statement);

    let mapping = config.join("mapping.json");
    std::fs::write(
        &mapping,
        r#"{
            "mapping": {
                "date": {"mode": "column", "column": 0},
                "description": {"column": 1},
                "amount": {"mode": "single", "column": 2}
            },
            "header_row_index": 0
        }"#,
    )
    .unwrap();

    flowbook(config)
        .args([
            "import",
            "commit",
            "--session",
            &session,
            "--mapping",
            mapping.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Unresolved rows"))
        .stderr(predicate::str::contains("nothing was committed"));
}

#[test]
fn test_paste_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path();
    init(config);

    let pasted = config.join("pasted.txt");
    std::fs::write(
        &pasted,
        "Date\tDescription\tAmount\n01/02/2024\tSalary\t10000\n",
    )
    .unwrap();

    flowbook(config)
        .args(["import", "paste", "--file", pasted.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Opened import session"))
        .stdout(predicate::str::contains("2 rows, 3 columns"));
}

#[test]
fn test_unsupported_file_type() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path();
    init(config);

    let statement = config.join("statement.pdf");
    std::fs::write(&statement, "x").unwrap();

    flowbook(config)
        .args(["import", "file", statement.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported file type"));
}

#[test]
fn test_categories_and_budget_commands() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path();
    init(config);

    flowbook(config)
        .args(["categories", "add", "Pets", "--type", "expense"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added category: Pets"));

    flowbook(config)
        .args(["categories", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pets"))
        .stdout(predicate::str::contains("Groceries"));

    flowbook(config)
        .args([
            "budget", "set", "--category", "Pets", "--month", "2024-02", "250",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("₪250.00"));

    flowbook(config)
        .args(["budget", "list", "--month", "2024-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pets"));
}
