#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn run(db_path: &Path, args: &[&str]) -> Output {
    let mut cmd = Command::new(cargo_bin!("pharmacy-backoffice"));
    cmd.arg("--db-path").arg(db_path).args(args);
    cmd.output().expect("Failed to execute command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. Catalog and a customer, in separate runs.
    let seeded = run(&db_path, &["catalog", "import", "tests/fixtures/products.csv"]);
    assert!(seeded.status.success());

    let registered = run(
        &db_path,
        &[
            "person",
            "register",
            "--name",
            "Ana",
            "--national-id",
            "52998224725",
            "--email",
            "ana@example.com",
            "--password",
            "secret",
        ],
    );
    assert!(registered.status.success());

    // 2. Cart survives between runs and merges lines.
    for _ in 0..2 {
        let added = run(
            &db_path,
            &["cart", "add", "--as", "ana@example.com", "--product", "1", "--quantity", "1"],
        );
        assert!(added.status.success());
    }
    let cart = run(&db_path, &["cart", "show", "--as", "ana@example.com"]);
    let cart = stdout(&cart);
    assert!(cart.contains("\"quantity\": 2"));
    assert!(cart.contains("\"total\": \"25.00\""));

    // 3. Checkout, then reprice: the recorded sale keeps its price.
    let sale = run(&db_path, &["cart", "checkout", "--as", "ana@example.com"]);
    assert!(sale.status.success());
    assert!(stdout(&sale).contains("\"total\": \"25.00\""));

    let repriced = run(
        &db_path,
        &[
            "catalog",
            "update",
            "1",
            "--name",
            "Dipirona 500mg",
            "--price",
            "30.00",
            "--description",
            "Analgesic and antipyretic",
            "--expiry-date",
            "2030-01-31",
            "--manufacturer",
            "Neo Quimica",
        ],
    );
    assert!(repriced.status.success());

    let history = stdout(&run(&db_path, &["sale", "mine", "--as", "ana@example.com"]));
    assert!(history.contains("\"unit_price\": \"12.50\""));
    assert!(history.contains("\"total\": \"25.00\""));

    let cart = stdout(&run(&db_path, &["cart", "show", "--as", "ana@example.com"]));
    assert!(cart.contains("\"lines\": []"));

    let cleared = run(&db_path, &["cart", "clear", "--as", "ana@example.com"]);
    assert!(cleared.status.success());
    assert!(stdout(&cleared).contains("\"total\": \"0.00\""));
}

#[test]
fn test_duplicate_email_across_runs() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");
    let register = |cpf: &str| {
        run(
            &db_path,
            &[
                "person",
                "register",
                "--name",
                "Ana",
                "--national-id",
                cpf,
                "--email",
                "ana@example.com",
                "--password",
                "secret",
            ],
        )
    };

    assert!(register("52998224725").status.success());
    let duplicate = register("12345678909");
    assert_eq!(duplicate.status.code(), Some(5));
}
