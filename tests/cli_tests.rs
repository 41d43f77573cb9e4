//! Integration tests for the CLI interface

mod common;

use assert_cmd::Command;
use common::{Fixture, SCENARIO_BLOCKS, SCENARIO_ROWS};
use predicates::prelude::*;

fn lodes_flow() -> Command {
    let mut cmd = Command::cargo_bin("lodes-flow").unwrap();
    cmd.env_remove("LODES_FLOW_WORKERS")
        .env_remove("LODES_FLOW_BATCH_SIZE")
        .env_remove("LODES_FLOW_OUTPUT_DIR")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help_flag() {
    lodes_flow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn test_invalid_command() {
    lodes_flow()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_run_writes_summary_tables_and_report() {
    let fixture = Fixture::new();
    let flows = fixture.write_od_gz("tx_od_main_JT00_2021.csv.gz", &SCENARIO_ROWS);
    let blocks = fixture.write_blocks("blocks.csv", &SCENARIO_BLOCKS);
    let out = fixture.join("out");

    lodes_flow()
        .arg("-q")
        .arg("run")
        .arg("--source")
        .arg(&flows)
        .arg("--blocks")
        .arg(&blocks)
        .arg("--output")
        .arg(&out)
        .arg("--workers")
        .arg("2")
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Study area: 2 blocks"))
        .stdout(predicate::str::contains("✅ Wrote 5 summary tables"));

    let table2 = std::fs::read_to_string(out.join("statTable2.csv")).unwrap();
    assert_eq!(table2, "h_geo_txt,FREQUENCY,SUM_S000\n100,1,5\n");
    let table1 = std::fs::read_to_string(out.join("statTable1.csv")).unwrap();
    assert_eq!(table1, "w_geo_txt,FREQUENCY,SUM_S000\n200,1,3\n300,1,5\n");

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("run_report.json")).unwrap())
            .unwrap();
    assert_eq!(report["rows_read"], 3);
    assert_eq!(report["mode"], "parallel");
    assert_eq!(report["study_area_blocks"], 2);
    assert!(!out.join("resident_all.csv").exists());
}

#[test]
fn test_run_sequential_with_partitions() {
    let fixture = Fixture::new();
    let flows = fixture.write_od_gz("od.csv.gz", &SCENARIO_ROWS);
    let blocks = fixture.write_blocks("blocks.csv", &SCENARIO_BLOCKS);
    let out = fixture.join("out");

    lodes_flow()
        .args(["-q", "run", "--sequential", "--export-partitions"])
        .arg("--source")
        .arg(&flows)
        .arg("--blocks")
        .arg(&blocks)
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Partition tables exported"));

    for name in [
        "resident_all.csv",
        "resident_commute_out.csv",
        "resident_commute_in.csv",
        "non_resident_commute_in.csv",
    ] {
        assert!(out.join(name).exists(), "missing {}", name);
    }
    let resident_all = std::fs::read_to_string(out.join("resident_all.csv")).unwrap();
    assert_eq!(resident_all.lines().count(), 3);
}

#[test]
fn test_run_reads_config_file() {
    let fixture = Fixture::new();
    let flows = fixture.write_od_gz("od.csv.gz", &SCENARIO_ROWS);
    let blocks = fixture.write_blocks("blocks.csv", &SCENARIO_BLOCKS);
    let out = fixture.join("configured");
    let config = fixture.write_text(
        "lodes-flow.toml",
        &format!(
            "source = {:?}\noutput_dir = {:?}\n\n[membership]\npath = {:?}\n\n[key_format]\nstyle = \"zero_padded\"\nwidth = 5\n",
            flows, out, blocks
        ),
    );

    lodes_flow()
        .args(["-q", "run", "--config"])
        .arg(&config)
        .assert()
        .success();

    let table4 = std::fs::read_to_string(out.join("statTable4.csv")).unwrap();
    assert_eq!(table4, "h_geo_txt,FREQUENCY,SUM_S000\n00300,1,7\n");
}

#[test]
fn test_empty_study_area_exits_with_membership_code() {
    let fixture = Fixture::new();
    let flows = fixture.write_od_gz("od.csv.gz", &SCENARIO_ROWS);
    let blocks = fixture.write_text("blocks.csv", "GEOID\n");

    lodes_flow()
        .args(["-q", "run"])
        .arg("--source")
        .arg(&flows)
        .arg("--blocks")
        .arg(&blocks)
        .arg("--output")
        .arg(fixture.join("out"))
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Study area error"));
}

#[test]
fn test_missing_source_is_a_configuration_error() {
    let fixture = Fixture::new();
    let blocks = fixture.write_blocks("blocks.csv", &SCENARIO_BLOCKS);

    lodes_flow()
        .args(["-q", "run", "--blocks"])
        .arg(&blocks)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("source"));
}

#[test]
fn test_missing_column_exits_with_source_code() {
    let fixture = Fixture::new();
    let flows = fixture.write_od_gz("od.csv.gz", &SCENARIO_ROWS);
    let blocks = fixture.write_blocks("blocks.csv", &SCENARIO_BLOCKS);

    lodes_flow()
        .args(["-q", "run", "--measure-column", "S999"])
        .arg("--source")
        .arg(&flows)
        .arg("--blocks")
        .arg(&blocks)
        .arg("--output")
        .arg(fixture.join("out"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("S999"));
}

#[test]
fn test_normalize_prints_canonical_keys() {
    lodes_flow()
        .args(["normalize", "480219501001000", "4.80219501001e14", "7.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "4.80219501001e14 -> 480219501001000",
        ))
        .stdout(predicate::str::contains("7.0 -> 7"));
}

#[test]
fn test_normalize_pads_and_rejects_fractions() {
    lodes_flow()
        .args(["normalize", "--key-width", "15", "10010201001000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-> 010010201001000"));

    lodes_flow()
        .args(["normalize", "12.5"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("fractional"));
}

#[test]
fn test_normalize_rejects_oversized_key_width() {
    lodes_flow()
        .args(["normalize", "--key-width", "10000000000", "5"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("key_format.width"));

    lodes_flow()
        .args(["normalize", "--key-width", "0", "5"])
        .assert()
        .code(2);
}

#[test]
fn test_init_config_refuses_to_overwrite() {
    let fixture = Fixture::new();
    let path = fixture.join("lodes-flow.toml");

    lodes_flow()
        .arg("init-config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Wrote default configuration"));

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("GEOID"));
    assert!(written.contains("S000"));

    lodes_flow().arg("init-config").arg(&path).assert().code(2);
    lodes_flow()
        .args(["init-config", "--force"])
        .arg(&path)
        .assert()
        .success();
}
