use anyhow::Result;
use std::path::Path;
use storbench::config::options::parse_assignments;
use storbench::config::toml::{merge_cli_with_config, parse_toml_string};
use storbench::config::validator::validate_config;
use storbench::config::{OperationKind, TargetKind, MB};
use storbench::orchestrator::NullSink;
use storbench::output::{build_report, write_json_report, ConsoleSink};
use storbench::stats::Phase;
use storbench::{BenchError, Orchestrator, RunConfig};
use tempfile::TempDir;

/// Small buffered run on a scratch directory (tmpfs has no O_DIRECT)
fn scratch_config(dir: &Path, operation: &str) -> Result<RunConfig> {
    let path = dir.join("bench.bin");
    let args = vec![
        format!("path={}", path.display()),
        format!("operation={}", operation),
        "size=1M".to_string(),
        "block=64K".to_string(),
        "direct=0".to_string(),
        "sync=1".to_string(),
        "repeats=2".to_string(),
        "wdelay=0".to_string(),
        "rdelay=0".to_string(),
    ];

    let config = parse_assignments(&args)?.resolve()?;
    validate_config(&config)?;
    Ok(config)
}

fn assert_no_leftovers(dir: &Path) {
    let leftovers: Vec<_> = std::fs::read_dir(dir).unwrap().collect();
    assert!(leftovers.is_empty(), "temp files left behind: {:?}", leftovers);
}

/// Every file operation runs end-to-end and cleans up after itself.
#[test]
fn file_operations_end_to_end() -> Result<()> {
    let cases = [
        ("write", vec![Phase::Write]),
        ("read", vec![Phase::Read]),
        ("copy", vec![Phase::Copy]),
        ("map-write", vec![Phase::Write]),
        ("map-read", vec![Phase::Read]),
        ("map", vec![Phase::Write, Phase::Read]),
        ("file", vec![Phase::Write, Phase::Read, Phase::Copy]),
    ];

    for (operation, phases) in cases {
        let temp_dir = TempDir::new()?;
        let config = scratch_config(temp_dir.path(), operation)?;
        assert_eq!(config.target, TargetKind::File);

        let mut orchestrator = Orchestrator::new();
        let report = orchestrator.run(&config, &mut NullSink)?;

        assert_eq!(report.results.len(), 2 * phases.len(), "{}", operation);
        assert!(report.teardown_warnings.is_empty(), "{}", operation);
        for result in &report.results {
            assert_eq!(result.bytes_transferred, MB, "{}", operation);
            assert!(result.mbps > 0.0, "{}", operation);
        }

        let summarized: Vec<Phase> = report.summaries.iter().map(|s| s.phase).collect();
        assert_eq!(summarized, phases, "{}", operation);
        for summary in &report.summaries {
            assert_eq!(summary.samples, 2);
            assert!(summary.mbps.minimum <= summary.mbps.median);
            assert!(summary.mbps.median <= summary.mbps.maximum);
        }

        assert_no_leftovers(temp_dir.path());
    }
    Ok(())
}

/// A read with a start offset moves only stop - start bytes.
#[test]
fn read_from_offset() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("offset.bin");
    let args = vec![
        format!("path={}", path.display()),
        "start=256K".to_string(),
        "stop=1M".to_string(),
        "block=64K".to_string(),
        "direct=0".to_string(),
        "repeats=1".to_string(),
        "rdelay=0".to_string(),
    ];
    let config = parse_assignments(&args)?.resolve()?;
    validate_config(&config)?;
    assert_eq!(config.operation, OperationKind::Read);

    let mut orchestrator = Orchestrator::new();
    let report = orchestrator.run(&config, &mut NullSink)?;
    assert_eq!(report.results[0].bytes_transferred, 768 * 1024);
    assert_no_leftovers(temp_dir.path());
    Ok(())
}

/// Zero repeats run nothing and produce no summaries.
#[test]
fn zero_repeats() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut config = scratch_config(temp_dir.path(), "map")?;
    config.repeats = 0;

    let mut orchestrator = Orchestrator::new();
    let report = orchestrator.run(&config, &mut NullSink)?;
    assert!(report.results.is_empty());
    assert!(report.summaries.is_empty());
    Ok(())
}

/// A missing scratch directory fails setup with a runtime exit code.
#[test]
fn missing_directory_is_runtime_error() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = scratch_config(&temp_dir.path().join("gone"), "write")?;

    let mut orchestrator = Orchestrator::new();
    let err = orchestrator.run(&config, &mut NullSink).unwrap_err();
    assert!(matches!(err, BenchError::Open { .. }), "got {:?}", err);
    assert_eq!(err.exit_code(), 3);
    Ok(())
}

/// Command-line options override the TOML file key by key.
#[test]
fn toml_file_with_command_line_override() -> Result<()> {
    let file = parse_toml_string(
        r#"
        operation = "write"
        size = "2M"
        block = 65536
        direct = false
        repeats = 7
        wdelay = 0
        "#,
    )?;

    let options = merge_cli_with_config(&["repeats=1", "block=128K"], Some(file))?;
    let config = options.resolve()?;
    validate_config(&config)?;

    assert_eq!(config.operation, OperationKind::Write);
    assert_eq!(config.total(), 2 * MB);
    assert_eq!(config.block, 128 * 1024);
    assert_eq!(config.repeats, 1);
    assert!(!config.direct);
    Ok(())
}

#[test]
fn invalid_options_exit_with_configuration_code() {
    let err = parse_assignments(&["repeats=101"])
        .and_then(|options| options.resolve())
        .and_then(|config| validate_config(&config))
        .unwrap_err();
    assert_eq!(err.exit_code(), 1);

    let err = parse_assignments(&["bogus=1"]).unwrap_err();
    assert_eq!(err.exit_code(), 1);
}

/// Console and JSON reports from a real run.
#[test]
fn reports_from_real_run() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let data_dir = temp_dir.path().join("data");
    std::fs::create_dir(&data_dir)?;
    let config = scratch_config(&data_dir, "copy")?;

    let mut orchestrator = Orchestrator::new();
    let mut sink = ConsoleSink::new(Vec::new());
    let report = sink.run(&mut orchestrator, &config)?;

    let text = String::from_utf8(sink.into_inner())?;
    assert!(text.contains(" 1     Copy"));
    assert!(text.contains(" 2     Copy"));
    assert!(text.contains("Copy statistics (MBPS):"));

    let json_path = temp_dir.path().join("report.json");
    let json = build_report(&config, orchestrator.timer(), &report, None);
    write_json_report(&json_path, &json)?;

    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json_path)?)?;
    assert_eq!(value["config"]["operation"], "copy");
    assert_eq!(value["results"].as_array().map(Vec::len), Some(2));
    assert_eq!(value["summaries"][0]["phase"], "copy");
    Ok(())
}

/// A failure in a later phase prints no statistics for the earlier ones.
#[test]
fn failed_run_prints_no_statistics() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut config = scratch_config(temp_dir.path(), "file")?;
    config.copy_path = temp_dir.path().join("gone").join("bench.copy");

    let mut orchestrator = Orchestrator::new();
    let mut sink = ConsoleSink::new(Vec::new());
    let err = sink.run(&mut orchestrator, &config).unwrap_err();
    assert_eq!(err.downcast_ref::<BenchError>().map(BenchError::exit_code), Some(3));

    let text = String::from_utf8(sink.into_inner())?;
    assert!(text.contains(" 2     Write"));
    assert!(text.contains(" 2     Read"));
    assert!(!text.contains("statistics"));
    assert_no_leftovers(temp_dir.path());
    Ok(())
}

/// A zoned read records one sample per zone, each tagged with its offset.
#[test]
fn zoned_read_profiles_the_range() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("zones.bin");
    let args = vec![
        format!("path={}", path.display()),
        "operation=read".to_string(),
        "size=1M".to_string(),
        "block=64K".to_string(),
        "zone=256K".to_string(),
        "direct=0".to_string(),
        "repeats=2".to_string(),
        "rdelay=0".to_string(),
    ];
    let config = parse_assignments(&args)?.resolve()?;
    validate_config(&config)?;

    let mut orchestrator = Orchestrator::new();
    let mut sink = ConsoleSink::new(Vec::new());
    let report = sink.run(&mut orchestrator, &config)?;

    assert_eq!(report.results.len(), 8);
    let offsets: Vec<_> = report.results[..4].iter().map(|r| r.offset).collect();
    assert_eq!(
        offsets,
        vec![Some(0), Some(256 * 1024), Some(512 * 1024), Some(768 * 1024)]
    );
    assert!(report.results.iter().all(|r| r.bytes_transferred == 256 * 1024));
    assert_eq!(report.summaries[0].samples, 8);

    let text = String::from_utf8(sink.into_inner())?;
    assert!(text.contains("@ 768.00K +256.00K"));
    assert_no_leftovers(temp_dir.path());
    Ok(())
}
