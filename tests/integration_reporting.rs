use anyhow::Result;
use bench_stats::{
    LoggingContext, OutputTarget, Priority, SharedBuffer, SinkTargets, StatsConfig,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Context with text and XML captured in memory and JSON disabled.
fn captured_context(config: StatsConfig) -> Result<(LoggingContext, SharedBuffer, SharedBuffer)> {
    let stdout = SharedBuffer::new();
    let xml = SharedBuffer::new();
    let targets = SinkTargets {
        stdout: OutputTarget::Buffer(stdout.clone()),
        stderr: OutputTarget::Buffer(SharedBuffer::new()),
        xml: OutputTarget::Buffer(xml.clone()),
        json: OutputTarget::Disabled,
    };
    let ctx = LoggingContext::with_targets(config, targets)?;
    Ok((ctx, stdout, xml))
}

/// Four workers time 1000 one-millisecond operations each; the final
/// report must account for every one of them.
#[test]
fn test_multi_threaded_run_counts_every_event() -> Result<()> {
    let config = StatsConfig {
        threads: 4,
        ..StatsConfig::default()
    };
    let (mut ctx, stdout, xml) = captured_context(config)?;
    ctx.init()?;
    let ctx = Arc::new(ctx);

    let workers: Vec<_> = (0..4)
        .map(|id| {
            let ctx = ctx.clone();
            thread::spawn(move || -> bench_stats::Result<()> {
                for _ in 0..1000 {
                    ctx.event_start(id)?;
                    thread::sleep(Duration::from_millis(1));
                    ctx.event_stop(id)?;
                }
                Ok(())
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker panicked")?;
    }

    ctx.done()?;

    let stats = ctx.last_report().expect("final report");
    assert_eq!(stats.total_events, 4000);
    assert_eq!(stats.unfinished, 0);
    // A 1ms sleep never returns early; oversleep is bounded by scheduling.
    assert!(stats.min >= Duration::from_millis(1));
    assert!(stats.min < Duration::from_millis(3));
    assert!(stats.avg >= Duration::from_millis(1));
    assert!(stats.avg < Duration::from_millis(5));
    assert!(stats.max >= stats.avg);
    assert!(stats.max < Duration::from_millis(250));
    assert!(stats.execution_time >= Duration::from_secs(4));
    let p95 = stats.percentile.expect("percentile");
    assert!(p95 >= Duration::from_millis(1));
    assert_eq!(stats.fairness.events_avg, 1000.0);
    assert_eq!(stats.fairness.events_stddev, 0.0);

    let text = stdout.contents();
    assert!(text.contains("General statistics:"));
    assert!(text.contains("    total number of events:              4000"));
    assert!(text.contains("    events (avg/stddev):           1000.0000/0.00"));

    let doc = xml.contents();
    assert!(doc.starts_with("<?xml version=\"1.0\"?>\n<sysbench>\n"));
    assert!(doc.contains("<total_events>4000</total_events>"));
    assert!(doc.contains("<percentile_rank> 95</percentile_rank>"));
    assert!(doc.trim_end().ends_with("</sysbench>"));
    Ok(())
}

/// A structured value inside a section appears nested in the XML report
/// and nowhere in the text output.
#[test]
fn test_structured_value_only_reaches_structured_sinks() -> Result<()> {
    let config = StatsConfig {
        threads: 1,
        ..StatsConfig::default()
    };
    let (mut ctx, stdout, xml) = captured_context(config)?;
    ctx.init()?;

    ctx.begin_section("stats");
    let rendered = ctx.emit_structured(Priority::Notice, "latency", "12.5");
    ctx.end_section("stats");
    assert_eq!(rendered, "12.5");

    // Nothing was timed, so the final report is all zeros.
    ctx.done()?;

    let doc = xml.contents();
    assert!(doc.contains("    <stats>\n        <latency>12.5</latency>\n    </stats>\n"));
    assert!(!stdout.contents().contains("12.5"));
    Ok(())
}

/// One worker is stuck inside an operation when the run is torn down.
#[test]
fn test_forced_shutdown_counts_unfinished_operation() -> Result<()> {
    let config = StatsConfig {
        threads: 2,
        ..StatsConfig::default()
    };
    let (mut ctx, stdout, _xml) = captured_context(config)?;
    ctx.init()?;

    ctx.event_start(1)?;
    thread::sleep(Duration::from_millis(2));
    ctx.event_stop(1)?;

    ctx.event_start(0)?;
    thread::sleep(Duration::from_millis(5));
    ctx.request_forced_shutdown();
    assert!(ctx.is_forced_shutdown());
    ctx.done()?;

    let stats = ctx.last_report().expect("final report");
    assert_eq!(stats.unfinished, 1);
    assert_eq!(stats.total_events, 2);
    assert_eq!(stats.threads[0].events, 1);
    assert!(stats.threads[0].execution_time >= Duration::from_millis(5));

    let lines = stdout.lines();
    assert!(lines
        .iter()
        .any(|l| l == "Number of unfinished transactions on forced shutdown: 1"));
    Ok(())
}

/// The strict JSON report written to a file is a valid document.
#[test]
fn test_json_report_file_parses() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("report.json");
    let config = StatsConfig {
        threads: 2,
        json_file: Some(path.display().to_string()),
        ..StatsConfig::default()
    };
    let mut targets = SinkTargets::from_config(&config);
    targets.stdout = OutputTarget::Buffer(SharedBuffer::new());
    targets.stderr = OutputTarget::Buffer(SharedBuffer::new());
    let mut ctx = LoggingContext::with_targets(config, targets)?;
    ctx.init()?;

    for id in 0..2 {
        ctx.event_start(id)?;
        ctx.event_stop(id)?;
    }
    ctx.done()?;

    let doc: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    let general = &doc["sysbench"]["general_statistics"];
    assert_eq!(general["total_events"], "2");
    assert!(general["response_time"]["min"].is_string());
    assert!(general["threads_fairness"]["events_avg"].is_string());
    Ok(())
}

/// Per-thread statistics survive JSON parsing as one object per thread.
#[test]
fn test_json_report_keeps_every_thread() -> Result<()> {
    let json = SharedBuffer::new();
    let config = StatsConfig {
        threads: 3,
        per_thread_stats: true,
        ..StatsConfig::default()
    };
    let targets = SinkTargets {
        stdout: OutputTarget::Buffer(SharedBuffer::new()),
        stderr: OutputTarget::Buffer(SharedBuffer::new()),
        xml: OutputTarget::Disabled,
        json: OutputTarget::Buffer(json.clone()),
    };
    let mut ctx = LoggingContext::with_targets(config, targets)?;
    ctx.init()?;

    for id in 0..3 {
        for _ in 0..=id {
            ctx.event_start(id)?;
            ctx.event_stop(id)?;
        }
    }
    ctx.done()?;

    let doc: serde_json::Value = serde_json::from_str(&json.contents())?;
    let threads = doc["sysbench"]["general_statistics"]["threads"]
        .as_object()
        .expect("threads object");
    assert_eq!(threads.len(), 3);
    for id in 0..3 {
        let thread = &threads[format!("thread_{}", id).as_str()];
        assert_eq!(thread["thread"].as_str().map(str::trim), Some(id.to_string().as_str()));
        assert_eq!(thread["events"], (id + 1).to_string());
        assert!(thread["total_time_event_execution"].is_string());
    }
    Ok(())
}

/// Checkpoints report the period since the previous report only.
#[test]
fn test_checkpoint_reports_are_incremental() -> Result<()> {
    let config = StatsConfig {
        threads: 1,
        checkpoint_interval: 1,
        ..StatsConfig::default()
    };
    let (mut ctx, stdout, _xml) = captured_context(config)?;
    ctx.init()?;

    for _ in 0..3 {
        ctx.event_start(0)?;
        ctx.event_stop(0)?;
    }
    let first = ctx.report_checkpoint()?;
    assert_eq!(first.total_events, 3);

    ctx.event_start(0)?;
    ctx.event_stop(0)?;
    ctx.done()?;

    let last = ctx.last_report().expect("final report");
    assert_eq!(last.total_events, 1);
    assert!(stdout.contents().contains("s] Checkpoint report:"));
    Ok(())
}

#[test]
fn test_done_is_idempotent() -> Result<()> {
    let config = StatsConfig {
        threads: 1,
        ..StatsConfig::default()
    };
    let (mut ctx, stdout, xml) = captured_context(config)?;
    ctx.init()?;
    ctx.done()?;
    ctx.done()?;

    let reports = stdout
        .lines()
        .iter()
        .filter(|l| l.as_str() == "General statistics:")
        .count();
    assert_eq!(reports, 1);
    assert_eq!(xml.contents().matches("</sysbench>").count(), 1);
    Ok(())
}
