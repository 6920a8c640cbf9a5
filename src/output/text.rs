//! Human-readable text output
//!
//! The console report has four parts: start conditions and clock
//! resolutions before the prompt, one progress line per repeat while the
//! run proceeds, the per-phase summary blocks at the end, and the process
//! resource usage.

use std::io::{self, Write};

use crate::config::{RunConfig, GB, KB, MB};
use crate::error::BenchError;
use crate::orchestrator::{Orchestrator, ResultSink, RunReport};
use crate::stats::{MeasurementResult, Phase, PhaseSummary, StatisticsSummary};
use crate::timer::{ClockId, ClockSource, MultiClockTimer};
use crate::util::ResourceUsage;

const SEPARATOR: &str =
    "-------------------------------------------------------------------------------";

/// Format a byte count the way the report shows sizes
pub fn format_size(bytes: u64) -> String {
    if bytes < KB {
        format!("{} bytes", bytes)
    } else if bytes < MB {
        format!("{:.2}K", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.2}M", bytes as f64 / MB as f64)
    } else {
        format!("{:.2}G", bytes as f64 / GB as f64)
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Write => "Write",
        Phase::Read => "Read",
        Phase::Copy => "Copy",
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Print the resolved options
pub fn print_conditions<W: Write>(w: &mut W, config: &RunConfig) -> io::Result<()> {
    writeln!(w, "Start conditions:")?;
    writeln!(w, "  operation      = {}", config.operation)?;
    writeln!(w, "  target         = {}", config.target)?;
    writeln!(w, "  path           = {}", config.path.display())?;
    if config.operation.copies() {
        writeln!(w, "  copypath       = {}", config.copy_path.display())?;
    }
    writeln!(w, "  start          = {}", format_size(config.start))?;
    writeln!(w, "  stop           = {}", format_size(config.stop))?;
    writeln!(w, "  size           = {}", format_size(config.total()))?;
    writeln!(w, "  block          = {}", format_size(config.block))?;
    writeln!(w, "  sector         = {}", format_size(config.sector))?;
    writeln!(w, "  direct         = {}", flag(config.direct))?;
    writeln!(w, "  sync           = {}", flag(config.sync))?;
    writeln!(w, "  addressing     = {}", config.addressing)?;
    writeln!(w, "  data           = {}", config.data)?;
    writeln!(w, "  threads        = {}", config.threads)?;
    writeln!(w, "  precision      = {}", config.precision)?;
    writeln!(w, "  wdelay         = {} ms", config.write_delay_ms)?;
    writeln!(w, "  rdelay         = {} ms", config.read_delay_ms)?;
    writeln!(w, "  repeats        = {}", config.repeats)?;
    if let Some(zone) = config.zone {
        writeln!(w, "  zone           = {}", format_size(zone))?;
    }
    Ok(())
}

/// Print every clock's resolution, or N/A for a disabled clock
pub fn print_clocks<W: Write, C: ClockSource>(w: &mut W, timer: &MultiClockTimer<C>) -> io::Result<()> {
    writeln!(w, "OS timers list with resolutions:")?;
    for clock in ClockId::ALL {
        let resolution = timer.resolution(clock);
        if resolution.available {
            writeln!(
                w,
                "  {:<26}{:.0} s {:.0} ns",
                clock.name(),
                resolution.seconds,
                resolution.nanoseconds
            )?;
        } else {
            writeln!(w, "  {:<26}N/A", clock.name())?;
        }
    }
    Ok(())
}

/// Print a `getrusage` snapshot
pub fn print_resource_usage<W: Write>(w: &mut W, usage: &ResourceUsage) -> io::Result<()> {
    writeln!(w, "Linux system resources usage statistics:")?;
    writeln!(
        w,
        "User space CPU time used: {} sec {} usec",
        usage.user_time.0, usage.user_time.1
    )?;
    writeln!(
        w,
        "System space CPU time used: {} sec {} usec",
        usage.system_time.0, usage.system_time.1
    )?;
    writeln!(w, "Maximum resident set size        = {} KB", usage.max_rss_kb)?;
    writeln!(w, "Integral shared memory size      = {} KB", usage.shared_memory_kb)?;
    writeln!(w, "Integral unshared data size      = {} KB", usage.unshared_data_kb)?;
    writeln!(w, "Integral unshared stack size     = {} KB", usage.unshared_stack_kb)?;
    writeln!(w, "Page reclaims (soft page faults) = {}", usage.minor_faults)?;
    writeln!(w, "Page faults (hard page faults)   = {}", usage.major_faults)?;
    writeln!(w, "Swaps                            = {}", usage.swaps)?;
    writeln!(w, "Block input operations           = {}", usage.block_inputs)?;
    writeln!(w, "Block output operations          = {}", usage.block_outputs)?;
    writeln!(w, "IPC messages sent                = {}", usage.messages_sent)?;
    writeln!(w, "IPC messages received            = {}", usage.messages_received)?;
    writeln!(w, "Signals received                 = {}", usage.signals)?;
    writeln!(w, "Voluntary context switches       = {}", usage.voluntary_switches)?;
    writeln!(w, "Involuntary context switches     = {}", usage.involuntary_switches)?;
    Ok(())
}

/// One progress line: pass, operation, MBPS, running statistics, CPU
///
/// Zone results also show where the zone starts and how long it is.
pub fn format_progress(result: &MeasurementResult, running: &StatisticsSummary) -> String {
    let cpu = match result.cpu_utilization {
        Some(u) => format!("{:>9.1}%", u * 100.0),
        None => format!("{:>10}", "N/A"),
    };
    let mut line = format!(
        " {:<6}{:<11}{:>8.3}{:>11.3}{:>11.3}{:>11.3}{:>11.3}{}",
        result.repeat_index + 1,
        phase_label(result.phase),
        result.mbps,
        running.median,
        running.average,
        running.minimum,
        running.maximum,
        cpu
    );
    if let Some(offset) = result.offset {
        line.push_str(&format!(
            "  @ {} +{}",
            format_size(offset),
            format_size(result.bytes_transferred)
        ));
    }
    line
}

fn print_statistics<W: Write>(w: &mut W, summary: &StatisticsSummary, unit: &str, scale: f64) -> io::Result<()> {
    writeln!(w, "  Median  = {:.3}{}", summary.median * scale, unit)?;
    writeln!(w, "  Average = {:.3}{}", summary.average * scale, unit)?;
    writeln!(w, "  Minimum = {:.3}{}", summary.minimum * scale, unit)?;
    writeln!(w, "  Maximum = {:.3}{}", summary.maximum * scale, unit)?;
    Ok(())
}

/// Console result sink
///
/// Progress lines are written as results arrive; summaries are held back
/// until [`ConsoleSink::finish`] so they follow the progress table, as in a
/// `map` run where write lines come before read lines. Console write errors
/// are ignored.
pub struct ConsoleSink<W: Write = io::Stdout> {
    out: W,
    header_written: bool,
    summaries: Vec<(Phase, Option<PhaseSummary>)>,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
            summaries: Vec::new(),
        }
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "Start benchmarking.")?;
        writeln!(
            self.out,
            "Pass | Operation | MBPS     | Median   | Average  | Minimum  | Maximum  | CPU"
        )?;
        writeln!(self.out, "{}", SEPARATOR)?;
        self.out.flush()
    }

    /// Run every phase of `config`, then print the summary blocks
    ///
    /// A failed run returns its error before any summary block is written,
    /// so phases that finished before the failure print no statistics.
    pub fn run<C: ClockSource>(
        &mut self,
        orchestrator: &mut Orchestrator<C>,
        config: &RunConfig,
    ) -> anyhow::Result<RunReport> {
        let report = orchestrator.run(config, self)?;
        self.finish()?;
        Ok(report)
    }

    /// Print the summary block of every finished phase
    pub fn finish(&mut self) -> io::Result<()> {
        writeln!(self.out, "{}", SEPARATOR)?;
        for (phase, summary) in &self.summaries {
            writeln!(self.out)?;
            match summary {
                Some(summary) => {
                    writeln!(self.out, "{} statistics (MBPS):", phase_label(*phase))?;
                    print_statistics(&mut self.out, &summary.mbps, "", 1.0)?;
                    if let Some(utilization) = &summary.utilization {
                        writeln!(self.out, "{} CPU utilization:", phase_label(*phase))?;
                        print_statistics(&mut self.out, utilization, "%", 100.0)?;
                    }
                }
                None => writeln!(self.out, "{} statistics: no repeats", phase_label(*phase))?,
            }
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultSink for ConsoleSink<W> {
    fn phase_started(&mut self, _phase: Phase, _repeats: u32) {
        if !self.header_written {
            self.header_written = true;
            let _ = self.write_header();
        }
    }

    fn record(&mut self, result: &MeasurementResult, running: &PhaseSummary) {
        let _ = writeln!(self.out, "{}", format_progress(result, &running.mbps));
        let _ = self.out.flush();
    }

    fn phase_finished(&mut self, phase: Phase, summary: Option<&PhaseSummary>) {
        self.summaries.push((phase, summary.copied()));
    }

    fn teardown_failed(&mut self, error: &BenchError) {
        let _ = writeln!(self.out, " warning: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::mock::ScriptedClock;

    fn summary(median: f64, average: f64, minimum: f64, maximum: f64) -> StatisticsSummary {
        StatisticsSummary {
            median,
            average,
            minimum,
            maximum,
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(4096), "4.00K");
        assert_eq!(format_size(1536 * 1024), "1.50M");
        assert_eq!(format_size(GB), "1.00G");
    }

    #[test]
    fn test_progress_line_columns() {
        let result = MeasurementResult::new(Phase::Write, 0, MB, 123.456, Some(0.25));
        let line = format_progress(&result, &summary(1.0, 2.0, 0.5, 3.25));
        assert_eq!(
            line,
            " 1     Write       123.456      1.000      2.000      0.500      3.250     25.0%"
        );

        let result = MeasurementResult::new(Phase::Read, 9, MB, 1.0, None);
        let line = format_progress(&result, &summary(1.0, 1.0, 1.0, 1.0));
        assert!(line.starts_with(" 10    Read "));
        assert!(line.ends_with("N/A"));
    }

    #[test]
    fn test_progress_line_shows_zone() {
        let result = MeasurementResult::new(Phase::Read, 0, 100 * MB, 80.0, None).at_offset(Some(200 * MB));
        let line = format_progress(&result, &summary(80.0, 80.0, 80.0, 80.0));
        assert!(line.ends_with("N/A  @ 200.00M +100.00M"), "{}", line);
    }

    #[test]
    fn test_console_sink_report() {
        let mut sink = ConsoleSink::new(Vec::new());
        let running = PhaseSummary {
            phase: Phase::Read,
            samples: 1,
            mbps: summary(2.0, 2.0, 2.0, 2.0),
            utilization: None,
        };

        sink.phase_started(Phase::Read, 1);
        sink.record(&MeasurementResult::new(Phase::Read, 0, MB, 2.0, None), &running);
        sink.phase_finished(Phase::Read, Some(&running));
        sink.phase_started(Phase::Write, 0);
        sink.phase_finished(Phase::Write, None);
        sink.finish().unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text.matches("Start benchmarking.").count(), 1);
        assert!(text.contains(" 1     Read          2.000"));
        assert!(text.contains("Read statistics (MBPS):\n  Median  = 2.000\n"));
        assert!(text.contains("Write statistics: no repeats"));
        assert!(!text.contains("CPU utilization"));
    }

    #[test]
    fn test_clock_listing_marks_disabled() {
        let clock = ScriptedClock::new();
        clock.fail_resolution(ClockId::ThreadCpu);
        let timer = MultiClockTimer::probe(clock);

        let mut out = Vec::new();
        print_clocks(&mut out, &timer).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text.lines().count(), 5);
        assert!(text.contains("0 s 1 ns"));
        assert!(text.lines().last().unwrap().ends_with("N/A"));
    }

    #[test]
    fn test_conditions_list_copy_destination() {
        let mut config = RunConfig::default();
        let mut out = Vec::new();
        print_conditions(&mut out, &config).unwrap();
        assert!(!String::from_utf8(out).unwrap().contains("copypath"));

        config.operation = crate::config::OperationKind::Copy;
        let mut out = Vec::new();
        print_conditions(&mut out, &config).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("copypath       = myfile.bin.copy"));
        assert!(text.contains("size           = 1.00G"));
        assert!(!text.contains("zone"));

        config.operation = crate::config::OperationKind::Read;
        config.zone = Some(100 * MB);
        let mut out = Vec::new();
        print_conditions(&mut out, &config).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("zone           = 100.00M"));
    }

    #[test]
    fn test_resource_usage_listing() {
        let usage = ResourceUsage {
            user_time: (1, 250),
            max_rss_kb: 2048,
            ..Default::default()
        };
        let mut out = Vec::new();
        print_resource_usage(&mut out, &usage).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("User space CPU time used: 1 sec 250 usec"));
        assert!(text.contains("Maximum resident set size        = 2048 KB"));
        assert_eq!(text.lines().count(), 17);
    }
}
