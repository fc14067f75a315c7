//! # Acquisition Module
//!
//! The sampling loop. Each cycle:
//!
//! 1. Reads the I2C chip set
//! 2. Reads up to `max_line_attempts` anemometer lines until one is non-empty
//! 3. Stamps the cycle and builds a [`CombinedRecord`]
//! 4. Appends it to the [`TelemetryWindow`]
//! 5. Appends it to the record log
//! 6. Writes the relay frame and flushes the relay port
//!
//! No per-cycle fault stops the loop; it runs until the shutdown signal is
//! raised. The loop owns both serial links and releases them when
//! [`AcquisitionLoop::run`] returns.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::blocking::run_blocking;
use crate::record::CombinedRecord;
use crate::relay::encoder::encode_frame;
use crate::sensors::bus::{BusProvider, BusSensorReader};
use crate::sensors::line::parse_line;
use crate::serial::{LineSource, SerialPortIO};
use crate::telemetry::{RecordSink, TelemetryWindow};

/// Default sampling period
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);

/// Default bound on anemometer line reads per cycle
pub const DEFAULT_MAX_LINE_ATTEMPTS: usize = 10;

/// Default number of cycles between status log messages
pub const DEFAULT_STATUS_INTERVAL: u64 = 100;

/// Counters reported when the loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    /// Cycles completed
    pub cycles: u64,

    /// Cycles whose anemometer side was absent
    pub missing_lines: u64,

    /// Record log appends that failed
    pub log_failures: u64,

    /// Relay writes that failed
    pub relay_failures: u64,
}

/// Timing and retry settings
#[derive(Debug, Clone, Copy)]
pub struct AcquisitionSettings {
    pub period: Duration,
    pub max_line_attempts: usize,
    pub status_interval: u64,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            max_line_attempts: DEFAULT_MAX_LINE_ATTEMPTS,
            status_interval: DEFAULT_STATUS_INTERVAL,
        }
    }
}

/// Single-writer sampling loop
pub struct AcquisitionLoop<P: BusProvider> {
    bus: BusSensorReader<P>,
    anemometer: Box<dyn LineSource>,
    relay: Box<dyn SerialPortIO>,
    log: Box<dyn RecordSink>,
    window: TelemetryWindow,
    settings: AcquisitionSettings,
    stats: AcquisitionStats,
}

impl<P: BusProvider> std::fmt::Debug for AcquisitionLoop<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionLoop")
            .field("settings", &self.settings)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<P: BusProvider> AcquisitionLoop<P> {
    /// Create a loop
    ///
    /// # Arguments
    ///
    /// * `bus` - I2C chip set reader
    /// * `anemometer` - Anemometer line source (owned for the loop's lifetime)
    /// * `relay` - Relay port (owned for the loop's lifetime)
    /// * `log` - Record log sink
    /// * `window` - Shared window handle; keep a clone to read it
    /// * `settings` - Period and retry bounds
    pub fn new(
        bus: BusSensorReader<P>,
        anemometer: Box<dyn LineSource>,
        relay: Box<dyn SerialPortIO>,
        log: Box<dyn RecordSink>,
        window: TelemetryWindow,
        settings: AcquisitionSettings,
    ) -> Self {
        Self {
            bus,
            anemometer,
            relay,
            log,
            window,
            settings,
            stats: AcquisitionStats::default(),
        }
    }

    pub fn stats(&self) -> AcquisitionStats {
        self.stats
    }

    /// Run one sampling cycle and return the record it produced
    pub async fn run_cycle(&mut self) -> CombinedRecord {
        let bus = self.bus.read().await;

        let line = self.read_anemometer_line().await;
        if line.is_empty() {
            self.stats.missing_lines += 1;
        }
        let anemometer = parse_line(&line);

        let record = CombinedRecord::now(bus, anemometer);
        self.window.append(record.clone());

        if let Err(e) = run_blocking(|| self.log.append(&record)) {
            self.stats.log_failures += 1;
            warn!("Failed to log record: {}", e);
        }

        if let Err(e) = self.relay_record(&record).await {
            self.stats.relay_failures += 1;
            warn!("Failed to relay record: {}", e);
        }

        self.stats.cycles += 1;
        debug!(
            "{} | I2C: {:?} || Anem: {:?}",
            record.timestamp().format("%H:%M:%S"),
            record.bus(),
            record.line()
        );
        record
    }

    /// Run until `shutdown` turns true or its sender is dropped
    ///
    /// Shutdown is checked between cycles, never in the middle of one.
    /// Consumes the loop, so both serial links are closed on return.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> AcquisitionStats {
        let mut ticker = tokio::time::interval(self.settings.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Starting acquisition loop (period {:?}, window {} records)",
            self.settings.period,
            self.window.capacity()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        info!("Shutdown sender dropped, stopping acquisition");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    self.run_cycle().await;

                    if self.stats.cycles % self.settings.status_interval.max(1) == 0 {
                        info!(
                            "Completed {} cycles ({} without anemometer data, {} log failures, {} relay failures)",
                            self.stats.cycles,
                            self.stats.missing_lines,
                            self.stats.log_failures,
                            self.stats.relay_failures
                        );
                    }
                }
            }
        }

        let stats = self.stats;
        self.close();
        stats
    }

    fn close(self) {
        let Self {
            anemometer, relay, ..
        } = self;
        drop(anemometer);
        drop(relay);
        info!("Serial links closed");
    }

    /// Read lines until one is non-empty or the attempt bound is reached
    async fn read_anemometer_line(&mut self) -> String {
        for attempt in 1..=self.settings.max_line_attempts {
            match self.anemometer.read_line().await {
                Ok(line) if !line.trim().is_empty() => return line.trim().to_string(),
                Ok(_) => {}
                Err(e) => debug!("Anemometer read attempt {} failed: {}", attempt, e),
            }
        }
        warn!(
            "No anemometer line after {} attempts",
            self.settings.max_line_attempts
        );
        String::new()
    }

    async fn relay_record(&mut self, record: &CombinedRecord) -> std::io::Result<()> {
        let frame = encode_frame(record);
        self.relay.write_all(&frame).await?;
        self.relay.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::bus::mocks::ScriptedProvider;
    use crate::sensors::bus::BusLayout;
    use crate::serial::port_trait::mocks::{MockLineSource, MockRead, MockSerialPort};
    use crate::telemetry::logger::mocks::MemorySink;
    use crate::telemetry::CsvRecordLog;
    use std::io;

    const SAMPLE_LINE: &str = "S 00.06 D 187 U 00.01 V 00.06 W 00.00 T 22.05 H 50.23 P 1009.01";

    struct Harness {
        provider: ScriptedProvider,
        anemometer: MockLineSource,
        relay: MockSerialPort,
        log: MemorySink,
        window: TelemetryWindow,
    }

    impl Harness {
        fn new(lines: MockLineSource) -> Self {
            Self {
                provider: ScriptedProvider::healthy(),
                anemometer: lines,
                relay: MockSerialPort::new(),
                log: MemorySink::new(),
                window: TelemetryWindow::new(5),
            }
        }

        fn build(&self) -> AcquisitionLoop<ScriptedProvider> {
            self.build_with(AcquisitionSettings::default())
        }

        fn build_with(&self, settings: AcquisitionSettings) -> AcquisitionLoop<ScriptedProvider> {
            AcquisitionLoop::new(
                BusSensorReader::new(
                    self.provider.clone(),
                    BusLayout::default(),
                    Duration::from_millis(100),
                ),
                Box::new(self.anemometer.clone()),
                Box::new(self.relay.clone()),
                Box::new(self.log.clone()),
                self.window.clone(),
                settings,
            )
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_produces_combined_record() {
        let harness = Harness::new(MockLineSource::new([SAMPLE_LINE]));
        let mut acquisition = harness.build();

        let record = acquisition.run_cycle().await;

        assert_eq!(record.bus().humidity_pct, Some(50.0));
        assert_eq!(record.bus().altitude_m, Some(123.45));
        assert_eq!(record.line().temperature_c, Some(22.05));
        assert_eq!(record.line().wind_speed_ms, Some(0.06));
        assert_eq!(harness.window.snapshot(), vec![record.clone()]);
        assert_eq!(harness.log.get_records(), vec![record]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_relays_flushed_frame() {
        let harness = Harness::new(MockLineSource::new([SAMPLE_LINE]));
        let mut acquisition = harness.build();

        acquisition.run_cycle().await;

        assert_eq!(
            harness.relay.get_written_lines(),
            vec!["50,26,1009.01,123.45,50.23,22.05,1009.01,0.06\n"]
        );
        assert_eq!(harness.relay.flush_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_empty_lines_until_data() {
        let harness = Harness::new(MockLineSource::new(["", "  ", SAMPLE_LINE, "T 99.00"]));
        let mut acquisition = harness.build();

        let record = acquisition.run_cycle().await;

        assert_eq!(record.line().temperature_c, Some(22.05));
        assert_eq!(harness.anemometer.read_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_line_read_attempts_are_bounded() {
        let harness = Harness::new(MockLineSource::new(Vec::<String>::new()));
        let mut acquisition = harness.build();

        let record = acquisition.run_cycle().await;

        assert!(record.line().is_absent());
        assert!(!record.bus().is_absent());
        assert_eq!(harness.anemometer.read_count(), DEFAULT_MAX_LINE_ATTEMPTS);
        assert_eq!(acquisition.stats().missing_lines, 1);
        assert_eq!(
            harness.relay.get_written_lines(),
            vec!["50,26,1009.01,123.45,,,,\n"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_errors_count_as_attempts() {
        let mut reads = vec![MockRead::Error(io::ErrorKind::TimedOut); 3];
        reads.push(MockRead::Line("H 40.00".to_string()));
        let harness = Harness::new(MockLineSource::scripted(reads));
        let mut acquisition = harness.build();

        let record = acquisition.run_cycle().await;

        assert_eq!(record.line().humidity_pct, Some(40.0));
        assert_eq!(harness.anemometer.read_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_read_failing_still_produces_record() {
        let reads = vec![MockRead::Error(io::ErrorKind::BrokenPipe); 20];
        let harness = Harness::new(MockLineSource::scripted(reads));
        let mut acquisition = harness.build();

        let record = acquisition.run_cycle().await;

        assert!(record.line().is_absent());
        assert_eq!(harness.window.len(), 1);
        assert_eq!(harness.anemometer.read_count(), DEFAULT_MAX_LINE_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bus_fault_degrades_only_bus_fields() {
        let mut harness = Harness::new(MockLineSource::new([SAMPLE_LINE]));
        harness.provider.fail_at = Some(3);
        let mut acquisition = harness.build();

        let record = acquisition.run_cycle().await;

        assert!(record.bus().is_absent());
        assert_eq!(record.line().pressure_mbar, Some(1009.01));
        assert_eq!(
            harness.relay.get_written_lines(),
            vec![",,,,50.23,22.05,1009.01,0.06\n"]
        );
        assert_eq!(harness.provider.released(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_failures_do_not_stop_cycle() {
        let harness = Harness::new(MockLineSource::new([SAMPLE_LINE, SAMPLE_LINE]));
        harness.log.set_fail(true);
        harness.relay.set_write_error(io::ErrorKind::BrokenPipe);
        let mut acquisition = harness.build();

        acquisition.run_cycle().await;
        acquisition.run_cycle().await;

        let stats = acquisition.stats();
        assert_eq!(stats.cycles, 2);
        assert_eq!(stats.log_failures, 2);
        assert_eq!(stats.relay_failures, 2);
        assert_eq!(harness.window.len(), 2, "window still receives every record");
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_failure_counts_as_relay_failure() {
        let harness = Harness::new(MockLineSource::new([SAMPLE_LINE]));
        harness.relay.set_flush_error(io::ErrorKind::Other);
        let mut acquisition = harness.build();

        acquisition.run_cycle().await;

        assert_eq!(acquisition.stats().relay_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_bounded_across_cycles() {
        let lines: Vec<String> = (0..8).map(|i| format!("S {}.00", i)).collect();
        let harness = Harness::new(MockLineSource::new(lines));
        let mut acquisition = harness.build();

        for _ in 0..8 {
            acquisition.run_cycle().await;
        }

        let speeds: Vec<Option<f64>> = harness
            .window
            .snapshot()
            .iter()
            .map(|r| r.line().wind_speed_ms)
            .collect();
        assert_eq!(
            speeds,
            vec![Some(3.0), Some(4.0), Some(5.0), Some(6.0), Some(7.0)]
        );
        assert_eq!(harness.log.get_records().len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown_and_closes_links() {
        let harness = Harness::new(MockLineSource::new([SAMPLE_LINE; 3]));
        let acquisition = harness.build_with(AcquisitionSettings {
            period: Duration::from_millis(100),
            max_line_attempts: 1,
            status_interval: 1,
        });
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(acquisition.run(rx));

        // Each cycle takes 300 ms of bus settle time
        tokio::time::sleep(Duration::from_millis(1000)).await;
        tx.send(true).unwrap();
        let stats = task.await.unwrap();

        assert!(stats.cycles >= 1);
        assert_eq!(harness.window.len() as u64, stats.cycles.min(5));
        assert!(harness.anemometer.is_closed());
        assert!(harness.relay.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_returns_immediately_when_already_shut_down() {
        let harness = Harness::new(MockLineSource::new([SAMPLE_LINE]));
        let acquisition = harness.build();
        let (_tx, rx) = watch::channel(true);

        let stats = acquisition.run(rx).await;

        assert_eq!(stats.cycles, 0);
        assert!(harness.window.is_empty());
        assert!(harness.anemometer.is_closed());
        assert!(harness.relay.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_sender_dropped() {
        let harness = Harness::new(MockLineSource::new([SAMPLE_LINE]));
        let acquisition = harness.build();
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let stats = acquisition.run(rx).await;

        assert_eq!(stats.cycles, 0);
        assert!(harness.relay.is_closed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_csv_log_on_multi_thread_runtime() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("sensorlog.csv");
        let harness = Harness::new(MockLineSource::new([SAMPLE_LINE, SAMPLE_LINE]));
        let mut acquisition = AcquisitionLoop::new(
            BusSensorReader::new(
                harness.provider.clone(),
                BusLayout::default(),
                Duration::from_millis(1),
            ),
            Box::new(harness.anemometer.clone()),
            Box::new(harness.relay.clone()),
            Box::new(CsvRecordLog::create(&path).unwrap()),
            harness.window.clone(),
            AcquisitionSettings::default(),
        );

        acquisition.run_cycle().await;
        acquisition.run_cycle().await;

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3, "header plus two rows");
        assert_eq!(acquisition.stats().log_failures, 0);
        assert_eq!(harness.relay.get_written_lines().len(), 2);
    }
}
