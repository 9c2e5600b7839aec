//! Polling loops
//!
//! A service thread stands in for the UART interrupt and moves bytes between the source
//! and the channel buffers. The calling thread is the control loop: it polls the sensor
//! driver and writes a record per reading.

use crate::config::{IngestConfig, SensorKind};
use crate::record::{write_record, Record};
use crate::source::{ExhaustedHandle, Source};
use anyhow::Context;
use data_validator::Validator;
use metrics::{counter, gauge};
use oxygen_protocol::SetupStatus;
use serde::Serialize;
use serial_channel::{BufferedChannel, ChannelBuffers, Clock, SystemClock};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

const RX_CAPACITY: usize = 1024;
const TX_CAPACITY: usize = 64;
/// Sleep when the control loop finds nothing to do
const IDLE_SLEEP: Duration = Duration::from_millis(1);

type Channel<'a> = BufferedChannel<'a, RX_CAPACITY, TX_CAPACITY>;

/// Totals for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub records: u64,
    pub rx_dropped: u32,
}

/// Run until `shutdown` is raised or a finite source is exhausted
pub fn run<W: Write>(
    config: &IngestConfig,
    source: Source,
    shutdown: &AtomicBool,
    out: W,
) -> anyhow::Result<RunSummary> {
    let (transport, exhausted) = source.into_parts();
    let mut buffers = ChannelBuffers::<RX_CAPACITY, TX_CAPACITY>::new();
    let (channel, mut service) = buffers.split(transport, config.channel.clone());
    let service_interval = Duration::from_micros(config.service_interval_us);
    let service_stop = AtomicBool::new(false);

    thread::scope(|scope| {
        let stop = &service_stop;
        scope.spawn(move || {
            while !stop.load(Ordering::Acquire) {
                service.service();
                thread::sleep(service_interval);
            }
            // Flush whatever the control loop queued last
            service.service_tx();
        });

        let mut poller = Poller {
            config,
            clock: SystemClock::new(),
            shutdown,
            exhausted,
            out,
            summary: RunSummary::default(),
            last_stats_ms: 0,
            dropped_seen: 0,
        };
        let result = match config.sensor {
            SensorKind::Nonin => poller.run_nonin(channel),
            SensorKind::Fdo2 => poller.run_fdo2(channel),
        };
        service_stop.store(true, Ordering::Release);
        result.map(|()| poller.summary)
    })
}

struct Poller<'a, W> {
    config: &'a IngestConfig,
    clock: SystemClock,
    shutdown: &'a AtomicBool,
    exhausted: ExhaustedHandle,
    out: W,
    summary: RunSummary,
    last_stats_ms: u32,
    dropped_seen: u32,
}

impl<'a, W: Write> Poller<'a, W> {
    /// Whether the loop should end, given whether the channel still holds bytes
    fn finished(&self, channel: &Channel<'_>) -> bool {
        self.shutdown.load(Ordering::Acquire)
            || (self.exhausted.is_exhausted() && channel.available() == 0)
    }

    fn emit(&mut self, record: &Record) -> anyhow::Result<()> {
        write_record(&mut self.out, record).context("writing record")?;
        self.summary.records += 1;
        Ok(())
    }

    fn maybe_emit_stats(
        &mut self,
        channel: &Channel<'_>,
        oximeter: Option<oximeter_protocol::SensorStats>,
    ) -> anyhow::Result<()> {
        let interval = self.config.stats_interval_ms;
        let now = self.clock.millis();
        if interval == 0 || now.wrapping_sub(self.last_stats_ms) < interval {
            return Ok(());
        }
        self.last_stats_ms = now;
        let rx_dropped = channel.dropped_since(self.dropped_seen);
        self.dropped_seen = channel.dropped_count();
        self.summary.rx_dropped = self.dropped_seen;
        gauge!("ingest_rx_dropped_total").set(f64::from(self.dropped_seen));
        if rx_dropped > 0 {
            warn!(rx_dropped, "RX buffer overflowed");
        }
        self.emit(&Record::Stats {
            elapsed_ms: now,
            rx_dropped,
            oximeter,
        })
    }

    fn run_nonin(&mut self, channel: Channel<'_>) -> anyhow::Result<()> {
        use oximeter_protocol::{Device, Sensor};

        info!("Polling Nonin oximeter");
        let mut sensor = Sensor::new(
            Device::new(channel),
            Validator::new(self.config.validation.clone()),
        );
        loop {
            if let Some(reading) = sensor.update() {
                counter!("ingest_records_total", "sensor" => "nonin").increment(1);
                self.emit(&Record::Oximeter {
                    elapsed_ms: self.clock.millis(),
                    reading,
                })?;
            }
            let stats = sensor.stats();
            let channel = sensor.device_mut().channel();
            self.maybe_emit_stats(channel, Some(stats))?;
            if self.finished(channel) {
                break;
            }
            if channel.available() == 0 {
                thread::sleep(IDLE_SLEEP);
            }
        }
        self.summary.rx_dropped = sensor.device_mut().channel().dropped_count();
        info!(stats = ?sensor.stats(), "Nonin polling stopped");
        Ok(())
    }

    fn run_fdo2(&mut self, channel: Channel<'_>) -> anyhow::Result<()> {
        use oxygen_protocol::{Device, Sensor};

        info!("Polling FDO2 oxygen sensor");
        let oxygen = self.config.oxygen.clone();
        let mut sensor = Sensor::new(
            Device::new(channel, oxygen.broadcast_interval_ms),
            self.clock,
            Validator::new(self.config.validation.clone()),
            oxygen,
        );
        loop {
            match sensor.setup().context("FDO2 setup")? {
                SetupStatus::InProgress => {}
                SetupStatus::Ready => {
                    if let Some(reading) = sensor.output().context("FDO2 output")? {
                        counter!("ingest_records_total", "sensor" => "fdo2").increment(1);
                        self.emit(&Record::Oxygen {
                            elapsed_ms: self.clock.millis(),
                            reading,
                        })?;
                    }
                }
            }
            let channel = sensor.device_mut().channel();
            self.maybe_emit_stats(channel, None)?;
            if self.finished(channel) {
                break;
            }
            if channel.available() == 0 {
                thread::sleep(IDLE_SLEEP);
            }
        }
        self.summary.rx_dropped = sensor.device_mut().channel().dropped_count();
        info!(po2 = ?sensor.po2(), "FDO2 polling stopped");
        Ok(())
    }
}
