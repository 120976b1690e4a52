//! Acquisition orchestrator.
//!
//! Drives one field acquisition at a time through
//! `Idle → Reading(sensor) → Reconciling → Updated → Idle`:
//!
//! ```text
//!  acquire(field) ──► SensorPort::measure() (bounded by timeout, once per source)
//!                        │
//!                        ▼
//!                  Reconciler ──► RecordAccumulator::set ──► display + progress 0..100
//! ```
//!
//! A hardware failure aborts only the current field: its value stays what it was before
//! the attempt, the error goes back to the caller and the orchestrator is idle again.
//! `commit()` appends a snapshot of the record and resets it only once the append has
//! succeeded.
//!
//! Exclusivity is by construction: every operation takes `&mut self`, so at most one
//! acquisition or commit is in flight per orchestrator. [`crate::session::Session`] adds
//! fail-fast exclusivity for handles shared with a presentation layer.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{error, info, info_span, warn, Instrument};

use crate::acquisition::status::{AcquisitionState, PresentationState, PROGRESS_MAX};
use crate::config::FieldDaqConfig;
use crate::data::reconcile::{Reconciled, Reconciler};
use crate::data::storage::{CsvRecordLog, PersistenceWriter};
use crate::error::{AppResult, DaqError};
use crate::hardware::{build_sensor_bank, RawReading, SensorBank, SensorPort, SensorRole};
use crate::record::{Field, FieldSource, FieldValue, Record, RecordAccumulator};

/// Tunables of the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Upper bound for a single `measure()` call.
    pub sensor_timeout: Duration,
    /// Read the GPS at commit time when the record has no position yet.
    pub position_on_commit: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            sensor_timeout: Duration::from_secs(5),
            position_on_commit: true,
        }
    }
}

impl OrchestratorOptions {
    /// Options taken from the `[acquisition]` table.
    pub fn from_config(config: &FieldDaqConfig) -> Self {
        Self {
            sensor_timeout: config.sensor_timeout(),
            position_on_commit: config.acquisition.position_on_commit,
        }
    }
}

/// Outcome of the "acquire all" sequence.
#[derive(Debug, Default)]
pub struct SequenceReport {
    /// Fields written to the record, in acquisition order.
    pub completed: Vec<Field>,
    /// Fields whose acquisition failed; their record values are untouched.
    pub failed: Vec<(Field, DaqError)>,
    /// The caller withdrew the request at a field boundary.
    pub cancelled: bool,
}

impl SequenceReport {
    /// Every field of the sequence was acquired.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    /// The row as appended.
    pub record: Record,
    /// Where it was appended.
    pub location: String,
    /// When the append completed.
    pub committed_at: DateTime<Utc>,
}

/// Top-level driver of the acquisition pipeline.
pub struct AcquisitionOrchestrator {
    sensors: SensorBank,
    reconciler: Reconciler,
    record: RecordAccumulator,
    writer: Box<dyn PersistenceWriter>,
    options: OrchestratorOptions,
    status: watch::Sender<PresentationState>,
}

impl AcquisitionOrchestrator {
    /// Orchestrator over `sensors`, appending committed records through `writer`.
    pub fn new<W>(sensors: SensorBank, writer: W, options: OrchestratorOptions) -> Self
    where
        W: PersistenceWriter + 'static,
    {
        let (status, _) = watch::channel(PresentationState::default());
        Self {
            sensors,
            reconciler: Reconciler,
            record: RecordAccumulator::new(),
            writer: Box::new(writer),
            options,
            status,
        }
    }

    /// Open the configured sensors and data file.
    ///
    /// Sensors are not calibrated here; call [`Self::calibrate_sensors`] once at startup.
    pub fn from_config(config: &FieldDaqConfig) -> AppResult<Self> {
        let sensors = build_sensor_bank(config)
            .map_err(|e| DaqError::Configuration(format!("{:#}", e)))?;
        let path = config.storage.output_path.clone();
        let writer = if config.storage.create_if_missing {
            CsvRecordLog::create(path)?
        } else {
            CsvRecordLog::open(path)
        };
        Ok(Self::new(
            sensors,
            writer,
            OrchestratorOptions::from_config(config),
        ))
    }

    /// One-time calibration of every installed sensor.
    pub async fn calibrate_sensors(&self) -> AppResult<()> {
        self.sensors.calibrate_all().await?;
        info!("Sensors calibrated");
        Ok(())
    }

    /// Subscribe to display values, progress and state.
    pub fn subscribe(&self) -> watch::Receiver<PresentationState> {
        self.status.subscribe()
    }

    /// Current presentation state.
    pub fn presentation(&self) -> PresentationState {
        self.status.borrow().clone()
    }

    /// Copy of the in-progress record.
    pub fn snapshot(&self) -> Record {
        self.record.snapshot()
    }

    /// Options in effect.
    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Acquire one field and write its canonical value into the record.
    ///
    /// Requesting `Lat` or `Lon` reads the GPS once and sets both.
    pub async fn acquire(&mut self, field: Field) -> AppResult<Reconciled> {
        let span = info_span!("acquire", field = %field);
        let result = self.run_acquisition(field).instrument(span).await;
        self.publish_state(AcquisitionState::Idle);

        match &result {
            Ok(_) => info!("{} measurement complete", field.label()),
            Err(e) => error!(field = %field, error = %e, "{} measurement failed", field.label()),
        }
        result
    }

    /// Acquire every environmental field in the fixed order, continuing past failures.
    ///
    /// `cancel` is checked at each field boundary; a field already being read completes.
    pub async fn acquire_all(&mut self, cancel: Option<&watch::Receiver<bool>>) -> SequenceReport {
        let mut report = SequenceReport::default();
        for field in Field::ENVIRONMENTAL_SEQUENCE {
            if cancel.map_or(false, |rx| *rx.borrow()) {
                info!(
                    completed = report.completed.len(),
                    "Acquisition sequence cancelled before {}", field
                );
                report.cancelled = true;
                break;
            }

            match self.acquire(field).await {
                Ok(_) => report.completed.push(field),
                Err(e) => report.failed.push((field, e)),
            }
        }
        report
    }

    /// Store operator-entered text (location code, wind speed, ground humidity).
    pub fn enter_text(&mut self, field: Field, text: impl Into<String>) {
        let value = FieldValue::Text(text.into());
        self.status.send_modify(|s| s.show(field, Some(&value)));
        self.record.set(field, value);
    }

    /// Append the record to the data file, then start a fresh one.
    ///
    /// On failure the record is left exactly as it was and the commit can be retried.
    pub async fn commit(&mut self) -> AppResult<CommitReceipt> {
        self.publish_state(AcquisitionState::Committing);
        let result = self.run_commit().instrument(info_span!("commit")).await;
        self.publish_state(AcquisitionState::Idle);

        match result {
            Ok(receipt) => {
                self.reset();
                info!(location = %receipt.location, "Record committed");
                Ok(receipt)
            }
            Err(e) => {
                error!(error = %e, "Commit failed, record kept for retry");
                Err(e)
            }
        }
    }

    /// Discard the in-progress record and clear the display.
    pub fn reset(&mut self) {
        self.record.reset();
        self.status.send_modify(|s| *s = PresentationState::default());
    }

    async fn run_acquisition(&mut self, field: Field) -> AppResult<Reconciled> {
        if field.source() == FieldSource::Operator {
            return Err(DaqError::NotMeasurable(field));
        }

        let mut readings = Vec::with_capacity(2);
        for &role in Reconciler::sources(field) {
            self.publish_state(AcquisitionState::Reading {
                field,
                sensor: role,
            });
            readings.push(self.read_sensor(role).await?);
        }

        self.publish_state(AcquisitionState::Reconciling { field });
        let reconciled = self.reconciler.reconcile(field, &readings)?;

        let written = match reconciled {
            Reconciled::Value(value) => {
                self.record.set(field, value);
                vec![field]
            }
            Reconciled::Position { lat, lon } => {
                self.record.set(Field::Lat, lat);
                self.record.set(Field::Lon, lon);
                vec![Field::Lat, Field::Lon]
            }
        };

        let record = &self.record;
        self.status.send_modify(|s| {
            for f in &written {
                s.show(*f, record.get(*f));
            }
            s.state = AcquisitionState::Updated { field };
        });

        // Observed progress only: the read above has already returned.
        for percent in 0..=PROGRESS_MAX {
            self.status.send_modify(|s| s.set_progress(field, percent));
        }

        Ok(reconciled)
    }

    async fn run_commit(&mut self) -> AppResult<CommitReceipt> {
        let mut snapshot = self.record.snapshot();

        let has_position = snapshot.is_set(Field::Lat) && snapshot.is_set(Field::Lon);
        if self.options.position_on_commit
            && !has_position
            && self.sensors.is_installed(SensorRole::Gps)
        {
            match self.read_position().await {
                Ok((lat, lon)) => {
                    snapshot = snapshot.with(Field::Lat, lat).with(Field::Lon, lon);
                }
                Err(e) => warn!(error = %e, "Position unavailable, committing without it"),
            }
        }

        self.writer.append(&snapshot).await?;
        Ok(CommitReceipt {
            record: snapshot,
            location: self.writer.location(),
            committed_at: Utc::now(),
        })
    }

    async fn read_position(&self) -> AppResult<(f64, f64)> {
        let reading = self.read_sensor(SensorRole::Gps).await?;
        match self.reconciler.reconcile(Field::Lat, &[reading])? {
            Reconciled::Position { lat, lon } => Ok((lat, lon)),
            Reconciled::Value(_) => Err(DaqError::HardwareRead {
                sensor: SensorRole::Gps,
                message: "expected a coordinate".to_string(),
            }),
        }
    }

    /// One bounded sensor transaction, validated against the role's reading shape.
    async fn read_sensor(&self, role: SensorRole) -> AppResult<RawReading> {
        let port: Arc<dyn SensorPort> = self
            .sensors
            .get(role)
            .cloned()
            .ok_or(DaqError::SensorNotInstalled(role))?;

        let timeout = self.options.sensor_timeout;
        let shape = match tokio::time::timeout(timeout, port.measure()).await {
            Err(_) => {
                warn!(sensor = %role, timeout_ms = timeout.as_millis() as u64, "Sensor timed out");
                return Err(DaqError::HardwareTimeout {
                    sensor: role,
                    timeout,
                });
            }
            Ok(Err(e)) => {
                return Err(DaqError::HardwareRead {
                    sensor: role,
                    message: format!("{:#}", e),
                })
            }
            Ok(Ok(shape)) => shape,
        };

        if shape.kind() != role.expected_shape() {
            return Err(DaqError::HardwareRead {
                sensor: role,
                message: format!(
                    "{} returned a {:?} reading, expected {:?}",
                    port.name(),
                    shape.kind(),
                    role.expected_shape()
                ),
            });
        }
        if !shape.is_finite() {
            return Err(DaqError::HardwareRead {
                sensor: role,
                message: format!("{} returned a non-finite value: {:?}", port.name(), shape),
            });
        }

        Ok(RawReading::new(role, shape))
    }

    fn publish_state(&self, state: AcquisitionState) {
        self.status.send_modify(|s| s.state = state);
    }
}

impl std::fmt::Debug for AcquisitionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionOrchestrator")
            .field("sensors", &self.sensors)
            .field("writer", &self.writer.location())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{ReadingShape, SimulatedSensor};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    /// In-memory writer that can be switched to fail.
    #[derive(Clone, Default)]
    struct MemoryWriter {
        rows: Arc<Mutex<Vec<Record>>>,
        fail: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl PersistenceWriter for MemoryWriter {
        async fn append(&mut self, record: &Record) -> AppResult<()> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(DaqError::Persistence("storage unavailable".into()));
            }
            self.rows.lock().unwrap().push(record.clone());
            Ok(())
        }

        fn location(&self) -> String {
            "memory".into()
        }
    }

    fn full_bank() -> SensorBank {
        let mut bank = SensorBank::new();
        bank.install(
            SensorRole::Thermohygrometer,
            SimulatedSensor::new("DHT22", ReadingShape::Pair(20.0, 40.0)),
        )
        .install(
            SensorRole::Barometer,
            SimulatedSensor::new("BME280", ReadingShape::Triple(1013.254, 22.0, 44.0)),
        )
        .install(
            SensorRole::InfraredThermometer,
            SimulatedSensor::new("MLX90614", ReadingShape::Scalar(17.456)),
        )
        .install(
            SensorRole::LightSensor,
            SimulatedSensor::new("TSL2591", ReadingShape::Scalar(305.1)),
        )
        .install(
            SensorRole::UvSensor,
            SimulatedSensor::new("LTR390", ReadingShape::Scalar(12.0)),
        );
        bank
    }

    fn orchestrator(bank: SensorBank, writer: MemoryWriter) -> AcquisitionOrchestrator {
        AcquisitionOrchestrator::new(bank, writer, OrchestratorOptions::default())
    }

    #[tokio::test]
    async fn acquire_writes_rounded_value() {
        let mut orch = orchestrator(full_bank(), MemoryWriter::default());
        let value = orch.acquire(Field::AirTemp).await.unwrap();
        assert_eq!(value, Reconciled::Value(21.0));
        assert_eq!(orch.snapshot().get(Field::AirTemp), Some(&FieldValue::Number(21.0)));

        let view = orch.presentation();
        assert_eq!(view.display(Field::AirTemp), "21.00");
        assert_eq!(view.progress(Field::AirTemp), PROGRESS_MAX);
        assert_eq!(view.state, AcquisitionState::Idle);
    }

    #[tokio::test]
    async fn failed_read_keeps_previous_value() {
        let mut bank = full_bank();
        bank.install(
            SensorRole::Barometer,
            SimulatedSensor::new("BME280", ReadingShape::Triple(1000.0, 22.0, 44.0))
                .then_read(ReadingShape::Triple(1000.0, 22.0, 44.0))
                .then_fail("i2c nack"),
        );
        let mut orch = orchestrator(bank, MemoryWriter::default());

        orch.acquire(Field::Pressure).await.unwrap();
        let err = orch.acquire(Field::Pressure).await.unwrap_err();

        assert!(matches!(
            err,
            DaqError::HardwareRead {
                sensor: SensorRole::Barometer,
                ..
            }
        ));
        assert_eq!(orch.snapshot().get(Field::Pressure), Some(&FieldValue::Number(1000.0)));
        assert_eq!(orch.presentation().state, AcquisitionState::Idle);
    }

    #[tokio::test]
    async fn slow_sensor_times_out() {
        let mut bank = full_bank();
        bank.install(
            SensorRole::UvSensor,
            SimulatedSensor::new("LTR390", ReadingShape::Scalar(1.0))
                .with_delay(Duration::from_millis(500)),
        );
        let options = OrchestratorOptions {
            sensor_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let mut orch = AcquisitionOrchestrator::new(bank, MemoryWriter::default(), options);

        let err = orch.acquire(Field::UvRadiation).await.unwrap_err();
        assert!(matches!(
            err,
            DaqError::HardwareTimeout {
                sensor: SensorRole::UvSensor,
                ..
            }
        ));
        assert!(!orch.snapshot().is_set(Field::UvRadiation));
    }

    #[tokio::test]
    async fn wrong_shape_is_rejected_before_reconciling() {
        let mut bank = full_bank();
        bank.install(
            SensorRole::LightSensor,
            SimulatedSensor::new("TSL2591", ReadingShape::Pair(1.0, 2.0)),
        );
        let mut orch = orchestrator(bank, MemoryWriter::default());
        let err = orch.acquire(Field::IrRadiation).await.unwrap_err();
        assert!(err.to_string().contains("expected Scalar"));
    }

    #[tokio::test]
    async fn missing_sensor_and_text_fields() {
        let mut orch = orchestrator(full_bank(), MemoryWriter::default());
        assert!(matches!(
            orch.acquire(Field::Lat).await,
            Err(DaqError::SensorNotInstalled(SensorRole::Gps))
        ));
        assert!(matches!(
            orch.acquire(Field::Code).await,
            Err(DaqError::NotMeasurable(Field::Code))
        ));
    }

    #[tokio::test]
    async fn position_sets_both_fields() {
        let mut bank = full_bank();
        bank.install(
            SensorRole::Gps,
            SimulatedSensor::new(
                "GPS",
                ReadingShape::Coordinate {
                    lat: 45.4642,
                    lon: 9.1899,
                },
            ),
        );
        let mut orch = orchestrator(bank, MemoryWriter::default());
        orch.acquire(Field::Lon).await.unwrap();
        let record = orch.snapshot();
        assert_eq!(record.get(Field::Lat), Some(&FieldValue::Number(45.46)));
        assert_eq!(record.get(Field::Lon), Some(&FieldValue::Number(9.19)));
    }

    #[tokio::test]
    async fn commit_resets_only_on_success() {
        let writer = MemoryWriter::default();
        let mut orch = orchestrator(full_bank(), writer.clone());
        orch.enter_text(Field::Code, "P7");
        orch.acquire(Field::CanopyTemp).await.unwrap();
        let before = orch.snapshot();

        writer.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        assert!(matches!(orch.commit().await, Err(DaqError::Persistence(_))));
        assert_eq!(orch.snapshot(), before);
        assert_eq!(orch.presentation().display(Field::Code), "P7");

        writer.fail.store(false, std::sync::atomic::Ordering::SeqCst);
        let receipt = orch.commit().await.unwrap();
        assert_eq!(receipt.record, before);
        assert_eq!(receipt.location, "memory");
        assert!(orch.snapshot().is_empty());
        assert_eq!(orch.presentation().display(Field::CanopyTemp), "-");
        assert_eq!(orch.presentation().progress(Field::CanopyTemp), 0);
        assert_eq!(writer.rows.lock().unwrap().len(), 1);
    }

    #[traced_test]
    #[tokio::test]
    async fn failures_are_logged_with_field() {
        let mut bank = full_bank();
        bank.install(
            SensorRole::InfraredThermometer,
            SimulatedSensor::failing("MLX90614", "checksum mismatch"),
        );
        let mut orch = orchestrator(bank, MemoryWriter::default());

        orch.acquire(Field::Pressure).await.unwrap();
        assert!(orch.acquire(Field::CanopyTemp).await.is_err());

        assert!(logs_contain("Pressure measurement complete"));
        assert!(logs_contain("Canopy temperature measurement failed"));
        assert!(logs_contain("checksum mismatch"));
    }
}
