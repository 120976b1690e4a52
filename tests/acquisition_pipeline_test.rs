//! Integration tests for the acquisition pipeline
//!
//! Simulated sensors feed the orchestrator, records land in a real CSV file in a
//! temporary directory.

use std::path::Path;
use std::time::Duration;

use field_daq::acquisition::{AcquisitionOrchestrator, OrchestratorOptions, PROGRESS_MAX};
use field_daq::data::storage::read_rows;
use field_daq::data::{CsvRecordLog, Reconciled};
use field_daq::hardware::{ReadingShape, SensorBank, SensorRole, SimulatedSensor};
use field_daq::record::{Field, FieldValue};
use field_daq::DaqError;
use tempfile::tempdir;

const HEADER: &str =
    "CODE,LAT,LON,AIR_TEMP,CANOPY_TEMP,HUM,GROUND_HUM,WIND_SPEED,PRESSURE,IR_RAD,UV_RAD\r\n";

fn environmental_bank() -> SensorBank {
    let mut bank = SensorBank::new();
    bank.install(
        SensorRole::Thermohygrometer,
        SimulatedSensor::new("DHT22", ReadingShape::Pair(20.0, 50.0)),
    )
    .install(
        SensorRole::Barometer,
        SimulatedSensor::new("BME280", ReadingShape::Triple(1013.25, 22.0, 60.0)),
    )
    .install(
        SensorRole::InfraredThermometer,
        SimulatedSensor::new("MLX90614", ReadingShape::Scalar(18.456)),
    )
    .install(
        SensorRole::LightSensor,
        SimulatedSensor::new("TSL2591", ReadingShape::Scalar(310.0)),
    )
    .install(
        SensorRole::UvSensor,
        SimulatedSensor::new("LTR390", ReadingShape::Scalar(24.0)),
    );
    bank
}

fn orchestrator_at(bank: SensorBank, path: &Path) -> AcquisitionOrchestrator {
    let log = CsvRecordLog::create(path).unwrap();
    AcquisitionOrchestrator::new(bank, log, OrchestratorOptions::default())
}

// =============================================================================
// End to end
// =============================================================================

#[tokio::test]
async fn test_collect_and_commit_one_location() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("field_data.csv");
    let mut orch = orchestrator_at(environmental_bank(), &path);

    let report = orch.acquire_all(None).await;
    assert!(report.is_complete(), "{:?}", report.failed);
    assert_eq!(report.completed, Field::ENVIRONMENTAL_SEQUENCE.to_vec());

    orch.enter_text(Field::Code, "P1");
    orch.enter_text(Field::WindSpeed, "3.2");
    orch.enter_text(Field::GroundHumidity, "40");
    orch.commit().await.unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        content,
        format!("{HEADER}P1,,,21.00,18.46,55.00,40,3.2,1013.25,310.00,24.00\r\n")
    );
    assert!(orch.snapshot().is_empty());
}

#[tokio::test]
async fn test_rows_accumulate_across_commits() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("field_data.csv");
    let mut orch = orchestrator_at(environmental_bank(), &path);

    for code in ["P1", "P2", "P3"] {
        orch.enter_text(Field::Code, code);
        orch.acquire(Field::Pressure).await.unwrap();
        orch.commit().await.unwrap();
    }

    let rows = read_rows(&path).unwrap();
    let codes: Vec<_> = rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(codes, ["P1", "P2", "P3"]);
    assert!(rows.iter().all(|r| r[8] == "1013.25" && r[3].is_empty()));
}

#[tokio::test]
async fn test_progress_reaches_max_for_every_field() {
    let dir = tempdir().unwrap();
    let mut orch = orchestrator_at(environmental_bank(), &dir.path().join("data.csv"));
    let status = orch.subscribe();

    orch.acquire_all(None).await;

    let view = status.borrow().clone();
    for field in Field::ENVIRONMENTAL_SEQUENCE {
        assert_eq!(view.progress(field), PROGRESS_MAX, "{field}");
        assert_ne!(view.display(field), "-", "{field}");
    }
    assert_eq!(view.progress(Field::Code), 0);
}

// =============================================================================
// Failure handling
// =============================================================================

#[tokio::test]
async fn test_read_error_does_not_block_remaining_fields() {
    let dir = tempdir().unwrap();
    let mut bank = environmental_bank();
    bank.install(
        SensorRole::InfraredThermometer,
        SimulatedSensor::failing("MLX90614", "bus error"),
    );
    let mut orch = orchestrator_at(bank, &dir.path().join("data.csv"));

    let report = orch.acquire_all(None).await;

    assert_eq!(report.failed.len(), 1);
    let (field, error) = &report.failed[0];
    assert_eq!(*field, Field::CanopyTemp);
    assert_eq!(error.sensor(), Some(SensorRole::InfraredThermometer));
    assert!(error.is_recoverable());
    assert_eq!(report.completed.len(), 5);

    let record = orch.snapshot();
    assert!(!record.is_set(Field::CanopyTemp));
    assert_eq!(record.get(Field::UvRadiation), Some(&FieldValue::Number(24.0)));
}

#[tokio::test]
async fn test_retry_after_read_error_succeeds() {
    let dir = tempdir().unwrap();
    let mut bank = environmental_bank();
    bank.install(
        SensorRole::UvSensor,
        SimulatedSensor::new("LTR390", ReadingShape::Scalar(7.5)).then_fail("no ack"),
    );
    let mut orch = orchestrator_at(bank, &dir.path().join("data.csv"));

    assert!(orch.acquire(Field::UvRadiation).await.is_err());
    assert_eq!(
        orch.acquire(Field::UvRadiation).await.unwrap(),
        Reconciled::Value(7.5)
    );
}

#[tokio::test]
async fn test_timeout_preserves_prior_value() {
    let dir = tempdir().unwrap();
    let mut bank = environmental_bank();
    bank.install(
        SensorRole::LightSensor,
        SimulatedSensor::new("TSL2591", ReadingShape::Scalar(999.0))
            .then_read(ReadingShape::Scalar(120.0))
            .with_delay(Duration::from_millis(300)),
    );
    let log = CsvRecordLog::create(dir.path().join("data.csv")).unwrap();
    let options = OrchestratorOptions {
        sensor_timeout: Duration::from_millis(500),
        ..Default::default()
    };
    let mut orch = AcquisitionOrchestrator::new(bank, log, options);

    orch.acquire(Field::IrRadiation).await.unwrap();
    assert_eq!(
        orch.snapshot().get(Field::IrRadiation),
        Some(&FieldValue::Number(120.0))
    );

    let mut slow = environmental_bank();
    slow.install(
        SensorRole::LightSensor,
        SimulatedSensor::new("TSL2591", ReadingShape::Scalar(999.0))
            .with_delay(Duration::from_secs(2)),
    );
    let log = CsvRecordLog::create(dir.path().join("slow.csv")).unwrap();
    let mut slow_orch = AcquisitionOrchestrator::new(
        slow,
        log,
        OrchestratorOptions {
            sensor_timeout: Duration::from_millis(50),
            ..Default::default()
        },
    );
    slow_orch.enter_text(Field::IrRadiation, "manual 100");

    let err = slow_orch.acquire(Field::IrRadiation).await.unwrap_err();
    assert!(matches!(err, DaqError::HardwareTimeout { .. }));
    assert_eq!(err.to_string(), "Hardware timeout on light_sensor after 50ms");
    assert_eq!(
        slow_orch.snapshot().get(Field::IrRadiation),
        Some(&FieldValue::from("manual 100"))
    );
}

#[tokio::test]
async fn test_failed_commit_keeps_record_for_retry() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("late.csv");
    let mut orch =
        AcquisitionOrchestrator::new(environmental_bank(), CsvRecordLog::open(&path), OrchestratorOptions::default());

    orch.enter_text(Field::Code, "P9");
    orch.acquire(Field::AirTemp).await.unwrap();
    let before = orch.snapshot();

    let err = orch.commit().await.unwrap_err();
    assert!(matches!(err, DaqError::Persistence(_)));
    assert_eq!(orch.snapshot(), before);
    assert!(!path.exists());

    // Storage comes back: the same record commits on retry.
    CsvRecordLog::create(&path).unwrap();
    let receipt = orch.commit().await.unwrap();
    assert_eq!(receipt.record, before);

    let rows = read_rows(&path).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], "P9");
    assert_eq!(rows[0][3], "21.00");
}

#[tokio::test]
async fn test_huge_finite_readings_commit_as_numbers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.csv");
    let mut bank = environmental_bank();
    bank.install(
        SensorRole::Thermohygrometer,
        SimulatedSensor::new("DHT22", ReadingShape::Pair(f64::MAX, 50.0)),
    )
    .install(
        SensorRole::Barometer,
        SimulatedSensor::new("BME280", ReadingShape::Triple(1013.25, f64::MAX, 60.0)),
    )
    .install(
        SensorRole::UvSensor,
        SimulatedSensor::new("LTR390", ReadingShape::Scalar(1e307)),
    );
    let mut orch = orchestrator_at(bank, &path);

    orch.acquire(Field::AirTemp).await.unwrap();
    orch.acquire(Field::UvRadiation).await.unwrap();
    orch.enter_text(Field::Code, "P6");
    orch.commit().await.unwrap();

    let rows = read_rows(&path).unwrap();
    for column in [3, 10] {
        let cell: f64 = rows[0][column].parse().unwrap();
        assert!(cell.is_finite(), "column {column}: {}", rows[0][column]);
    }
}

#[tokio::test]
async fn test_uninstalled_sensor_is_reported() {
    let dir = tempdir().unwrap();
    let mut orch = orchestrator_at(SensorBank::new(), &dir.path().join("data.csv"));

    let report = orch.acquire_all(None).await;
    assert!(report.completed.is_empty());
    assert!(report
        .failed
        .iter()
        .all(|(_, e)| matches!(e, DaqError::SensorNotInstalled(_))));
    assert!(!report.failed[0].1.is_recoverable());
}

// =============================================================================
// Position
// =============================================================================

#[tokio::test]
async fn test_commit_adds_position_when_missing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.csv");
    let mut bank = environmental_bank();
    bank.install(
        SensorRole::Gps,
        SimulatedSensor::new(
            "GPS",
            ReadingShape::Coordinate {
                lat: 46.0037,
                lon: 8.9511,
            },
        ),
    );
    let mut orch = orchestrator_at(bank, &path);

    orch.enter_text(Field::Code, "P4");
    let receipt = orch.commit().await.unwrap();
    assert_eq!(receipt.record.get(Field::Lat), Some(&FieldValue::Number(46.0)));

    let rows = read_rows(&path).unwrap();
    assert_eq!(&rows[0][..3], ["P4", "46.00", "8.95"]);
}

#[tokio::test]
async fn test_commit_without_gps_fix_still_succeeds() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.csv");
    let mut bank = environmental_bank();
    bank.install(SensorRole::Gps, SimulatedSensor::failing("GPS", "no fix"));
    let mut orch = orchestrator_at(bank, &path);

    orch.enter_text(Field::Code, "P5");
    orch.commit().await.unwrap();

    let rows = read_rows(&path).unwrap();
    assert_eq!(&rows[0][..3], ["P5", "", ""]);
}
