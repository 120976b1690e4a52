//! Simulated Sensor Implementations
//!
//! Provides simulated sensors for testing and bench runs without the field device.
//! All delays use `tokio::time::sleep`, never `std::thread::sleep`.
//!
//! A [`SimulatedSensor`] answers from a script first and from its baseline afterwards:
//!
//! ```rust,ignore
//! let barometer = SimulatedSensor::new("BME280", ReadingShape::Triple(1013.2, 22.0, 50.0))
//!     .then_fail("i2c bus stuck")
//!     .with_delay(Duration::from_millis(20));
//!
//! assert!(barometer.measure().await.is_err()); // scripted failure
//! assert!(barometer.measure().await.is_ok());  // baseline afterwards
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};

use crate::hardware::capabilities::{ReadingShape, SensorPort};

/// Outcome of one scripted measurement.
#[derive(Debug, Clone)]
enum Scripted {
    Reading(ReadingShape),
    Failure(String),
}

/// Simulated sensor with scripted readings, failure and delay injection
///
/// - Scripted outcomes are consumed first, in order
/// - Afterwards the baseline reading is returned, optionally with random jitter
/// - A baseline failure makes every unscripted call fail
pub struct SimulatedSensor {
    name: String,
    baseline: std::result::Result<ReadingShape, String>,
    script: Mutex<VecDeque<Scripted>>,
    jitter: f64,
    delay: Duration,
    calibration_failure: Option<String>,
    measure_calls: AtomicU64,
    calibrate_calls: AtomicU64,
}

impl SimulatedSensor {
    /// Sensor that always returns `baseline`.
    pub fn new(name: impl Into<String>, baseline: ReadingShape) -> Self {
        Self {
            name: name.into(),
            baseline: Ok(baseline),
            script: Mutex::new(VecDeque::new()),
            jitter: 0.0,
            delay: Duration::ZERO,
            calibration_failure: None,
            measure_calls: AtomicU64::new(0),
            calibrate_calls: AtomicU64::new(0),
        }
    }

    /// Sensor whose every unscripted measurement fails.
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            baseline: Err(message.into()),
            ..Self::new(name, ReadingShape::Scalar(0.0))
        }
    }

    /// Queue a reading ahead of the baseline.
    pub fn then_read(mut self, shape: ReadingShape) -> Self {
        self.script.get_mut().push_back(Scripted::Reading(shape));
        self
    }

    /// Queue a failure ahead of the baseline.
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.script
            .get_mut()
            .push_back(Scripted::Failure(message.into()));
        self
    }

    /// Uniform random jitter of `± amplitude` added to every baseline value.
    pub fn with_jitter(mut self, amplitude: f64) -> Self {
        self.jitter = amplitude.abs();
        self
    }

    /// Simulated transaction time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make `calibrate()` fail.
    pub fn with_calibration_failure(mut self, message: impl Into<String>) -> Self {
        self.calibration_failure = Some(message.into());
        self
    }

    /// Number of `measure()` calls so far.
    pub fn measure_count(&self) -> u64 {
        self.measure_calls.load(Ordering::SeqCst)
    }

    /// Number of `calibrate()` calls so far.
    pub fn calibrate_count(&self) -> u64 {
        self.calibrate_calls.load(Ordering::SeqCst)
    }

    fn jittered(&self, shape: ReadingShape) -> ReadingShape {
        if self.jitter == 0.0 {
            return shape;
        }
        let mut rng = rand::thread_rng();
        let values: Vec<f64> = shape
            .values()
            .into_iter()
            .map(|v| v + rng.gen_range(-self.jitter..=self.jitter))
            .collect();
        ReadingShape::from_values(shape.kind(), &values).unwrap_or(shape)
    }
}

#[async_trait]
impl SensorPort for SimulatedSensor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn measure(&self) -> Result<ReadingShape> {
        self.measure_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        if let Some(next) = self.script.lock().await.pop_front() {
            return match next {
                Scripted::Reading(shape) => Ok(shape),
                Scripted::Failure(message) => Err(anyhow!("{}: {}", self.name, message)),
            };
        }

        match &self.baseline {
            Ok(shape) => Ok(self.jittered(*shape)),
            Err(message) => Err(anyhow!("{}: {}", self.name, message)),
        }
    }

    async fn calibrate(&self) -> Result<()> {
        self.calibrate_calls.fetch_add(1, Ordering::SeqCst);
        match &self.calibration_failure {
            Some(message) => Err(anyhow!("{}: calibration failed: {}", self.name, message)),
            None => Ok(()),
        }
    }
}
