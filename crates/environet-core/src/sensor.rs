//! Environmental sensor collaborators.
//!
//! The monitor only sees a [`SensorSnapshot`]: an ordered map of decoded
//! scalar and boolean readings. How the readings were obtained (simulated
//! random walk, GPIO helper process) is hidden behind [`SensorSource`],
//! chosen once at startup by [`sensor_from_config`].

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, mpsc};
use std::time::{Duration, Instant};

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::SensorConfig;
use crate::error::SensorError;

/// Snapshot key for the ultrasonic distance reading, in centimetres.
pub const DISTANCE_KEY: &str = "distance_cm";
/// Snapshot key for the IR presence flag.
pub const MOTION_KEY: &str = "motion_detected";
/// Snapshot key for the distance-threshold flag.
pub const OBSTRUCTION_KEY: &str = "obstruction";
pub const TEMPERATURE_KEY: &str = "temperature_c";
pub const HUMIDITY_KEY: &str = "humidity_percent";
/// Snapshot key carrying a sensor failure message.
pub const ERROR_KEY: &str = "error";

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One decoded sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl std::fmt::Display for SensorValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flag(v) => write!(f, "{v}"),
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for SensorValue {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl From<f64> for SensorValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for SensorValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// Readings taken at the start of a tick, keyed by sensor name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorSnapshot(BTreeMap<String, SensorValue>);

impl SensorSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot recording only that the sensor read failed.
    pub fn from_error(err: &SensorError) -> Self {
        let mut snap = Self::new();
        snap.insert(ERROR_KEY, err.to_string().as_str());
        snap
    }

    pub fn with(mut self, key: &str, value: impl Into<SensorValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<SensorValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&SensorValue> {
        self.0.get(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            SensorValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean reading. Numeric 0/1 is accepted, as GPIO helpers often
    /// report pin levels.
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            SensorValue::Flag(v) => Some(*v),
            SensorValue::Number(v) => Some(*v != 0.0),
            SensorValue::Text(_) => None,
        }
    }

    pub fn distance_cm(&self) -> Option<f64> {
        self.number(DISTANCE_KEY)
    }

    pub fn motion_detected(&self) -> Option<bool> {
        self.flag(MOTION_KEY)
    }

    pub fn obstruction(&self) -> Option<bool> {
        self.flag(OBSTRUCTION_KEY)
    }

    pub fn temperature_c(&self) -> Option<f64> {
        self.number(TEMPERATURE_KEY)
    }

    pub fn humidity_percent(&self) -> Option<f64> {
        self.number(HUMIDITY_KEY)
    }

    pub fn error(&self) -> Option<&str> {
        match self.0.get(ERROR_KEY)? {
            SensorValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the snapshot asks for the full diagnostic battery.
    /// An absent or non-boolean flag never escalates.
    pub fn escalation_requested(&self, flag: &str) -> bool {
        self.flag(flag).unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SensorValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ---------------------------------------------------------------------------
// Source trait
// ---------------------------------------------------------------------------

/// Produces snapshots on demand. Reads may block briefly; async callers run
/// them on the blocking pool.
pub trait SensorSource: Send + Sync {
    /// Short identifier for logs and session metadata.
    fn name(&self) -> &'static str;

    fn read(&self) -> Result<SensorSnapshot, SensorError>;
}

/// Build the configured sensor.
pub fn sensor_from_config(config: &SensorConfig) -> Result<Arc<dyn SensorSource>, SensorError> {
    match config {
        SensorConfig::Simulated {
            seed,
            obstruction_threshold_cm,
        } => {
            let mut sensor = match seed {
                Some(seed) => SimulatedSensor::seeded(*seed),
                None => SimulatedSensor::new(),
            };
            if let Some(threshold) = obstruction_threshold_cm {
                sensor = sensor.with_obstruction_threshold(*threshold);
            }
            Ok(Arc::new(sensor))
        }
        SensorConfig::Live {
            command,
            timeout_secs,
        } => Ok(Arc::new(LiveSensor::new(
            command.clone(),
            Duration::from_secs(*timeout_secs),
        )?)),
    }
}

// ---------------------------------------------------------------------------
// Simulated sensor
// ---------------------------------------------------------------------------

const MIN_DISTANCE_CM: f64 = 2.0;
const MAX_DISTANCE_CM: f64 = 400.0;
const START_DISTANCE_CM: f64 = 100.0;
const WALK_STEP_CM: f64 = 5.0;
const NOISE_FACTOR: f64 = 0.05;
const TOGGLE_PROBABILITY: f64 = 0.2;
const DEFAULT_HOLD: Duration = Duration::from_secs(2);

const BASE_TEMPERATURE_C: f64 = 22.0;
const TEMPERATURE_SWING_C: f64 = 1.5;
const HEAT_SPIKE_PROBABILITY: f64 = 0.02;
const TEMPERATURE_RANGE_C: (f64, f64) = (18.0, 40.0);
const BASE_HUMIDITY_PERCENT: f64 = 45.0;
const HUMIDITY_SWING_PERCENT: f64 = 5.0;
const HUMIDITY_RANGE_PERCENT: (f64, f64) = (30.0, 60.0);

struct SimState {
    rng: StdRng,
    distance: f64,
    motion: bool,
    last_toggle: Instant,
}

/// Stand-in for an ultrasonic range finder, an IR presence detector and a
/// DHT22 temperature/humidity sensor.
///
/// Distance follows a bounded random walk with proportional noise on each
/// reading. Presence toggles with a fixed probability, but never sooner than
/// the hold time after the previous toggle. Temperature hovers around 22 °C
/// with an occasional heat spike; humidity hovers around 45 %.
///
/// With an obstruction threshold set, each snapshot also carries an
/// `obstruction` flag that is true while the reported distance is below it.
pub struct SimulatedSensor {
    state: Mutex<SimState>,
    hold: Duration,
    obstruction_threshold_cm: Option<f64>,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Reproducible sequence for tests and demos.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            state: Mutex::new(SimState {
                rng,
                distance: START_DISTANCE_CM,
                motion: false,
                last_toggle: Instant::now(),
            }),
            hold: DEFAULT_HOLD,
            obstruction_threshold_cm: None,
        }
    }

    /// Override the minimum time between presence toggles.
    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    pub fn with_obstruction_threshold(mut self, threshold_cm: f64) -> Self {
        self.obstruction_threshold_cm = Some(threshold_cm);
        self
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSource for SimulatedSensor {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn read(&self) -> Result<SensorSnapshot, SensorError> {
        let mut st = self
            .state
            .lock()
            .map_err(|_| SensorError::Config("simulated sensor state poisoned".into()))?;

        let step = st.rng.random_range(-WALK_STEP_CM..=WALK_STEP_CM);
        st.distance = (st.distance + step).clamp(MIN_DISTANCE_CM, MAX_DISTANCE_CM);
        let spread = st.distance * NOISE_FACTOR;
        let noise = st.rng.random_range(-spread..=spread);
        let distance = st.distance + noise;

        if st.last_toggle.elapsed() >= self.hold && st.rng.random_bool(TOGGLE_PROBABILITY) {
            st.motion = !st.motion;
            st.last_toggle = Instant::now();
        }

        let mut temperature =
            BASE_TEMPERATURE_C + st.rng.random_range(-TEMPERATURE_SWING_C..=TEMPERATURE_SWING_C);
        if st.rng.random_bool(HEAT_SPIKE_PROBABILITY) {
            temperature += st.rng.random_range(5.0..=10.0);
        }
        let humidity = BASE_HUMIDITY_PERCENT
            + st.rng.random_range(-HUMIDITY_SWING_PERCENT..=HUMIDITY_SWING_PERCENT);

        let (t_min, t_max) = TEMPERATURE_RANGE_C;
        let (h_min, h_max) = HUMIDITY_RANGE_PERCENT;

        let mut snapshot = SensorSnapshot::new()
            .with(DISTANCE_KEY, distance)
            .with(MOTION_KEY, st.motion)
            .with(TEMPERATURE_KEY, round_tenth(temperature.clamp(t_min, t_max)))
            .with(HUMIDITY_KEY, round_tenth(humidity.clamp(h_min, h_max)));
        if let Some(threshold) = self.obstruction_threshold_cm {
            snapshot.insert(OBSTRUCTION_KEY, distance < threshold);
        }
        Ok(snapshot)
    }
}

fn round_tenth(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

// ---------------------------------------------------------------------------
// Live sensor
// ---------------------------------------------------------------------------

/// Reads hardware through an external helper that prints one JSON object,
/// e.g. `{"distance_cm": 87.5, "motion_detected": true}`.
pub struct LiveSensor {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl LiveSensor {
    pub fn new(command: Vec<String>, timeout: Duration) -> Result<Self, SensorError> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| SensorError::Config("live sensor command is empty".into()))?;
        Ok(Self {
            program,
            args: parts.collect(),
            timeout,
        })
    }
}

impl SensorSource for LiveSensor {
    fn name(&self) -> &'static str {
        "live"
    }

    fn read(&self) -> Result<SensorSnapshot, SensorError> {
        let stdout = run_helper(&self.program, &self.args, self.timeout)?;
        debug!("sensor helper printed {} bytes", stdout.len());
        let snapshot: SensorSnapshot = serde_json::from_str(stdout.trim())?;
        Ok(snapshot)
    }
}

/// Run a helper to completion, killing it once `timeout` has passed.
///
/// Both pipes are drained on their own threads while the child runs, so a
/// helper printing more than a pipe buffer cannot stall.
fn run_helper(program: &str, args: &[String], timeout: Duration) -> Result<String, SensorError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| SensorError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(SensorError::Timeout(timeout));
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Err(source) => {
                let _ = child.kill();
                return Err(SensorError::Spawn {
                    program: program.to_string(),
                    source,
                });
            }
        }
    };

    // A grandchild may still hold the pipes open after the helper exits.
    let collect = |rx: mpsc::Receiver<io::Result<Vec<u8>>>| -> Result<Vec<u8>, SensorError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining.max(Duration::from_millis(100))) {
            Ok(result) => Ok(result?),
            Err(_) => Err(SensorError::Timeout(timeout)),
        }
    };

    if !status.success() {
        let stderr = collect(stderr).unwrap_or_default();
        return Err(SensorError::Exit {
            status: status.to_string(),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }
    let stdout = collect(stdout)?;
    String::from_utf8(stdout)
        .map_err(|e| SensorError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Read a pipe to EOF on a background thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<io::Result<Vec<u8>>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let result = match pipe {
            Some(mut pipe) => pipe.read_to_end(&mut buf).map(|_| buf),
            None => Ok(buf),
        };
        let _ = tx.send(result);
    });
    rx
}
