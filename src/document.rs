// Motion documents: JSON lists of motion steps
//
// {"motions": [{"type": "single", "channel": 2, "target_angle": 90, "duration_ms": 500},
//              {"type": "parallel", "channels": [0, 1], "target_angles": [45, 135],
//               "duration_ms": 800, "delay_after": 200}]}
//
// Every key has a short alias ({"m": [{"t": "s", "c": 2, "a": 90, "d": 500}]}).
// The first key of a field that is present wins, even if its value is the
// wrong type. Unknown keys are ignored.

use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::config::MAX_CHANNELS;
use crate::controller::MotionController;
use crate::error::{MotionError, Result, StepError};
use crate::motion::{MotionId, MotionKind};
use crate::sequence::MotionStep;
use crate::servo::Channel;

/// A document field and the keys it may appear under, in lookup order
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub keys: &'static [&'static str],
}

impl Field {
    const fn new(keys: &'static [&'static str]) -> Self {
        Self { name: keys[0], keys }
    }

    pub fn lookup<'a>(&self, object: &'a Map<String, Value>) -> Option<&'a Value> {
        self.keys.iter().find_map(|key| object.get(*key))
    }
}

pub const MOTIONS: Field = Field::new(&["motions", "m"]);
pub const TYPE: Field = Field::new(&["type", "t"]);
pub const CHANNEL: Field = Field::new(&["channel", "c"]);
pub const TARGET_ANGLE: Field = Field::new(&["target_angle", "a"]);
pub const DURATION: Field = Field::new(&["duration_ms", "d"]);
pub const CHANNELS: Field = Field::new(&["channels", "cs"]);
pub const TARGET_ANGLES: Field = Field::new(&["target_angles", "as"]);
pub const DELAY_AFTER: Field = Field::new(&["delay_after", "w"]);

/// Every step field, for reference and tests
pub const STEP_FIELDS: [Field; 7] = [
    TYPE,
    CHANNEL,
    TARGET_ANGLE,
    DURATION,
    CHANNELS,
    TARGET_ANGLES,
    DELAY_AFTER,
];

/// Parse the document and return its step array without interpreting it
pub fn parse_document(text: &str) -> Result<Vec<Value>> {
    let root: Value = serde_json::from_str(text)?;
    match root {
        Value::Object(mut object) => {
            let key = MOTIONS
                .keys
                .iter()
                .find(|key| object.contains_key(**key))
                .ok_or(MotionError::MissingMotions)?;
            match object.remove(*key) {
                Some(Value::Array(steps)) => Ok(steps),
                _ => Err(MotionError::MissingMotions),
            }
        }
        _ => Err(MotionError::MissingMotions),
    }
}

/// Interpret one step object
pub fn parse_step(value: &Value) -> std::result::Result<MotionStep, StepError> {
    let object = value.as_object().ok_or(StepError::NotAnObject)?;

    let kind_name = required(object, TYPE)?
        .as_str()
        .ok_or(wrong_type(TYPE, "a string"))?;
    let kind: MotionKind = kind_name
        .parse()
        .map_err(|_| StepError::UnknownType(kind_name.to_string()))?;

    let mut step = match kind {
        MotionKind::Single => {
            let channel = channel(number(object, CHANNEL)?, CHANNEL)?;
            let angle = number(object, TARGET_ANGLE)? as f32;
            let duration = millis(number(object, DURATION)?, DURATION)?;
            MotionStep::single(channel, angle, duration)
        }
        MotionKind::Group => {
            let channels = array(object, CHANNELS)?;
            let angles = array(object, TARGET_ANGLES)?;
            let duration = millis(number(object, DURATION)?, DURATION)?;

            if channels.len() != angles.len() {
                return Err(StepError::LengthMismatch {
                    channels: channels.len(),
                    angles: angles.len(),
                });
            }
            if channels.len() > MAX_CHANNELS {
                return Err(StepError::OutOfRange {
                    field: CHANNELS.name,
                    value: channels.len() as f64,
                });
            }

            let channels = channels
                .iter()
                .map(|v| {
                    let n = v.as_f64().ok_or(wrong_type(CHANNELS, "an array of numbers"))?;
                    channel(n, CHANNELS)
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let angles = angles
                .iter()
                .map(|v| {
                    v.as_f64()
                        .map(|n| n as f32)
                        .ok_or(wrong_type(TARGET_ANGLES, "an array of numbers"))
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            MotionStep::group(&channels, &angles, duration)
        }
    };

    // Optional: anything but a positive number means no delay
    if let Some(delay) = DELAY_AFTER.lookup(object).and_then(Value::as_f64) {
        if delay >= 1.0 {
            step.delay_after_ms = delay.min(u32::MAX as f64) as u32;
        }
    }

    Ok(step)
}

impl MotionController {
    /// Interpret a motion document step by step, submitting each step and
    /// sleeping its post-delay before reading the next. A bad step aborts
    /// the rest of the document; steps already submitted stay queued. A
    /// `stop_all` while this runs ends it with `Stopped`.
    pub fn exec_document(&self, text: &str) -> Result<Vec<MotionId>> {
        self.exec_document_since(text, self.generation())
    }

    /// `exec_document` for a document received at stop-all `generation`.
    /// If `stop_all` has run since, nothing is submitted.
    pub(crate) fn exec_document_since(&self, text: &str, generation: u64) -> Result<Vec<MotionId>> {
        let steps = parse_document(text).inspect_err(|e| warn!("Rejected motion document: {}", e))?;
        info!("Executing motion document with {} steps", steps.len());

        let mut ids = Vec::with_capacity(steps.len());
        for (index, value) in steps.iter().enumerate() {
            let step = parse_step(value).map_err(|reason| {
                warn!("Motion document step {} invalid: {}", index, reason);
                MotionError::Validation { index, reason }
            })?;
            ids.push(self.submit_step_until_stopped(&step, generation)?);
            self.wait_after(&step, generation)?;
        }
        Ok(ids)
    }
}

/// Long-form document for a list of steps
pub fn to_document(steps: &[MotionStep]) -> Value {
    let motions: Vec<Value> = steps
        .iter()
        .map(|step| {
            let mut object = match step.kind {
                MotionKind::Single => json!({
                    "type": "single",
                    "channel": step.channels.first(),
                    "target_angle": step.angles.first(),
                    "duration_ms": step.duration_ms,
                }),
                MotionKind::Group => json!({
                    "type": "parallel",
                    "channels": step.channels,
                    "target_angles": step.angles,
                    "duration_ms": step.duration_ms,
                }),
            };
            if step.delay_after_ms > 0 {
                object["delay_after"] = json!(step.delay_after_ms);
            }
            object
        })
        .collect();
    json!({ "motions": motions })
}

fn required(object: &Map<String, Value>, field: Field) -> std::result::Result<&Value, StepError> {
    field.lookup(object).ok_or(StepError::Missing(field.name))
}

fn number(object: &Map<String, Value>, field: Field) -> std::result::Result<f64, StepError> {
    required(object, field)?
        .as_f64()
        .ok_or(wrong_type(field, "a number"))
}

fn array(object: &Map<String, Value>, field: Field) -> std::result::Result<&Vec<Value>, StepError> {
    required(object, field)?
        .as_array()
        .ok_or(wrong_type(field, "an array"))
}

/// Numbers are truncated toward zero, then range-checked
fn channel(n: f64, field: Field) -> std::result::Result<Channel, StepError> {
    let whole = n.trunc();
    if (0.0..=Channel::MAX as f64).contains(&whole) {
        Ok(whole as Channel)
    } else {
        Err(StepError::OutOfRange {
            field: field.name,
            value: n,
        })
    }
}

fn millis(n: f64, field: Field) -> std::result::Result<u32, StepError> {
    let whole = n.trunc();
    if (0.0..=u32::MAX as f64).contains(&whole) {
        Ok(whole as u32)
    } else {
        Err(StepError::OutOfRange {
            field: field.name,
            value: n,
        })
    }
}

fn wrong_type(field: Field, expected: &'static str) -> StepError {
    StepError::WrongType {
        field: field.name,
        expected,
    }
}
