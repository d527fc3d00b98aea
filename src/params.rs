// src/params.rs - Run parameters and their validation
use serde::Serialize;
use std::fmt;
use std::num::IntErrorKind;
use std::ops::RangeInclusive;
use thiserror::Error;

/// Accepted loop counts.
pub const LOOPS_RANGE: RangeInclusive<u32> = 1..=100;
/// Accepted range for step size (µm), speed (µm/s) and delay (s).
pub const DECIMAL_RANGE: RangeInclusive<f64> = 0.05..=100.0;

/// One of the four user-editable run fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Loops,
    StepSize,
    Speed,
    Delay,
}

impl Field {
    /// Validation order used by atomic checks.
    pub const ALL: [Field; 4] = [Field::Loops, Field::StepSize, Field::Speed, Field::Delay];

    pub fn name(self) -> &'static str {
        match self {
            Field::Loops => "loops",
            Field::StepSize => "step_size",
            Field::Speed => "speed",
            Field::Delay => "delay",
        }
    }

    fn index(self) -> usize {
        match self {
            Field::Loops => 0,
            Field::StepSize => 1,
            Field::Speed => 2,
            Field::Delay => 3,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationReason {
    #[error("input cannot be empty")]
    Empty,
    #[error("input must be an integer")]
    NotAnInteger,
    #[error("input must be a decimal number between {} and {} (use .)", DECIMAL_RANGE.start(), DECIMAL_RANGE.end())]
    NotADecimal,
    #[error("value must be between {min} and {max}")]
    OutOfRange { min: f64, max: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: Field,
    pub reason: ValidationReason,
}

impl ValidationError {
    fn new(field: Field, reason: ValidationReason) -> Self {
        Self { field, reason }
    }
}

/// Raw text of the four fields as typed by the user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInputs {
    pub loops: String,
    pub step_size: String,
    pub speed: String,
    pub delay: String,
}

impl RawInputs {
    pub fn new(
        loops: impl Into<String>,
        step_size: impl Into<String>,
        speed: impl Into<String>,
        delay: impl Into<String>,
    ) -> Self {
        Self {
            loops: loops.into(),
            step_size: step_size.into(),
            speed: speed.into(),
            delay: delay.into(),
        }
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Loops => &self.loops,
            Field::StepSize => &self.step_size,
            Field::Speed => &self.speed,
            Field::Delay => &self.delay,
        }
    }
}

/// Validated configuration for one run.
///
/// Only obtainable through the validating constructors, so holding one means
/// every field is in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunParameters {
    loops: u32,
    step_size: f64,
    speed: f64,
    delay: f64,
}

impl RunParameters {
    pub fn new(loops: u32, step_size: f64, speed: f64, delay: f64) -> Result<Self, ValidationError> {
        check_loops(i64::from(loops)).map_err(|r| ValidationError::new(Field::Loops, r))?;
        for (field, value) in [(Field::StepSize, step_size), (Field::Speed, speed), (Field::Delay, delay)] {
            check_decimal(value).map_err(|r| ValidationError::new(field, r))?;
        }
        Ok(Self { loops, step_size, speed, delay })
    }

    /// Validate all four text inputs at once, reporting the first failing field.
    pub fn from_inputs(inputs: &RawInputs) -> Result<Self, ValidationError> {
        let loops = parse_loops(&inputs.loops).map_err(|r| ValidationError::new(Field::Loops, r))?;
        let decimal = |field: Field| {
            parse_decimal(inputs.get(field)).map_err(|r| ValidationError::new(field, r))
        };
        Self::new(loops, decimal(Field::StepSize)?, decimal(Field::Speed)?, decimal(Field::Delay)?)
    }

    pub fn loops(&self) -> u32 {
        self.loops
    }

    /// Step length in µm.
    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Travel speed in µm/s.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Settling pause between steps, in seconds.
    pub fn delay(&self) -> f64 {
        self.delay
    }
}

impl fmt::Display for RunParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loops={} step_size={}um speed={}um/s delay={}s",
            self.loops, self.step_size, self.speed, self.delay
        )
    }
}

/// Validate a single field's text, as done when the field is committed.
pub fn validate_field(field: Field, text: &str) -> Result<(), ValidationError> {
    let result = match field {
        Field::Loops => parse_loops(text).map(|_| ()),
        Field::StepSize | Field::Speed | Field::Delay => parse_decimal(text).map(|_| ()),
    };
    result.map_err(|reason| ValidationError::new(field, reason))
}

fn parse_loops(text: &str) -> Result<u32, ValidationReason> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationReason::Empty);
    }
    let value: i64 = trimmed.parse().map_err(|e: std::num::ParseIntError| match e.kind() {
        // Still an integer, just a huge one.
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => loops_out_of_range(),
        _ => ValidationReason::NotAnInteger,
    })?;
    check_loops(value)?;
    u32::try_from(value).map_err(|_| ValidationReason::NotAnInteger)
}

fn parse_decimal(text: &str) -> Result<f64, ValidationReason> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationReason::Empty);
    }
    let value: f64 = trimmed.parse().map_err(|_| ValidationReason::NotADecimal)?;
    check_decimal(value)?;
    Ok(value)
}

fn check_loops(value: i64) -> Result<(), ValidationReason> {
    let (min, max) = (*LOOPS_RANGE.start(), *LOOPS_RANGE.end());
    if value < i64::from(min) || value > i64::from(max) {
        return Err(loops_out_of_range());
    }
    Ok(())
}

fn loops_out_of_range() -> ValidationReason {
    ValidationReason::OutOfRange {
        min: f64::from(*LOOPS_RANGE.start()),
        max: f64::from(*LOOPS_RANGE.end()),
    }
}

fn check_decimal(value: f64) -> Result<(), ValidationReason> {
    // NaN fails `contains`
    if !DECIMAL_RANGE.contains(&value) {
        return Err(ValidationReason::OutOfRange {
            min: *DECIMAL_RANGE.start(),
            max: *DECIMAL_RANGE.end(),
        });
    }
    Ok(())
}

/// Edit state of the four input fields.
///
/// Each field is validated when committed; a field that has never been
/// committed is treated as invalid. `submit` re-validates everything from the
/// stored text so a run never starts from stale validity.
#[derive(Debug, Clone, Default)]
pub struct ParameterForm {
    inputs: RawInputs,
    validity: [Option<Result<(), ValidationError>>; 4],
}

impl ParameterForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commit(&mut self, field: Field, text: &str) -> Result<(), ValidationError> {
        let slot = match field {
            Field::Loops => &mut self.inputs.loops,
            Field::StepSize => &mut self.inputs.step_size,
            Field::Speed => &mut self.inputs.speed,
            Field::Delay => &mut self.inputs.delay,
        };
        *slot = text.to_string();
        let result = validate_field(field, text);
        self.validity[field.index()] = Some(result.clone());
        result
    }

    /// Last commit result for `field`, `None` if never committed.
    pub fn status(&self, field: Field) -> Option<&Result<(), ValidationError>> {
        self.validity[field.index()].as_ref()
    }

    pub fn all_valid(&self) -> bool {
        self.validity.iter().all(|v| matches!(v, Some(Ok(()))))
    }

    pub fn submit(&mut self) -> Result<RunParameters, ValidationError> {
        for field in Field::ALL {
            self.validity[field.index()] = Some(validate_field(field, self.inputs.get(field)));
        }
        RunParameters::from_inputs(&self.inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loops_parsing() {
        assert_eq!(parse_loops(" 42 "), Ok(42));
        assert_eq!(parse_loops("1.5"), Err(ValidationReason::NotAnInteger));
        assert_eq!(parse_loops("abc"), Err(ValidationReason::NotAnInteger));
        assert!(matches!(parse_loops("-3"), Err(ValidationReason::OutOfRange { .. })));
        assert!(matches!(
            parse_loops("-99999999999999999999"),
            Err(ValidationReason::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_decimal_parsing() {
        assert_eq!(parse_decimal("0.05"), Ok(0.05));
        assert_eq!(parse_decimal("100"), Ok(100.0));
        assert_eq!(parse_decimal("0,5"), Err(ValidationReason::NotADecimal));
        assert!(matches!(parse_decimal("NaN"), Err(ValidationReason::OutOfRange { .. })));
        assert!(matches!(parse_decimal("inf"), Err(ValidationReason::OutOfRange { .. })));
    }

    #[test]
    fn test_reason_messages() {
        let err = validate_field(Field::Loops, "0").unwrap_err();
        assert_eq!(err.to_string(), "loops: value must be between 1 and 100");
        let err = validate_field(Field::Speed, "fast").unwrap_err();
        assert_eq!(
            err.to_string(),
            "speed: input must be a decimal number between 0.05 and 100 (use .)"
        );
        let err = validate_field(Field::Delay, "   ").unwrap_err();
        assert_eq!(err.to_string(), "delay: input cannot be empty");
    }

    #[test]
    fn test_form_requires_every_field_committed() {
        let mut form = ParameterForm::new();
        assert!(!form.all_valid());
        form.commit(Field::Loops, "3").unwrap();
        form.commit(Field::StepSize, "10").unwrap();
        form.commit(Field::Speed, "5").unwrap();
        assert!(!form.all_valid());
        assert!(form.status(Field::Delay).is_none());
        form.commit(Field::Delay, "1").unwrap();
        assert!(form.all_valid());
        let params = form.submit().unwrap();
        assert_eq!(params.loops(), 3);
        assert_eq!(params.delay(), 1.0);
    }

    #[test]
    fn test_form_commit_invalidates_field() {
        let mut form = ParameterForm::new();
        for (field, text) in [(Field::Loops, "3"), (Field::StepSize, "10"), (Field::Speed, "5"), (Field::Delay, "1")] {
            form.commit(field, text).unwrap();
        }
        let err = form.commit(Field::StepSize, "0.04").unwrap_err();
        assert_eq!(err.field, Field::StepSize);
        assert!(!form.all_valid());
        assert_eq!(form.submit().unwrap_err().field, Field::StepSize);
    }
}
