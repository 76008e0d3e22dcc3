use std::fmt;
use thiserror::Error;

/// Why a trim reply could not be turned into bounds
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrimError {
    #[error("expected exactly one `-` between start and end")]
    Shape,
    #[error("invalid timecode `{0}`")]
    Timecode(String),
    #[error("end ({end}) must be after start ({start})")]
    Order { start: f64, end: f64 },
}

/// Inclusive cut window in seconds, always with start < end
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimBounds {
    start: f64,
    end: f64,
}

impl TrimBounds {
    pub fn new(start: f64, end: f64) -> Result<Self, TrimError> {
        if !start.is_finite() || start < 0.0 {
            return Err(TrimError::Timecode(start.to_string()));
        }
        if !end.is_finite() {
            return Err(TrimError::Timecode(end.to_string()));
        }
        if start >= end {
            return Err(TrimError::Order { start, end });
        }
        Ok(TrimBounds { start, end })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

impl fmt::Display for TrimBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Parse `H:MM:SS`, `MM:SS` or plain seconds into seconds
pub fn parse_timecode(input: &str) -> Result<f64, TrimError> {
    let trimmed = input.trim();
    let invalid = || TrimError::Timecode(trimmed.to_string());

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() > 3 {
        return Err(invalid());
    }

    let mut seconds = 0.0;
    for part in &parts {
        let part = part.trim();
        // f64::from_str accepts "inf", "nan" and signs, none of which are timecodes
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(invalid());
        }
        let value: f64 = part.parse().map_err(|_| invalid())?;
        seconds = seconds * 60.0 + value;
    }

    Ok(seconds)
}

/// Parse a `start-end` reply into trim bounds
pub fn parse_trim_reply(text: &str) -> Result<TrimBounds, TrimError> {
    let parts: Vec<&str> = text.trim().split('-').collect();
    if parts.len() != 2 {
        return Err(TrimError::Shape);
    }
    let start = parse_timecode(parts[0])?;
    let end = parse_timecode(parts[1])?;
    TrimBounds::new(start, end)
}
