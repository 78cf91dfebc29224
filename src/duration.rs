//! Converts preset and custom durations into canonical seconds.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{TimerError, TimerResult};

pub const MAX_HOURS: u8 = 23;
pub const MAX_MINUTES: u8 = 59;
pub const MAX_SECONDS: u8 = 59;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Preset {
    HalfMinute,
    Short,
    Pomodoro,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::HalfMinute, Preset::Short, Preset::Pomodoro];

    pub fn minutes(&self) -> f64 {
        match self {
            Preset::HalfMinute => 0.5,
            Preset::Short => 10.0,
            Preset::Pomodoro => 25.0,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        match self {
            Preset::HalfMinute => 30,
            Preset::Short => 10 * 60,
            Preset::Pomodoro => 25 * 60,
        }
    }

    pub fn from_seconds(secs: u64) -> Option<Preset> {
        Self::ALL.into_iter().find(|p| p.total_seconds() == secs)
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "half" | "30s" => Ok(Preset::HalfMinute),
            "short" | "10m" => Ok(Preset::Short),
            "pomodoro" | "25m" => Ok(Preset::Pomodoro),
            other => Err(format!("unknown preset '{other}' (expected half, short or pomodoro)")),
        }
    }
}

/// Custom `{hours, minutes, seconds}` triple. Each field is clamped to its
/// range; only the `step_*` affordances wrap.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomDuration {
    hours: u8,
    minutes: u8,
    seconds: u8,
}

/// Templates offered next to the custom steppers.
pub const CUSTOM_TEMPLATES: [CustomDuration; 9] = [
    CustomDuration::const_new(0, 0, 30),
    CustomDuration::const_new(0, 1, 0),
    CustomDuration::const_new(0, 2, 30),
    CustomDuration::const_new(0, 5, 0),
    CustomDuration::const_new(0, 10, 0),
    CustomDuration::const_new(0, 15, 0),
    CustomDuration::const_new(0, 30, 0),
    CustomDuration::const_new(0, 45, 0),
    CustomDuration::const_new(1, 0, 0),
];

impl CustomDuration {
    const fn const_new(hours: u8, minutes: u8, seconds: u8) -> Self {
        Self {
            hours,
            minutes,
            seconds,
        }
    }

    pub fn new(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self {
            hours: hours.min(MAX_HOURS as u32) as u8,
            minutes: minutes.min(MAX_MINUTES as u32) as u8,
            seconds: seconds.min(MAX_SECONDS as u32) as u8,
        }
    }

    /// Splits a second count into fields. Anything past 23:59:59 clamps.
    pub fn from_total_seconds(secs: u64) -> Self {
        Self::new(
            (secs / 3600).min(u32::MAX as u64) as u32,
            ((secs % 3600) / 60) as u32,
            (secs % 60) as u32,
        )
    }

    pub fn hours(&self) -> u8 {
        self.hours
    }

    pub fn minutes(&self) -> u8 {
        self.minutes
    }

    pub fn seconds(&self) -> u8 {
        self.seconds
    }

    pub fn total_seconds(&self) -> TimerResult<u64> {
        if self.hours == 0 && self.minutes == 0 && self.seconds == 0 {
            return Err(TimerError::InvalidDuration);
        }
        Ok(self.hours as u64 * 3600 + self.minutes as u64 * 60 + self.seconds as u64)
    }

    pub fn step_hours_up(&mut self) {
        if self.hours < MAX_HOURS {
            self.hours += 1;
        }
    }

    pub fn step_hours_down(&mut self) {
        self.hours = self.hours.saturating_sub(1);
    }

    pub fn step_minutes_up(&mut self) {
        self.minutes = wrap_up(self.minutes, MAX_MINUTES);
    }

    pub fn step_minutes_down(&mut self) {
        self.minutes = wrap_down(self.minutes, MAX_MINUTES);
    }

    pub fn step_seconds_up(&mut self) {
        self.seconds = wrap_up(self.seconds, MAX_SECONDS);
    }

    pub fn step_seconds_down(&mut self) {
        self.seconds = wrap_down(self.seconds, MAX_SECONDS);
    }
}

fn wrap_up(value: u8, max: u8) -> u8 {
    if value < max {
        value + 1
    } else {
        0
    }
}

fn wrap_down(value: u8, max: u8) -> u8 {
    if value > 0 {
        value - 1
    } else {
        max
    }
}

impl fmt::Display for CustomDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// Parses `H:M:S` or `M:S`. Out-of-range fields are rejected rather than clamped.
impl FromStr for CustomDuration {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts = value
            .trim()
            .split(':')
            .map(|part| {
                part.trim()
                    .parse::<u32>()
                    .map_err(|_| format!("invalid number '{part}' in duration '{value}'"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (hours, minutes, seconds) = match parts.as_slice() {
            [h, m, s] => (*h, *m, *s),
            [m, s] => (0, *m, *s),
            _ => return Err(format!("expected H:M:S or M:S, got '{value}'")),
        };

        if hours > MAX_HOURS as u32 || minutes > MAX_MINUTES as u32 || seconds > MAX_SECONDS as u32
        {
            return Err(format!(
                "duration '{value}' out of range (max {MAX_HOURS}:{MAX_MINUTES}:{MAX_SECONDS})"
            ));
        }

        Ok(Self::new(hours, minutes, seconds))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DurationChoice {
    Preset(Preset),
    Custom(CustomDuration),
}

impl DurationChoice {
    pub fn total_seconds(&self) -> TimerResult<u64> {
        match self {
            DurationChoice::Preset(preset) => Ok(preset.total_seconds()),
            DurationChoice::Custom(custom) => custom.total_seconds(),
        }
    }

    /// Reports a stored duration as the preset it matches, or as custom.
    pub fn classify(secs: u64) -> DurationChoice {
        match Preset::from_seconds(secs) {
            Some(preset) => DurationChoice::Preset(preset),
            None => DurationChoice::Custom(CustomDuration::from_total_seconds(secs)),
        }
    }
}

/// `HH:MM:SS` when there are hours, `MM:SS` otherwise.
pub fn format_time(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    #[test]
    fn zero_custom_duration_is_rejected() {
        let zero = CustomDuration::new(0, 0, 0);
        assert_matches!(zero.total_seconds(), Err(TimerError::InvalidDuration));
    }

    #[test]
    fn one_second_is_accepted() {
        assert_eq!(CustomDuration::new(0, 0, 1).total_seconds().unwrap(), 1);
    }

    #[test]
    fn fields_clamp_independently() {
        let d = CustomDuration::new(40, 75, 99);
        assert_eq!((d.hours(), d.minutes(), d.seconds()), (23, 59, 59));
        assert_eq!(d.total_seconds().unwrap(), 23 * 3600 + 59 * 60 + 59);
    }

    #[test]
    fn seconds_and_minutes_steppers_wrap() {
        let mut d = CustomDuration::new(0, 59, 0);
        d.step_seconds_down();
        assert_eq!(d.seconds(), 59);
        d.step_seconds_up();
        assert_eq!(d.seconds(), 0);
        d.step_minutes_up();
        assert_eq!(d.minutes(), 0);
        d.step_minutes_down();
        assert_eq!(d.minutes(), 59);
    }

    #[test]
    fn hour_stepper_stops_at_bounds() {
        let mut d = CustomDuration::new(23, 0, 0);
        d.step_hours_up();
        assert_eq!(d.hours(), 23);
        let mut d = CustomDuration::new(0, 1, 0);
        d.step_hours_down();
        assert_eq!(d.hours(), 0);
    }

    #[test]
    fn presets_map_to_seconds() {
        assert_eq!(Preset::HalfMinute.total_seconds(), 30);
        assert_eq!(Preset::Pomodoro.total_seconds(), 1500);
        for preset in Preset::ALL {
            assert_eq!(
                crate::models::minutes_to_secs(preset.minutes()),
                preset.total_seconds()
            );
        }
    }

    #[test]
    fn classify_recognises_presets_and_custom() {
        assert_eq!(
            DurationChoice::classify(600),
            DurationChoice::Preset(Preset::Short)
        );
        assert_eq!(
            DurationChoice::classify(3725),
            DurationChoice::Custom(CustomDuration::new(1, 2, 5))
        );
    }

    #[test]
    fn parses_clock_notation() {
        assert_eq!(
            "1:30:05".parse::<CustomDuration>().unwrap(),
            CustomDuration::new(1, 30, 5)
        );
        assert_eq!(
            "2:30".parse::<CustomDuration>().unwrap(),
            CustomDuration::new(0, 2, 30)
        );
        assert!("0:61".parse::<CustomDuration>().is_err());
        assert!("abc".parse::<CustomDuration>().is_err());
    }

    #[test]
    fn templates_are_all_valid() {
        assert!(CUSTOM_TEMPLATES.iter().all(|t| t.total_seconds().is_ok()));
    }

    #[test]
    fn formats_with_and_without_hours() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(900), "15:00");
        assert_eq!(format_time(3725), "01:02:05");
    }
}
