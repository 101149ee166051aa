use regex::Regex;

/// A validated time of day on the grid's minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
}

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self { hour, minute })
    }

    pub fn minutes(&self) -> i32 {
        (self.hour * 60 + self.minute) as i32
    }

    /// Canonical `HH:MM` form used in storage and cell keys.
    pub fn canonical(&self) -> String {
        format_time(self.hour, self.minute)
    }
}

/// Parses user-entered `H:MM` / `HH:MM` text.
///
/// Exactly one `:` is accepted, each side may carry surrounding whitespace and
/// must be an unsigned integer. Out of range hours or minutes are rejected.
pub fn parse_time(text: &str) -> Option<ClockTime> {
    let clock_re = Regex::new(r"^\s*(?P<hour>\d+)\s*:\s*(?P<minute>\d+)\s*$").ok()?;
    let captures = clock_re.captures(text)?;

    let hour = captures.name("hour")?.as_str().parse::<u32>().ok()?;
    let minute = captures.name("minute")?.as_str().parse::<u32>().ok()?;

    ClockTime::new(hour, minute)
}

pub fn format_time(hour: u32, minute: u32) -> String {
    format!("{hour:02}:{minute:02}")
}

/// Sort key for a stored time string. Unset or unparsable times map to `-1`
/// so those rows sort ahead of every valid time.
pub fn to_minutes(text: &str) -> i32 {
    if text.is_empty() {
        return -1;
    }
    parse_time(text).map(|t| t.minutes()).unwrap_or(-1)
}

/// One slot per full hour from `start` to `end` inclusive.
pub fn hourly_slots(start: u32, end: u32) -> Vec<String> {
    (start..=end.min(23)).map(|hour| format_time(hour, 0)).collect()
}
