// libs/schedule-cell/src/services/slots.rs
//
// Pure slot arithmetic: converting a shift's wall-clock bounds into the
// ordered set of fixed-width bookable intervals. No store access, no side
// effects; the schedule service calls this on every shift (re)generation.

use chrono::NaiveTime;

use crate::models::ScheduleError;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// One generated slot boundary pair. Slots are contiguous and ordered; the
/// final slot keeps its full width even when it overruns the shift end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInterval {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Parse a wall-clock time of day. Accepts 24-hour ("14:30", "14:30:00") and
/// 12-hour ("02:30 PM") forms; everything is normalized to `NaiveTime`.
pub fn parse_wall_clock(raw: &str) -> Result<NaiveTime, ScheduleError> {
    let trimmed = raw.trim();
    let upper = trimmed.to_ascii_uppercase();

    for (input, format) in [
        (trimmed, "%H:%M:%S"),
        (trimmed, "%H:%M"),
        (upper.as_str(), "%I:%M %p"),
        (upper.as_str(), "%I:%M:%S %p"),
    ] {
        if let Ok(time) = NaiveTime::parse_from_str(input, format) {
            return Ok(time);
        }
    }

    Err(ScheduleError::InvalidRange(format!(
        "Unrecognized time of day: {}", raw
    )))
}

/// Generate the ordered slot intervals covering `[start, end)` at the given
/// granularity. Slots repeat while the current slot start is strictly before
/// `end`, so when the shift length is not an exact multiple of the
/// granularity the last slot overruns `end` rather than being clipped.
pub fn generate_slots(
    start: NaiveTime,
    end: NaiveTime,
    granularity_minutes: u32,
) -> Result<Vec<SlotInterval>, ScheduleError> {
    if granularity_minutes == 0 {
        return Err(ScheduleError::InvalidRange(
            "Slot granularity must be positive".to_string(),
        ));
    }

    let start_minutes = minutes_from_midnight(start);
    let end_minutes = minutes_from_midnight(end);

    if end_minutes <= start_minutes {
        return Err(ScheduleError::InvalidRange(format!(
            "Shift end {} must be after start {}", end, start
        )));
    }

    let mut slots = Vec::new();
    let mut current = start_minutes;

    while current < end_minutes {
        let slot_end = current + granularity_minutes;
        // Overrun is bounded by the day: a final slot may pass the shift end,
        // but never midnight.
        if slot_end >= MINUTES_PER_DAY {
            return Err(ScheduleError::InvalidRange(
                "Shift slots would extend past midnight".to_string(),
            ));
        }
        slots.push(SlotInterval {
            start: time_of(current)?,
            end: time_of(slot_end)?,
        });
        current = slot_end;
    }

    Ok(slots)
}

fn minutes_from_midnight(time: NaiveTime) -> u32 {
    use chrono::Timelike;
    time.hour() * 60 + time.minute()
}

fn time_of(minutes: u32) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
        .ok_or_else(|| ScheduleError::InvalidRange(format!(
            "Minute offset {} is outside the day", minutes
        )))
}
