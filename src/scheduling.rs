use serde::Serialize;

pub const DEFAULT_STEP_MINUTES: i64 = 15;
const MAX_ALTERNATIVES: usize = 6;

/// Half-open interval in minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval {
    pub start_minute: i64,
    pub duration_minutes: i64,
}

impl Interval {
    pub fn new(start_minute: i64, duration_minutes: i64) -> Self {
        Self {
            start_minute,
            duration_minutes,
        }
    }

    pub fn end_minute(&self) -> i64 {
        self.start_minute + self.duration_minutes
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start_minute < other.end_minute() && self.end_minute() > other.start_minute
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BusySource {
    Booking { id: String },
    TimeBlock { id: String },
}

/// An occupied interval on a professional's day: an existing booking or a
/// manual time block.
#[derive(Debug, Clone, Serialize)]
pub struct Busy {
    #[serde(flatten)]
    pub interval: Interval,
    pub source: BusySource,
    pub label: String,
}

/// The shop's opening window for one day.
#[derive(Debug, Clone, Copy)]
pub struct DayWindow {
    pub opening_minute: i64,
    pub closing_minute: i64,
}

impl DayWindow {
    pub fn contains(&self, slot: &Interval) -> bool {
        slot.start_minute >= self.opening_minute && slot.end_minute() <= self.closing_minute
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SlotCheck {
    Free,
    OutsideHours,
    Conflict {
        with: Busy,
        alternatives: Vec<Interval>,
    },
}

impl SlotCheck {
    pub fn is_free(&self) -> bool {
        matches!(self, SlotCheck::Free)
    }
}

/// Checks a candidate slot against a professional's busy intervals. Adjacent
/// intervals (end == start) do not conflict.
pub fn check_slot(candidate: Interval, busy: &[Busy], window: DayWindow, step: i64) -> SlotCheck {
    if !window.contains(&candidate) {
        return SlotCheck::OutsideHours;
    }
    match busy.iter().find(|entry| candidate.overlaps(&entry.interval)) {
        Some(entry) => SlotCheck::Conflict {
            with: entry.clone(),
            alternatives: free_slots(candidate.duration_minutes, busy, window, step)
                .into_iter()
                .take(MAX_ALTERNATIVES)
                .collect(),
        },
        None => SlotCheck::Free,
    }
}

/// All starts on the grid where a slot of the given duration fits inside the
/// opening window without touching any busy interval.
pub fn free_slots(duration_minutes: i64, busy: &[Busy], window: DayWindow, step: i64) -> Vec<Interval> {
    let step = if step > 0 { step } else { DEFAULT_STEP_MINUTES };
    let mut slots = Vec::new();
    if duration_minutes <= 0 {
        return slots;
    }
    let mut start = window.opening_minute;
    while start + duration_minutes <= window.closing_minute {
        let slot = Interval::new(start, duration_minutes);
        if !busy.iter().any(|entry| slot.overlaps(&entry.interval)) {
            slots.push(slot);
        }
        start += step;
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking(start: i64, duration: i64) -> Busy {
        Busy {
            interval: Interval::new(start, duration),
            source: BusySource::Booking {
                id: "b-1".to_string(),
            },
            label: "Signature Cut".to_string(),
        }
    }

    fn block(start: i64, duration: i64) -> Busy {
        Busy {
            interval: Interval::new(start, duration),
            source: BusySource::TimeBlock {
                id: "t-1".to_string(),
            },
            label: "Lunch".to_string(),
        }
    }

    fn window() -> DayWindow {
        DayWindow {
            opening_minute: 9 * 60,
            closing_minute: 19 * 60,
        }
    }

    #[test]
    fn non_overlapping_slot_is_free() {
        let busy = vec![booking(600, 30), block(720, 60)];
        let check = check_slot(Interval::new(660, 45), &busy, window(), 15);
        assert!(check.is_free());
    }

    #[test]
    fn overlap_on_either_edge_conflicts() {
        let busy = vec![booking(600, 30)];
        // Starts before the booking ends.
        assert!(!check_slot(Interval::new(615, 30), &busy, window(), 15).is_free());
        // Ends after the booking starts.
        assert!(!check_slot(Interval::new(585, 30), &busy, window(), 15).is_free());
        // Fully covers the booking.
        assert!(!check_slot(Interval::new(590, 60), &busy, window(), 15).is_free());
    }

    #[test]
    fn back_to_back_slots_do_not_conflict() {
        let busy = vec![booking(600, 30)];
        assert!(check_slot(Interval::new(630, 30), &busy, window(), 15).is_free());
        assert!(check_slot(Interval::new(570, 30), &busy, window(), 15).is_free());
    }

    #[test]
    fn time_blocks_count_as_busy() {
        let busy = vec![block(720, 60)];
        match check_slot(Interval::new(750, 30), &busy, window(), 15) {
            SlotCheck::Conflict { with, .. } => {
                assert!(matches!(with.source, BusySource::TimeBlock { .. }));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn slot_outside_opening_window_is_rejected() {
        let check = check_slot(Interval::new(8 * 60, 45), &[], window(), 15);
        assert!(matches!(check, SlotCheck::OutsideHours));
        let check = check_slot(Interval::new(18 * 60 + 30, 45), &[], window(), 15);
        assert!(matches!(check, SlotCheck::OutsideHours));
    }

    #[test]
    fn alternatives_avoid_busy_intervals_and_respect_window() {
        let busy = vec![booking(540, 60), booking(600, 30), block(720, 60)];
        match check_slot(Interval::new(610, 45), &busy, window(), 15) {
            SlotCheck::Conflict { alternatives, .. } => {
                assert!(!alternatives.is_empty());
                assert!(alternatives.len() <= 6);
                for slot in &alternatives {
                    assert!(window().contains(slot));
                    assert!(!busy.iter().any(|b| slot.overlaps(&b.interval)));
                }
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn free_slots_walk_the_grid() {
        let busy = vec![booking(540, 30)];
        let slots = free_slots(30, &busy, window(), 15);
        // 09:00 and 09:15 collide with the 09:00-09:30 booking.
        assert_eq!(slots.first(), Some(&Interval::new(570, 30)));
        let last = slots.last().unwrap();
        assert_eq!(last.end_minute(), 19 * 60);
        assert!(slots.windows(2).all(|pair| pair[0].start_minute < pair[1].start_minute));
    }

    #[test]
    fn fully_booked_day_has_no_alternatives() {
        let busy = vec![block(9 * 60, 10 * 60)];
        match check_slot(Interval::new(600, 30), &busy, window(), 15) {
            SlotCheck::Conflict { alternatives, .. } => assert!(alternatives.is_empty()),
            other => panic!("expected conflict, got {other:?}"),
        }
    }
}
