#[cfg(test)]
mod tests {
    use crate::logic::{calculate_free_slots, day_window, WorkingHours};
    use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
    use chrono_tz::Tz;
    use proptest::prelude::*;

    // Busy periods as (offset minutes from local midnight, length in minutes)
    fn busy_periods(day: NaiveDate, tz: Tz, raw: &[(i64, i64)]) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        let (midnight, _) = day_window(day, tz);
        raw.iter()
            .map(|(offset, len)| {
                let start = midnight + Duration::minutes(*offset);
                (start, start + Duration::minutes(*len))
            })
            .collect()
    }

    proptest! {
        #[test]
        fn free_slots_respect_event_boundaries(
            day_offset in 0..365i64,
            start_hour in 0..12u32,
            span in 1..12u32,
            raw in prop::collection::vec((0..(24 * 60i64), 1..240i64), 0..6),
            zone in prop::sample::select(vec![
                Tz::Europe__Moscow,
                Tz::Europe__Zurich,
                Tz::America__New_York,
                Tz::UTC,
            ]),
        ) {
            let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + Duration::days(day_offset);
            let hours = WorkingHours {
                time_zone: zone,
                start_hour,
                end_hour: start_hour + span,
                closed_weekday: None,
            };
            let candidates = hours.slot_starts(day);
            let busy = busy_periods(day, zone, &raw);

            let free = calculate_free_slots(&candidates, &busy);

            for slot in &free {
                let instant = slot.with_timezone(&Utc);
                for (start, end) in &busy {
                    prop_assert!(instant != *start, "slot {} equals event start", slot);
                    prop_assert!(
                        !(instant > *start && instant < *end),
                        "slot {} lies inside {}..{}", slot, start, end
                    );
                }
                prop_assert!(slot.hour() >= start_hour && slot.hour() < start_hour + span);
                prop_assert_eq!(slot.minute(), 0);
            }

            // Every candidate sitting on an event end and not blocked by another event is offered.
            for candidate in &candidates {
                let instant = candidate.with_timezone(&Utc);
                let blocked = busy
                    .iter()
                    .any(|(s, e)| instant == *s || (instant > *s && instant < *e));
                if busy.iter().any(|(_, e)| *e == instant) && !blocked {
                    prop_assert!(free.contains(candidate), "event end {} should be free", candidate);
                }
            }

            // Output keeps the candidates' order.
            prop_assert!(free.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
