use chrono::NaiveDate;

/// An inclusive date range.
pub trait Period {
    fn start_date(&self) -> NaiveDate;
    fn end_date(&self) -> NaiveDate;

    fn contains(&self, day: NaiveDate) -> bool {
        self.start_date() <= day && day <= self.end_date()
    }
}

/// Picks the period a "current" view should show for `today`.
///
/// Candidates must already be limited to the requesting tenant. Preference:
/// the period containing today (latest start wins on overlap), then the
/// earliest period that has not started yet. `None` tells the caller to fall
/// back to a listing.
pub fn resolve_current<P: Period>(today: NaiveDate, candidates: &[P]) -> Option<&P> {
    let current = candidates
        .iter()
        .filter(|p| p.contains(today))
        .max_by_key(|p| p.start_date());
    if current.is_some() {
        return current;
    }
    candidates
        .iter()
        .filter(|p| p.start_date() > today)
        .min_by_key(|p| p.start_date())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Span(&'static str, NaiveDate, NaiveDate);

    impl Period for Span {
        fn start_date(&self) -> NaiveDate {
            self.1
        }
        fn end_date(&self) -> NaiveDate {
            self.2
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
    }

    fn span(name: &'static str, start: NaiveDate, end: NaiveDate) -> Span {
        Span(name, start, end)
    }

    #[test]
    fn empty_candidates_resolve_to_none() {
        let none: [Span; 0] = [];
        assert_eq!(resolve_current(d(2024, 1, 1), &none), None);
    }

    #[test]
    fn current_year_is_chosen() {
        let years = [span("current", d(2023, 9, 1), d(2024, 6, 1))];
        assert_eq!(resolve_current(d(2024, 1, 15), &years).map(|s| s.0), Some("current"));
    }

    #[test]
    fn boundaries_are_inclusive() {
        let years = [span("y", d(2023, 9, 1), d(2024, 6, 1))];
        assert!(resolve_current(d(2023, 9, 1), &years).is_some());
        assert!(resolve_current(d(2024, 6, 1), &years).is_some());
        assert!(resolve_current(d(2024, 6, 2), &years).is_none());
    }

    #[test]
    fn earliest_future_year_is_chosen_when_nothing_is_current() {
        let today = d(2024, 7, 1);
        let years = [
            span("later", d(2025, 9, 1), d(2026, 6, 1)),
            span("past", d(2023, 9, 1), d(2024, 6, 1)),
            span("next", d(2024, 9, 1), d(2025, 6, 1)),
        ];
        assert_eq!(resolve_current(today, &years).map(|s| s.0), Some("next"));
    }

    #[test]
    fn current_beats_future() {
        let today = d(2024, 3, 1);
        let years = [
            span("next", d(2024, 9, 1), d(2025, 6, 1)),
            span("now", d(2023, 9, 1), d(2024, 6, 1)),
        ];
        assert_eq!(resolve_current(today, &years).map(|s| s.0), Some("now"));
    }

    #[test]
    fn overlapping_years_prefer_latest_start() {
        let today = d(2024, 3, 1);
        let years = [
            span("older", d(2023, 9, 1), d(2024, 6, 1)),
            span("newer", d(2024, 1, 1), d(2024, 12, 1)),
        ];
        assert_eq!(resolve_current(today, &years).map(|s| s.0), Some("newer"));
    }

    #[test]
    fn only_past_years_resolve_to_none() {
        let years = [span("past", d(2020, 9, 1), d(2021, 6, 1))];
        assert_eq!(resolve_current(d(2024, 1, 1), &years), None);
    }
}
