use chrono::Weekday;
use serde::{Serialize, Serializer};
use std::fmt;

/// Display order for day lists. Sunday leads, matching the bit layout.
pub const CALENDAR_ORDER: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

pub fn day_bit(day: Weekday) -> u8 {
    1 << day.num_days_from_sunday()
}

pub fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sunday",
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
    }
}

/// Accepts full names and three letter abbreviations, any case.
pub fn parse_day_name(s: &str) -> Option<Weekday> {
    s.trim().parse::<Weekday>().ok()
}

/// Set of weekdays stored as the persisted `days_of_week` bitmask
/// (Sunday=1, Monday=2, ... Saturday=64).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const EMPTY: WeekdaySet = WeekdaySet(0);
    pub const ALL: WeekdaySet = WeekdaySet(0b111_1111);
    /// Monday through Friday.
    pub const SCHOOL_WEEK: WeekdaySet = WeekdaySet(0b011_1110);

    pub fn from_bits(bits: i64) -> Option<Self> {
        if (0..=i64::from(Self::ALL.0)).contains(&bits) {
            Some(Self(bits as u8))
        } else {
            None
        }
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & day_bit(day) != 0
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= day_bit(day);
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Days in `self` that are not in `other`.
    pub fn difference(self, other: WeekdaySet) -> WeekdaySet {
        WeekdaySet(self.0 & !other.0)
    }

    pub fn is_subset(self, other: WeekdaySet) -> bool {
        self.difference(other).is_empty()
    }

    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        CALENDAR_ORDER.into_iter().filter(move |d| self.contains(*d))
    }

    pub fn names(self) -> Vec<&'static str> {
        self.iter().map(day_name).collect()
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = WeekdaySet::EMPTY;
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(", "))
    }
}

impl Serialize for WeekdaySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.names())
    }
}
