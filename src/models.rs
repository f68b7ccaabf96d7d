use crate::rules::{Period, Tenant, Tenanted, WeekdaySet};
use chrono::{Duration, NaiveDate};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub school_id: String,
    pub email: String,
    pub created_at: NaiveDate,
}

impl Tenant for User {
    fn school_id(&self) -> &str {
        &self.school_id
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolYear {
    pub id: String,
    pub school_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days_of_week: WeekdaySet,
}

impl Tenanted for SchoolYear {
    fn owner_school_id(&self) -> Option<&str> {
        Some(&self.school_id)
    }
}

impl Period for SchoolYear {
    fn start_date(&self) -> NaiveDate {
        self.start_date
    }
    fn end_date(&self) -> NaiveDate {
        self.end_date
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeLevel {
    pub id: String,
    pub school_year_id: String,
    pub name: String,
    #[serde(skip)]
    pub school_id: String,
}

impl Tenanted for GradeLevel {
    fn owner_school_id(&self) -> Option<&str> {
        Some(&self.school_id)
    }
}

/// A course as loaded with its owner chain resolved. Courses without grade
/// levels have no school year and therefore no owner.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub name: String,
    pub days_of_week: WeekdaySet,
    pub default_task_duration: i64,
    pub school_year_id: Option<String>,
    #[serde(skip)]
    pub school_id: Option<String>,
}

impl Tenanted for Course {
    fn owner_school_id(&self) -> Option<&str> {
        self.school_id.as_deref()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseTask {
    pub id: String,
    pub course_id: String,
    pub description: String,
    pub duration: i64,
    pub sort_order: i64,
    #[serde(skip)]
    pub school_id: Option<String>,
}

impl Tenanted for CourseTask {
    fn owner_school_id(&self) -> Option<&str> {
        self.school_id.as_deref()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseResource {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum AccountStatus {
    Exempt = 1,
    Beta = 2,
    #[default]
    Trialing = 3,
    Active = 4,
    PastDue = 5,
    Canceled = 6,
    TrialExpired = 7,
}

impl AccountStatus {
    pub const ALL: [AccountStatus; 7] = [
        Self::Exempt,
        Self::Beta,
        Self::Trialing,
        Self::Active,
        Self::PastDue,
        Self::Canceled,
        Self::TrialExpired,
    ];

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Exempt => "Exempt",
            Self::Beta => "Beta",
            Self::Trialing => "Trialing",
            Self::Active => "Active",
            Self::PastDue => "Past Due",
            Self::Canceled => "Canceled",
            Self::TrialExpired => "Trial Expired",
        }
    }

    /// Case-insensitive; spaces, dashes and underscores are interchangeable.
    pub fn from_label(s: &str) -> Option<Self> {
        let norm = |v: &str| {
            v.chars()
                .filter(|c| !matches!(c, ' ' | '-' | '_'))
                .flat_map(char::to_lowercase)
                .collect::<String>()
        };
        let wanted = norm(s);
        Self::ALL.into_iter().find(|st| norm(st.label()) == wanted)
    }

    /// Statuses that still get full access to the app.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Exempt | Self::Beta | Self::Trialing | Self::Active | Self::PastDue
        )
    }
}

#[derive(Debug, Clone)]
pub struct Account {
    pub user_id: String,
    pub status: AccountStatus,
    pub created_at: NaiveDate,
}

impl Account {
    /// `None` when not trialing, or when the end date is out of range.
    pub fn trial_ends_at(&self, trial_days: i64) -> Option<NaiveDate> {
        if self.status != AccountStatus::Trialing {
            return None;
        }
        self.created_at.checked_add_signed(Duration::days(trial_days))
    }

    /// A trialing account whose trial window has fully passed.
    pub fn trial_lapsed(&self, today: NaiveDate, trial_days: i64) -> bool {
        self.trial_ends_at(trial_days)
            .map(|end| today > end)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
    }

    #[test]
    fn status_codes_are_stable() {
        assert_eq!(AccountStatus::default(), AccountStatus::Trialing);
        assert_eq!(AccountStatus::default().code(), 3);
        assert_eq!(AccountStatus::from_code(7), Some(AccountStatus::TrialExpired));
        assert_eq!(AccountStatus::from_code(0), None);
        assert_eq!(AccountStatus::from_code(8), None);
        for st in AccountStatus::ALL {
            assert_eq!(AccountStatus::from_code(st.code()), Some(st));
        }
    }

    #[test]
    fn status_order_follows_codes() {
        assert!(AccountStatus::Exempt < AccountStatus::Beta);
        assert!(AccountStatus::Canceled < AccountStatus::TrialExpired);
    }

    #[test]
    fn labels_parse_loosely() {
        assert_eq!(AccountStatus::from_label("Past Due"), Some(AccountStatus::PastDue));
        assert_eq!(AccountStatus::from_label("past_due"), Some(AccountStatus::PastDue));
        assert_eq!(
            AccountStatus::from_label("trial-expired"),
            Some(AccountStatus::TrialExpired)
        );
        assert_eq!(AccountStatus::from_label("gold"), None);
    }

    #[test]
    fn only_canceled_and_expired_lose_access() {
        let inactive: Vec<_> = AccountStatus::ALL
            .into_iter()
            .filter(|s| !s.is_active())
            .collect();
        assert_eq!(
            inactive,
            vec![AccountStatus::Canceled, AccountStatus::TrialExpired]
        );
    }

    #[test]
    fn trial_lapses_after_window() {
        let account = Account {
            user_id: "u".into(),
            status: AccountStatus::Trialing,
            created_at: d(2024, 1, 1),
        };
        assert_eq!(account.trial_ends_at(30), Some(d(2024, 1, 31)));
        assert!(!account.trial_lapsed(d(2024, 1, 31), 30));
        assert!(account.trial_lapsed(d(2024, 2, 1), 30));

        let active = Account {
            status: AccountStatus::Active,
            ..account
        };
        assert_eq!(active.trial_ends_at(30), None);
        assert!(!active.trial_lapsed(d(2030, 1, 1), 30));
    }

    #[test]
    fn trial_end_past_the_calendar_is_none() {
        let account = Account {
            user_id: "u".into(),
            status: AccountStatus::Trialing,
            created_at: NaiveDate::MAX,
        };
        assert_eq!(account.trial_ends_at(30), None);
        assert!(!account.trial_lapsed(NaiveDate::MAX, 30));
    }
}
