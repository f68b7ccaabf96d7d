//! Pure business rules shared by the request handlers. Nothing in here
//! touches storage; handlers load records, then ask these functions.

pub mod error;
pub mod ownership;
pub mod period;
pub mod schedule;
pub mod selection;
pub mod weekday;

pub use error::{RecordKind, RuleError};
pub use ownership::{check_reference, visible_to, Tenant, Tenanted};
pub use period::{resolve_current, Period};
pub use schedule::{check_course_days, validate_course_schedule};
pub use selection::validate_selection;
pub use weekday::WeekdaySet;
