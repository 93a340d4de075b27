use chrono::{Days, Months, NaiveDate};

/// Date window fed to candle requests for gap analysis: one year back, the
/// analysis date itself, and the following day. Pure function of the input
/// so callers control what "today" means.
pub fn analysis_date_range(today: NaiveDate) -> (NaiveDate, NaiveDate, NaiveDate) {
    let year_ago = today.checked_sub_months(Months::new(12)).unwrap_or(today);
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);

    (year_ago, today, tomorrow)
}
