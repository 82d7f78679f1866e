use time::{Date, Month};

use crate::contacts::repo::Contact;

/// Contacts whose next birthday is at most this many days away are reported.
pub const UPCOMING_WINDOW_DAYS: i64 = 7;

// Feb 29 rolls to Mar 1 in non-leap years.
fn occurrence_in(year: i32, birthday: Date) -> Option<Date> {
    Date::from_calendar_date(year, birthday.month(), birthday.day())
        .or_else(|_| Date::from_calendar_date(year, Month::March, 1))
        .ok()
}

/// Days from `today` to the next occurrence of the birthday's month/day,
/// wrapping into next year once this year's date has passed. Today's own
/// birthday counts as 0.
pub fn days_until_birthday(today: Date, birthday: Date) -> Option<i64> {
    let this_year = occurrence_in(today.year(), birthday)?;
    let next = if this_year < today {
        occurrence_in(today.year() + 1, birthday)?
    } else {
        this_year
    };
    Some((next - today).whole_days())
}

/// Filters an owner's full contact list down to birthdays within the window.
/// The wrap-then-filter rule is kept as-is; no date range is pushed to SQL.
pub fn upcoming(today: Date, contacts: Vec<Contact>) -> Vec<Contact> {
    contacts
        .into_iter()
        .filter(|c| {
            days_until_birthday(today, c.birthday)
                .map(|days| days <= UPCOMING_WINDOW_DAYS)
                .unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;
    use time::OffsetDateTime;

    fn contact(id: i64, birthday: Date) -> Contact {
        Contact {
            id,
            first_name: "Test".into(),
            last_name: "Contact".into(),
            email: format!("c{}@example.com", id),
            phone_number: "555-0100".into(),
            birthday,
            note: None,
            user_id: Some(1),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn three_days_out_is_included() {
        let today = date!(2024 - 06 - 16);
        assert_eq!(days_until_birthday(today, date!(1990 - 06 - 19)), Some(3));
        let kept = upcoming(today, vec![contact(1, date!(1990 - 06 - 19))]);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn ten_days_out_is_excluded() {
        let today = date!(2024 - 06 - 16);
        assert_eq!(days_until_birthday(today, date!(1990 - 06 - 26)), Some(10));
        let kept = upcoming(today, vec![contact(1, date!(1990 - 06 - 26))]);
        assert!(kept.is_empty());
    }

    #[test]
    fn year_boundary_wraps_forward() {
        let today = date!(2024 - 12 - 28);
        assert_eq!(days_until_birthday(today, date!(1988 - 01 - 02)), Some(5));
        let kept = upcoming(today, vec![contact(1, date!(1988 - 01 - 02))]);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn birthday_today_counts_as_zero_and_is_included() {
        let today = date!(2024 - 06 - 16);
        assert_eq!(days_until_birthday(today, date!(2000 - 06 - 16)), Some(0));
        let kept = upcoming(today, vec![contact(1, date!(2000 - 06 - 16))]);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn birthday_yesterday_wraps_to_next_year() {
        let today = date!(2024 - 06 - 16);
        // 2025 is not a leap year: 2024-06-15 → next 2025-06-15
        assert_eq!(days_until_birthday(today, date!(1990 - 06 - 15)), Some(364));
    }

    #[test]
    fn feb_29_resolves_to_mar_1_in_non_leap_years() {
        let today = date!(2025 - 02 - 26);
        assert_eq!(days_until_birthday(today, date!(1996 - 02 - 29)), Some(3));
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let today = date!(2024 - 06 - 16);
        let kept = upcoming(
            today,
            vec![
                contact(1, date!(1990 - 06 - 23)), // exactly 7 days
                contact(2, date!(1990 - 06 - 24)), // 8 days
            ],
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 1);
    }
}
