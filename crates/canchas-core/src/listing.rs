//! # Booking Listing Views
//!
//! Filter and sort derived from an already-fetched booking list. Nothing here
//! talks to the backend; "Mis reservas" re-derives the view on every change.
//!
//! ```rust
//! use canchas_core::listing::{BookingQuery, SortDirection, SortKey};
//! use canchas_core::BookingStatus;
//!
//! let query = BookingQuery {
//!     status: Some(BookingStatus::Confirmed),
//!     sort: SortKey::Price,
//!     direction: SortDirection::Desc,
//!     ..Default::default()
//! };
//! assert!(query.apply(&[]).is_empty());
//! ```

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{Booking, BookingStatus, PaymentStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Date, then start time.
    #[default]
    Date,
    Price,
    FacilityName,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Upcoming = still actionable, history = terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum BookingTab {
    Upcoming,
    History,
}

/// Client-side filter and sort over a booking list. Every filter is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingQuery {
    pub tab: Option<BookingTab>,
    pub status: Option<BookingStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub sport: Option<String>,
    /// Inclusive.
    #[ts(as = "Option<String>")]
    pub from: Option<NaiveDate>,
    /// Inclusive.
    #[ts(as = "Option<String>")]
    pub to: Option<NaiveDate>,
    /// Case-insensitive substring match on the facility name.
    pub facility_text: Option<String>,
    pub sort: SortKey,
    pub direction: SortDirection,
}

impl BookingQuery {
    pub fn matches(&self, booking: &Booking) -> bool {
        if let Some(tab) = self.tab {
            let wanted_terminal = tab == BookingTab::History;
            if booking.status.is_terminal() != wanted_terminal {
                return false;
            }
        }
        if self.status.is_some_and(|s| s != booking.status) {
            return false;
        }
        if self.payment_status.is_some_and(|p| p != booking.payment_status) {
            return false;
        }
        if let Some(sport) = &self.sport {
            if !booking.sport.eq_ignore_ascii_case(sport) {
                return false;
            }
        }
        if self.from.is_some_and(|from| booking.date < from) {
            return false;
        }
        if self.to.is_some_and(|to| booking.date > to) {
            return false;
        }
        if let Some(text) = self.facility_text.as_deref().map(str::trim) {
            if !text.is_empty()
                && !booking
                    .facility_name
                    .to_lowercase()
                    .contains(&text.to_lowercase())
            {
                return false;
            }
        }
        true
    }

    /// Returns the matching bookings in the requested order. The sort is
    /// stable, so equal keys keep their fetch order.
    pub fn apply(&self, bookings: &[Booking]) -> Vec<Booking> {
        let mut out: Vec<Booking> = bookings
            .iter()
            .filter(|b| self.matches(b))
            .cloned()
            .collect();

        let desc = self.direction == SortDirection::Desc;
        let directed = |ord: Ordering| if desc { ord.reverse() } else { ord };
        match self.sort {
            SortKey::Date => out.sort_by(|a, b| {
                directed((a.date, a.start_time).cmp(&(b.date, b.start_time)))
            }),
            SortKey::Price => out.sort_by(|a, b| directed(a.price_cents.cmp(&b.price_cents))),
            SortKey::FacilityName => out.sort_by(|a, b| {
                directed(
                    a.facility_name
                        .to_lowercase()
                        .cmp(&b.facility_name.to_lowercase()),
                )
            }),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};

    fn booking(id: &str, facility: &str, day: u32, price: i64, status: BookingStatus) -> Booking {
        let now = Utc::now();
        Booking {
            id: id.into(),
            court_id: "c".into(),
            establishment_id: "e".into(),
            facility_name: facility.into(),
            sport: if price > 2_000_000 { "padel".into() } else { "futbol5".into() },
            user_id: "u".into(),
            date: NaiveDate::from_ymd_opt(2026, 6, day).unwrap(),
            start_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            duration_minutes: 60,
            price_cents: price,
            status,
            payment_status: PaymentStatus::Pending,
            participants: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn sample() -> Vec<Booking> {
        vec![
            booking("a", "Zona Padel", 10, 2_500_000, BookingStatus::Confirmed),
            booking("b", "abasto fútbol", 3, 1_800_000, BookingStatus::Completed),
            booking("c", "La Cancha", 7, 1_200_000, BookingStatus::Pending),
        ]
    }

    fn ids(list: &[Booking]) -> Vec<&str> {
        list.iter().map(|b| b.id.as_str()).collect()
    }

    #[test]
    fn test_default_sorts_by_date_ascending() {
        let out = BookingQuery::default().apply(&sample());
        assert_eq!(ids(&out), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_sort_by_price_desc_and_facility() {
        let q = BookingQuery {
            sort: SortKey::Price,
            direction: SortDirection::Desc,
            ..Default::default()
        };
        assert_eq!(ids(&q.apply(&sample())), vec!["a", "b", "c"]);

        let q = BookingQuery {
            sort: SortKey::FacilityName,
            ..Default::default()
        };
        assert_eq!(ids(&q.apply(&sample())), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_desc_keeps_ties_in_fetch_order() {
        let list = vec![
            booking("first", "Norte", 5, 1_500_000, BookingStatus::Pending),
            booking("cheap", "Norte", 6, 1_000_000, BookingStatus::Pending),
            booking("second", "Norte", 7, 1_500_000, BookingStatus::Pending),
        ];
        let q = BookingQuery {
            sort: SortKey::Price,
            direction: SortDirection::Desc,
            ..Default::default()
        };
        assert_eq!(ids(&q.apply(&list)), vec!["first", "second", "cheap"]);

        let q = BookingQuery {
            sort: SortKey::FacilityName,
            direction: SortDirection::Desc,
            ..Default::default()
        };
        assert_eq!(ids(&q.apply(&list)), vec!["first", "cheap", "second"]);
    }

    #[test]
    fn test_filters() {
        let q = BookingQuery {
            tab: Some(BookingTab::Upcoming),
            ..Default::default()
        };
        assert_eq!(ids(&q.apply(&sample())), vec!["c", "a"]);

        let q = BookingQuery {
            sport: Some("PADEL".into()),
            ..Default::default()
        };
        assert_eq!(ids(&q.apply(&sample())), vec!["a"]);

        let q = BookingQuery {
            from: NaiveDate::from_ymd_opt(2026, 6, 4),
            to: NaiveDate::from_ymd_opt(2026, 6, 7),
            ..Default::default()
        };
        assert_eq!(ids(&q.apply(&sample())), vec!["c"]);

        let q = BookingQuery {
            facility_text: Some("cancha".into()),
            ..Default::default()
        };
        assert_eq!(ids(&q.apply(&sample())), vec!["c"]);
    }

    #[test]
    fn test_query_deserializes_partial_json() {
        let q: BookingQuery = serde_json::from_str(r#"{"status":"pending","sort":"price"}"#).unwrap();
        assert_eq!(q.status, Some(BookingStatus::Pending));
        assert_eq!(q.sort, SortKey::Price);
        assert_eq!(q.direction, SortDirection::Asc);
    }
}
