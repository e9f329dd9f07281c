use derive_new::new;
use serde::{Deserialize, Serialize};
use snafu::{ensure, Snafu};

use crate::model::{DailyViews, Post, UserId, ViewerRecord};
use crate::time::{day_of, Timestamp};

/// The identity signals carried by a single view event. Any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Visitor {
    pub user: Option<UserId>,
    pub anon_token: Option<String>,
    pub ip: Option<String>,
}

impl Visitor {
    /// Builds a visitor, treating blank signals as absent.
    pub fn new(user: Option<UserId>, anon_token: Option<String>, ip: Option<String>) -> Self {
        Visitor {
            user: user.filter(|user| !user.as_str().trim().is_empty()),
            anon_token: non_blank(anon_token),
            ip: non_blank(ip),
        }
    }

    pub fn user(user: impl Into<UserId>) -> Self {
        Self::new(Some(user.into()), None, None)
    }

    pub fn anonymous(token: impl Into<String>) -> Self {
        Self::new(None, Some(token.into()), None)
    }

    pub fn address(ip: impl Into<String>) -> Self {
        Self::new(None, None, Some(ip.into()))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct ViewOutcome {
    pub view_count: u64,
    pub counted: bool,
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum RetentionError {
    #[snafu(display("viewer retention must keep at least one record"))]
    NothingRetained,

    #[snafu(display("cannot retain {retain} viewers when at most {capacity} are allowed"))]
    RetainExceedsCapacity { capacity: usize, retain: usize },
}

/// Bound on the number of viewer records kept per post.
///
/// Once a post holds more than `capacity` records, only the `retain` most recent ones survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retention {
    capacity: usize,
    retain: usize,
}

impl Retention {
    pub fn new(capacity: usize, retain: usize) -> Result<Self, RetentionError> {
        ensure!(retain > 0, NothingRetainedSnafu);
        ensure!(retain <= capacity, RetainExceedsCapacitySnafu { capacity, retain });

        Ok(Retention { capacity, retain })
    }

    pub fn capacity(self) -> usize {
        self.capacity
    }

    pub fn retain(self) -> usize {
        self.retain
    }

    /// Drops the oldest records once the capacity is exceeded and returns how many were dropped.
    pub fn compact(self, viewers: &mut Vec<ViewerRecord>) -> usize {
        if viewers.len() <= self.capacity {
            return 0;
        }

        let excess = viewers.len() - self.retain;
        viewers.drain(..excess);
        excess
    }
}

impl Default for Retention {
    fn default() -> Self {
        Retention {
            capacity: 2000,
            retain: 1000,
        }
    }
}

impl Post {
    /// Records a view, counting it only when no retained record matches the visitor.
    pub fn add_view(&mut self, visitor: &Visitor, now: Timestamp, retention: Retention) -> ViewOutcome {
        if let Some(index) = self.find_viewer(visitor) {
            let record = &mut self.viewed_by[index];
            record.last_seen = now;

            if record.user.is_none() {
                record.user = visitor.user.clone();
            }

            return ViewOutcome::new(self.view_count, false);
        }

        self.viewed_by.push(ViewerRecord {
            user: visitor.user.clone(),
            anon_token: visitor.anon_token.clone(),
            ip: visitor.ip.clone(),
            last_seen: now,
        });
        self.view_count += 1;
        self.count_daily_view(now);

        let dropped = retention.compact(&mut self.viewed_by);
        if dropped > 0 {
            tracing::debug!(post.id = %self.id, dropped, "compacted viewer records");
        }

        ViewOutcome::new(self.view_count, true)
    }

    /// Resolves the visitor against the retained records.
    ///
    /// A user id takes precedence, then the anonymous token. The address is only consulted
    /// when the visitor carries neither.
    fn find_viewer(&self, visitor: &Visitor) -> Option<usize> {
        let records = &self.viewed_by;

        if let Some(user) = &visitor.user {
            if let Some(index) = records.iter().position(|record| record.user.as_ref() == Some(user)) {
                return Some(index);
            }
        }

        if let Some(token) = &visitor.anon_token {
            if let Some(index) = records.iter().position(|record| record.anon_token.as_ref() == Some(token)) {
                return Some(index);
            }
        }

        match visitor {
            Visitor {
                user: None,
                anon_token: None,
                ip: Some(ip),
            } => records.iter().position(|record| record.ip.as_ref() == Some(ip)),
            _ => None,
        }
    }

    fn count_daily_view(&mut self, now: Timestamp) {
        let today = day_of(now);

        match self.daily_views.iter_mut().find(|day| day.date == today) {
            Some(day) => day.count += 1,
            None => self.daily_views.push(DailyViews { date: today, count: 1 }),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::model::Status;

    fn post() -> Post {
        Post::new(UserId::from("author"), "A post", Status::Published, Utc::now())
    }

    fn view(post: &mut Post, visitor: Visitor) -> ViewOutcome {
        post.add_view(&visitor, Utc::now(), Retention::default())
    }

    #[test]
    fn only_first_view_of_an_identity_counts() {
        let mut post = post();

        assert_eq!(view(&mut post, Visitor::anonymous("abc")), ViewOutcome::new(1, true));
        assert_eq!(view(&mut post, Visitor::anonymous("abc")), ViewOutcome::new(1, false));
        assert_eq!(view(&mut post, Visitor::user("u1")), ViewOutcome::new(2, true));
        assert_eq!(view(&mut post, Visitor::user("u1")), ViewOutcome::new(2, false));
        assert_eq!(view(&mut post, Visitor::address("10.0.0.1")), ViewOutcome::new(3, true));
        assert_eq!(view(&mut post, Visitor::address("10.0.0.1")), ViewOutcome::new(3, false));

        assert_eq!(post.viewed_by.len(), 3);
    }

    #[test]
    fn distinct_identities_are_all_counted() {
        let mut post = post();

        for n in 0..50 {
            view(&mut post, Visitor::anonymous(format!("token-{n}")));
        }

        assert_eq!(post.view_count, 50);
        assert_eq!(post.viewed_by.len(), 50);
    }

    #[test]
    fn anonymous_visitor_is_upgraded_after_login() {
        let mut post = post();
        view(&mut post, Visitor::anonymous("browser-token"));

        let login = Visitor::new(Some("u1".into()), Some("browser-token".into()), None);
        assert_eq!(view(&mut post, login), ViewOutcome::new(1, false));

        assert_eq!(post.viewed_by.len(), 1);
        assert_eq!(post.viewed_by[0].user, Some(UserId::from("u1")));

        assert_eq!(view(&mut post, Visitor::user("u1")), ViewOutcome::new(1, false), "user id now resolves to the upgraded record");
    }

    #[test]
    fn existing_owner_is_never_overwritten() {
        let mut post = post();
        view(&mut post, Visitor::new(Some("u1".into()), Some("shared".into()), None));

        let other = Visitor::new(Some("u2".into()), Some("shared".into()), None);
        assert_eq!(view(&mut post, other), ViewOutcome::new(1, false));
        assert_eq!(post.viewed_by[0].user, Some(UserId::from("u1")));
    }

    #[test]
    fn address_is_ignored_when_a_stronger_signal_exists() {
        let mut post = post();
        view(&mut post, Visitor::address("10.0.0.1"));

        let visitor = Visitor::new(None, Some("token".into()), Some("10.0.0.1".into()));
        assert_eq!(view(&mut post, visitor), ViewOutcome::new(2, true));
    }

    #[test]
    fn visitor_without_any_signal_always_counts() {
        let mut post = post();

        assert_eq!(view(&mut post, Visitor::default()), ViewOutcome::new(1, true));
        assert_eq!(view(&mut post, Visitor::new(None, Some("  ".into()), Some(String::new()))), ViewOutcome::new(2, true));
    }

    #[test]
    fn match_refreshes_last_seen() {
        let mut post = post();
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let later = first + Duration::hours(3);

        post.add_view(&Visitor::anonymous("abc"), first, Retention::default());
        post.add_view(&Visitor::anonymous("abc"), later, Retention::default());

        assert_eq!(post.viewed_by[0].last_seen, later);
    }

    #[test]
    fn views_are_aggregated_per_day() {
        let mut post = post();
        let monday = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let tuesday = monday + Duration::days(1);

        post.add_view(&Visitor::anonymous("a"), monday, Retention::default());
        post.add_view(&Visitor::anonymous("b"), monday, Retention::default());
        post.add_view(&Visitor::anonymous("a"), tuesday, Retention::default());
        post.add_view(&Visitor::anonymous("c"), tuesday, Retention::default());

        let days: Vec<_> = post.daily_views.iter().map(|day| (day.date.to_string(), day.count)).collect();
        assert_eq!(days, vec![("2024-01-01".to_string(), 2), ("2024-01-02".to_string(), 1)]);
    }

    #[test]
    fn viewer_log_is_compacted_past_capacity() {
        let mut post = post();

        for n in 0..2000 {
            view(&mut post, Visitor::anonymous(format!("token-{n}")));
        }
        assert_eq!(post.viewed_by.len(), 2000, "capacity itself is allowed");

        view(&mut post, Visitor::anonymous("token-2000"));

        assert_eq!(post.viewed_by.len(), 1000);
        assert_eq!(post.view_count, 2001, "compaction never lowers the view count");

        let tokens: Vec<_> = post.viewed_by.iter().filter_map(|record| record.anon_token.clone()).collect();
        let expected: Vec<_> = (1001..=2000).map(|n| format!("token-{n}")).collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn compacted_visitor_counts_again() {
        let mut post = post();
        let retention = Retention::new(4, 2).unwrap();

        for token in ["a", "b", "c", "d", "e"] {
            post.add_view(&Visitor::anonymous(token), Utc::now(), retention);
        }

        assert_eq!(post.viewed_by.len(), 2);
        assert!(post.add_view(&Visitor::anonymous("a"), Utc::now(), retention).counted);
    }

    #[test]
    fn retention_bounds_are_validated() {
        assert_eq!(Retention::new(10, 0), Err(RetentionError::NothingRetained));
        assert_eq!(
            Retention::new(10, 11),
            Err(RetentionError::RetainExceedsCapacity { capacity: 10, retain: 11 })
        );
        assert!(Retention::new(10, 10).is_ok());
    }
}
