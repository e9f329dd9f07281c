use std::collections::HashMap;

use serde::Serialize;

use crate::model::{Post, User, UserId, ViewerRecord};
use crate::time::Timestamp;

/// Maximum number of viewers returned by a listing.
pub const LISTING_LIMIT: usize = 100;

const MASK: &str = "***";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewerKind {
    User,
    Anon,
    Ip,
    Unknown,
}

impl ViewerKind {
    fn of(record: &ViewerRecord) -> Self {
        if record.user.is_some() {
            ViewerKind::User
        } else if record.anon_token.is_some() {
            ViewerKind::Anon
        } else if record.ip.is_some() {
            ViewerKind::Ip
        } else {
            ViewerKind::Unknown
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaskedUser {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaskedViewer {
    #[serde(rename = "type")]
    pub kind: ViewerKind,
    pub user: Option<MaskedUser>,
    pub anon_token: Option<String>,
    pub ip: Option<String>,
    pub last_seen: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewerListing {
    pub view_count: u64,
    pub viewers: Vec<MaskedViewer>,
    pub total_viewers: usize,
}

/// The most recent viewer records of a post, most recent first, capped at [LISTING_LIMIT].
pub fn recent_viewers(post: &Post) -> impl Iterator<Item = &ViewerRecord> {
    post.viewed_by.iter().rev().take(LISTING_LIMIT)
}

/// Builds the administrator listing of a post's recent viewers with every identifying field masked.
///
/// `users` holds the accounts referenced by the listed records. Accounts missing from it are
/// listed by their masked id alone.
pub fn viewer_listing(post: &Post, users: &HashMap<UserId, User>) -> ViewerListing {
    let viewers = recent_viewers(post)
        .map(|record| MaskedViewer {
            kind: ViewerKind::of(record),
            user: record.user.as_ref().map(|id| mask_user(id, users.get(id))),
            anon_token: record.anon_token.as_deref().map(mask_token),
            ip: record.ip.as_deref().map(mask_ip),
            last_seen: record.last_seen,
        })
        .collect();

    ViewerListing {
        view_count: post.view_count,
        viewers,
        total_viewers: post.viewed_by.len(),
    }
}

pub fn mask_ip(ip: &str) -> String {
    let octets: Vec<&str> = ip.split('.').collect();

    match octets.as_slice() {
        [first, second, _, _] => format!("{first}.{second}.{MASK}.{MASK}"),
        _ => format!("{}...", prefix(ip, 6)),
    }
}

pub fn mask_token(token: &str) -> String {
    let length = token.chars().count();
    if length <= 8 {
        return MASK.to_string();
    }

    let tail: String = token.chars().skip(length - 2).collect();
    format!("{}...{tail}", prefix(token, 6))
}

fn mask_user(id: &UserId, account: Option<&User>) -> MaskedUser {
    MaskedUser {
        id: mask_user_id(id),
        name: account.and_then(|user| mask_name(&user.name)),
        email: account.and_then(|user| mask_email(&user.email)),
    }
}

fn mask_user_id(id: &UserId) -> String {
    let id = id.as_str();
    let length = id.chars().count();
    let tail: String = id.chars().skip(length.saturating_sub(6)).collect();

    format!("{tail:*>6}")
}

fn mask_name(name: &str) -> Option<String> {
    let initial = name.chars().next()?;
    Some(format!("{initial}{MASK}"))
}

fn mask_email(email: &str) -> Option<String> {
    if email.is_empty() {
        return None;
    }

    let masked = email
        .rsplit_once('@')
        .and_then(|(local, domain)| {
            let initial = local.chars().next()?;
            (!domain.is_empty()).then(|| format!("{initial}{MASK}@{domain}"))
        })
        .unwrap_or_else(|| MASK.to_string());

    Some(masked)
}

fn prefix(text: &str, length: usize) -> String {
    text.chars().take(length).collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::database::Record;
    use crate::model::{Role, Status};
    use crate::tracker::{Retention, Visitor};

    #[test]
    fn masks_addresses() {
        assert_eq!(mask_ip("192.168.10.20"), "192.168.***.***");
        assert_eq!(mask_ip("2001:0db8:85a3::8a2e:0370:7334"), "2001:0...");
        assert_eq!(mask_ip("10.0.1"), "10.0.1...");
    }

    #[test]
    fn masks_tokens() {
        assert_eq!(mask_token("abc"), "***");
        assert_eq!(mask_token("12345678"), "***");
        assert_eq!(mask_token("abcdefghijkl"), "abcdef...kl");
    }

    #[test]
    fn masks_accounts() {
        assert_eq!(mask_user_id(&UserId::from("507f1f77bcf86cd799439011")), "439011");
        assert_eq!(mask_user_id(&UserId::from("abc")), "***abc");
        assert_eq!(mask_name("Margaret"), Some("M***".to_string()));
        assert_eq!(mask_name(""), None);
        assert_eq!(mask_email("margaret@example.com"), Some("m***@example.com".to_string()));
        assert_eq!(mask_email("m@example.com"), Some("m***@example.com".to_string()));
        assert_eq!(mask_email("not-an-email"), Some("***".to_string()));
        assert_eq!(mask_email("@example.com"), Some("***".to_string()));
    }

    #[test]
    fn listing_is_capped_and_most_recent_first() {
        let mut post = Post::new(UserId::from("author"), "Popular", Status::Published, Utc::now());
        for n in 0..150 {
            post.add_view(&Visitor::address(format!("10.0.{}.{}", n / 256, n % 256)), Utc::now(), Retention::default());
        }

        let listing = viewer_listing(&post, &HashMap::new());

        assert_eq!(listing.view_count, 150);
        assert_eq!(listing.total_viewers, 150);
        assert_eq!(listing.viewers.len(), LISTING_LIMIT);
        assert!(listing.viewers.iter().all(|viewer| viewer.kind == ViewerKind::Ip));
        assert!(listing.viewers.iter().all(|viewer| viewer.ip.as_deref() == Some("10.0.***.***")));

        let newest = &post.viewed_by[149];
        assert_eq!(listing.viewers[0].last_seen, newest.last_seen);
    }

    #[test]
    fn listing_classifies_and_resolves_users() {
        let mut post = Post::new(UserId::from("author"), "Mixed", Status::Published, Utc::now());
        let retention = Retention::default();

        post.add_view(&Visitor::default(), Utc::now(), retention);
        post.add_view(&Visitor::address("172.16.0.9"), Utc::now(), retention);
        post.add_view(&Visitor::anonymous("anonymous-browser"), Utc::now(), retention);
        post.add_view(&Visitor::new(Some("reader-42".into()), None, Some("172.16.0.10".into())), Utc::now(), retention);

        let reader = User {
            id: Record::new("reader-42"),
            name: "Ada".to_string(),
            email: "ada@example.org".to_string(),
            role: Role::User,
        };
        let users = HashMap::from([(reader.user_id(), reader)]);

        let listing = viewer_listing(&post, &users);
        let kinds: Vec<_> = listing.viewers.iter().map(|viewer| viewer.kind).collect();
        assert_eq!(kinds, vec![ViewerKind::User, ViewerKind::Anon, ViewerKind::Ip, ViewerKind::Unknown]);

        let user = listing.viewers[0].user.as_ref().unwrap();
        assert_eq!(user.id, "der-42");
        assert_eq!(user.name.as_deref(), Some("A***"));
        assert_eq!(user.email.as_deref(), Some("a***@example.org"));
        assert_eq!(listing.viewers[0].ip.as_deref(), Some("172.16.***.***"));
        assert_eq!(listing.viewers[1].anon_token.as_deref(), Some("anonym...er"));
    }

    #[test]
    fn listing_never_leaks_raw_values() {
        let mut post = Post::new(UserId::from("author"), "Private", Status::Published, Utc::now());
        let visitor = Visitor::new(None, Some("secret-token-value".into()), Some("203.0.113.77".into()));
        post.add_view(&visitor, Utc::now(), Retention::default());

        let rendered = serde_json::to_string(&viewer_listing(&post, &HashMap::new())).unwrap();

        assert!(!rendered.contains("secret-token-value"));
        assert!(!rendered.contains("113.77"));
    }
}
