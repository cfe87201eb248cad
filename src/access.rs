//! Visibility and ownership rules shared by every post and comment handler.
//!
//! Listing queries express the same visibility rule in SQL
//! (see `db::PostFilter::visible_at`); the functions here decide for a single,
//! already loaded record.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{ErrorMessage, HttpError};

/// The three inputs that decide whether a post is public
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PublishState {
    pub is_published: bool,
    /// `None` when the post has no category
    pub category_is_published: Option<bool>,
    pub pub_date: DateTime<Utc>,
}

impl PublishState {
    /// A post without a category is not public.
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.is_published && self.category_is_published == Some(true) && self.pub_date <= now
    }
}

/// Anything owned by exactly one user
pub trait Authored {
    fn author_id(&self) -> Uuid;
}

pub fn is_author(viewer: Option<Uuid>, item: &impl Authored) -> bool {
    viewer == Some(item.author_id())
}

/// Authors always see their own posts; everybody else only public ones.
pub fn can_view(
    viewer: Option<Uuid>,
    author_id: Uuid,
    state: &PublishState,
    now: DateTime<Utc>,
) -> bool {
    viewer == Some(author_id) || state.is_visible_at(now)
}

/// 403 unless `user_id` wrote `item`
pub fn ensure_author(user_id: Uuid, item: &impl Authored) -> Result<(), HttpError> {
    if item.author_id() != user_id {
        return Err(HttpError::forbidden(
            ErrorMessage::PermissionDenied.to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtos::CommentDto;
    use axum::http::StatusCode;
    use chrono::Duration;

    fn state(
        is_published: bool,
        category: Option<bool>,
        offset: Duration,
    ) -> (PublishState, DateTime<Utc>) {
        let now = Utc::now();
        (
            PublishState {
                is_published,
                category_is_published: category,
                pub_date: now + offset,
            },
            now,
        )
    }

    fn comment(author_id: Uuid) -> CommentDto {
        CommentDto {
            id: 1,
            text: "hi".to_string(),
            post_id: 42,
            author_id,
            author_username: "leo".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn published_post_in_published_category_is_visible() {
        let (s, now) = state(true, Some(true), Duration::hours(-1));
        assert!(s.is_visible_at(now));

        // pub_date == now counts as published
        let (s, now) = state(true, Some(true), Duration::zero());
        assert!(s.is_visible_at(now));
    }

    #[test]
    fn any_failing_condition_hides_the_post() {
        let (s, now) = state(false, Some(true), Duration::hours(-1));
        assert!(!s.is_visible_at(now));

        let (s, now) = state(true, Some(false), Duration::hours(-1));
        assert!(!s.is_visible_at(now));

        let (s, now) = state(true, Some(true), Duration::hours(1));
        assert!(!s.is_visible_at(now));

        let (s, now) = state(true, None, Duration::hours(-1));
        assert!(!s.is_visible_at(now));
    }

    #[test]
    fn author_sees_scheduled_post_others_do_not() {
        let author = Uuid::new_v4();
        let other = Uuid::new_v4();
        let (s, now) = state(true, Some(true), Duration::hours(1));

        assert!(can_view(Some(author), author, &s, now));
        assert!(!can_view(Some(other), author, &s, now));
        assert!(!can_view(None, author, &s, now));
    }

    #[test]
    fn only_the_author_passes_ensure_author() {
        let author = Uuid::new_v4();
        let c = comment(author);

        assert!(ensure_author(author, &c).is_ok());
        assert!(is_author(Some(author), &c));
        assert!(!is_author(None, &c));

        let err = ensure_author(Uuid::new_v4(), &c).unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }
}
