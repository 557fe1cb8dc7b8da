//! Goods reviews. One per author per goods.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::{Actor, Capability};
use crate::error::{CommerceError, Result};
use crate::{GoodsId, ReviewId, UserId};

/// Highest grade, 5.00, in hundredths.
pub const MAX_GRADE_HUNDREDTHS: i64 = 500;

/// Longest accepted review text.
pub const MAX_TEXT_LEN: usize = 4096;

/// A review of one goods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    /// Review ID.
    pub id: ReviewId,
    /// Reviewed goods.
    pub goods_id: GoodsId,
    /// Author.
    pub author: UserId,
    /// Review text.
    pub text: String,
    /// Grade from 0 to 500 (0.00 to 5.00).
    pub grade_hundredths: u16,
    /// When the review was written.
    pub created_at: DateTime<Utc>,
    /// When the review was last edited.
    pub updated_at: DateTime<Utc>,
}

impl Review {
    /// Write a review.
    ///
    /// # Errors
    ///
    /// `InvalidGrade` or `InvalidInput`.
    pub fn new(
        goods_id: GoodsId,
        author: UserId,
        text: String,
        grade_hundredths: i64,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            id: ReviewId::generate(),
            goods_id,
            author,
            text: check_text(text)?,
            grade_hundredths: check_grade(grade_hundredths)?,
            created_at: now,
            updated_at: now,
        })
    }

    /// Edit text and/or grade. Author only.
    ///
    /// # Errors
    ///
    /// `Forbidden` for anyone but the author, plus validation errors.
    pub fn edit(
        &mut self,
        editor: UserId,
        text: Option<String>,
        grade_hundredths: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if editor != self.author {
            return Err(CommerceError::forbidden("only the author can edit a review"));
        }
        let text = text.map(check_text).transpose()?;
        let grade = grade_hundredths.map(check_grade).transpose()?;
        if let Some(text) = text {
            self.text = text;
        }
        if let Some(grade) = grade {
            self.grade_hundredths = grade;
        }
        self.updated_at = now;
        Ok(())
    }

    /// The author or a moderator may delete.
    ///
    /// # Errors
    ///
    /// `Forbidden`.
    pub fn ensure_deletable_by(&self, actor: &Actor) -> Result<()> {
        if actor.owns_or_can(self.author, Capability::ModerateReviews) {
            Ok(())
        } else {
            Err(CommerceError::forbidden("only the author can delete a review"))
        }
    }
}

fn check_grade(grade: i64) -> Result<u16> {
    if (0..=MAX_GRADE_HUNDREDTHS).contains(&grade) {
        u16::try_from(grade).map_err(|_| CommerceError::InvalidGrade(grade))
    } else {
        Err(CommerceError::InvalidGrade(grade))
    }
}

fn check_text(text: String) -> Result<String> {
    if text.trim().is_empty() || text.len() > MAX_TEXT_LEN {
        return Err(CommerceError::InvalidInput(format!(
            "review text must be 1 to {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Role;

    #[test]
    fn grade_range() {
        let now = Utc::now();
        let goods = GoodsId::generate();
        let author = UserId::generate();
        assert!(Review::new(goods, author, "ok".into(), 0, now).is_ok());
        assert!(Review::new(goods, author, "great".into(), 500, now).is_ok());
        assert_eq!(
            Review::new(goods, author, "??".into(), 501, now),
            Err(CommerceError::InvalidGrade(501))
        );
        assert_eq!(
            Review::new(goods, author, "??".into(), -1, now),
            Err(CommerceError::InvalidGrade(-1))
        );
    }

    #[test]
    fn only_author_edits() {
        let now = Utc::now();
        let author = UserId::generate();
        let mut review = Review::new(GoodsId::generate(), author, "fine".into(), 350, now).unwrap();

        assert!(review
            .edit(UserId::generate(), Some("hacked".into()), None, now)
            .is_err());
        review.edit(author, None, Some(420), now).unwrap();
        assert_eq!(review.grade_hundredths, 420);
        assert_eq!(review.text, "fine");
    }

    #[test]
    fn moderator_can_delete() {
        let review =
            Review::new(GoodsId::generate(), UserId::generate(), "spam".into(), 0, Utc::now()).unwrap();
        let moderator = Actor {
            user_id: UserId::generate(),
            roles: vec![Role::Moderator],
        };
        assert!(review.ensure_deletable_by(&moderator).is_ok());
        assert!(review
            .ensure_deletable_by(&Actor::customer(UserId::generate()))
            .is_err());
    }
}
