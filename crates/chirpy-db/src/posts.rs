use chirpy_types::api::SortOrder;
use chirpy_types::error::{Error, Result};
use chirpy_types::filter::mask_profanity;
use chirpy_types::models::{PostId, UserId};
use tracing::info;

use crate::Database;
use crate::models::PostRecord;

/// Longest accepted body, counted in characters after filtering.
pub const MAX_POST_LENGTH: usize = 140;

impl Database {
    // -- Posts --

    /// Filter and store a new post for an existing author.
    pub fn create_post(&self, author_id: UserId, raw_body: &str) -> Result<PostRecord> {
        let body = mask_profanity(raw_body);
        validate_body(&body)?;

        self.transaction(|doc| {
            if !doc.users.contains_key(&author_id) {
                return Err(Error::not_found("user", author_id));
            }

            let id = doc.next_post_id();
            let post = PostRecord {
                id,
                author_id,
                body,
            };
            doc.posts.insert(id, post.clone());
            Ok(post)
        })
    }

    pub fn get_post(&self, id: PostId) -> Result<PostRecord> {
        self.load()?
            .posts
            .remove(&id)
            .ok_or_else(|| Error::not_found("post", id))
    }

    /// All posts, optionally for one author, ordered by ID.
    pub fn list_posts(&self, author_id: Option<UserId>, order: SortOrder) -> Result<Vec<PostRecord>> {
        let mut posts: Vec<PostRecord> = self
            .load()?
            .posts
            .into_values()
            .filter(|p| author_id.is_none_or(|a| p.author_id == a))
            .collect();

        if order == SortOrder::Desc {
            posts.reverse();
        }
        Ok(posts)
    }

    /// Remove a post on behalf of `requester`. Existence and authorship are
    /// checked inside the same transaction as the removal.
    pub fn delete_post(&self, id: PostId, requester: UserId) -> Result<()> {
        self.transaction(|doc| {
            let post = doc.posts.get(&id).ok_or_else(|| Error::not_found("post", id))?;
            if post.author_id != requester {
                return Err(Error::forbidden("only the author can delete a chirp"));
            }
            doc.posts.remove(&id);
            Ok(())
        })?;

        info!("User {} deleted post {}", requester, id);
        Ok(())
    }
}

fn validate_body(body: &str) -> Result<()> {
    if body.trim().is_empty() {
        return Err(Error::validation("chirp body must not be empty"));
    }
    if body.chars().count() > MAX_POST_LENGTH {
        return Err(Error::validation("chirp is too long"));
    }
    Ok(())
}
