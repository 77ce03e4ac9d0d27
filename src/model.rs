use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::FeedError;

/// Current time truncated to milliseconds, so stored dates read like
/// `2026-01-01T12:00:00.123Z`.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default = "Uuid::new_v4")]
    id: Uuid,
    author: Author,
    date: DateTime<Utc>,
    image: Option<String>,
    body: String,
    #[serde(default)]
    likes: Likes,
    #[serde(default)]
    comments: Vec<Comment>,
}

impl Post {
    pub fn new(author: Author, body: &str, image: Option<String>, date: DateTime<Utc>) -> Post {
        Post {
            id: Uuid::new_v4(),
            author: author,
            date: date,
            image: image,
            body: body.to_string(),
            likes: Likes::default(),
            comments: vec![],
        }
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn author(&self) -> &Author {
        &self.author
    }

    pub fn date(&self) -> &DateTime<Utc> {
        &self.date
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_ref().map(|s| s.as_str())
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn likes(&self) -> &Likes {
        &self.likes
    }

    pub fn likes_mut(&mut self) -> &mut Likes {
        &mut self.likes
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn add_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Author {
    email: String,
}

impl Author {
    pub fn new(email: &str) -> Author {
        Author { email: email.to_string() }
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    #[serde(rename = "userId")]
    user_id: String,
}

impl Like {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

/// The likes on a post, in the order they were given.
///
/// A user appears at most once. The only way to change the set is `toggle`,
/// and documents holding duplicate entries keep the first one when loaded.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Likes(Vec<Like>);

impl Likes {
    /// Adds a like for `user_id`, or removes it if it was already there.
    /// Returns whether the user likes the post afterwards.
    pub fn toggle(&mut self, user_id: &str) -> bool {
        match self.0.iter().position(|like| like.user_id == user_id) {
            Some(index) => {
                self.0.remove(index);
                false
            }
            None => {
                self.0.push(Like { user_id: user_id.to_string() });
                true
            }
        }
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.0.iter().any(|like| like.user_id == user_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Like> {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for Likes {
    fn deserialize<D>(deserializer: D) -> Result<Likes, D::Error>
        where D: Deserializer<'de>
    {
        let raw = Vec::<Like>::deserialize(deserializer)?;
        let mut likes = Vec::with_capacity(raw.len());
        for like in raw {
            if !likes.iter().any(|kept: &Like| kept.user_id == like.user_id) {
                likes.push(like);
            }
        }
        Ok(Likes(likes))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default = "Uuid::new_v4")]
    id: Uuid,
    user: Commenter,
    comment: String,
    date: DateTime<Utc>,
}

impl Comment {
    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn user(&self) -> &Commenter {
        &self.user
    }

    pub fn text(&self) -> &str {
        &self.comment
    }

    pub fn date(&self) -> &DateTime<Utc> {
        &self.date
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Commenter {
    email: String,
    username: String,
}

impl Commenter {
    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// A post as submitted by a client, before the store has dated it.
#[derive(Clone, Debug, Default)]
pub struct NewPost {
    pub email: Option<String>,
    pub body: Option<String>,
    pub image: Option<String>,
}

impl NewPost {
    pub fn validate(&self) -> Result<(), FeedError> {
        match (present(&self.email), present(&self.body)) {
            (Some(_), Some(_)) => Ok(()),
            _ => Err(FeedError::Validation("All fields are required".to_string())),
        }
    }

    pub fn into_post(self, date: DateTime<Utc>) -> Result<Post, FeedError> {
        self.validate()?;
        let email = self.email.unwrap_or_default();
        let body = self.body.unwrap_or_default();
        Ok(Post::new(Author::new(&email), &body, self.image, date))
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LikeRequest {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

impl LikeRequest {
    pub fn user_id(&self) -> Result<&str, FeedError> {
        present(&self.user_id).ok_or_else(|| FeedError::Validation("User ID is required".to_string()))
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewComment {
    pub email: Option<String>,
    pub username: Option<String>,
    pub comment: Option<String>,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), FeedError> {
        match (present(&self.email), present(&self.username), present(&self.comment)) {
            (Some(_), Some(_), Some(_)) => Ok(()),
            _ => Err(FeedError::Validation("All fields are required".to_string())),
        }
    }

    pub fn into_comment(self, date: DateTime<Utc>) -> Result<Comment, FeedError> {
        self.validate()?;
        Ok(Comment {
            id: Uuid::new_v4(),
            user: Commenter {
                email: self.email.unwrap_or_default(),
                username: self.username.unwrap_or_default(),
            },
            comment: self.comment.unwrap_or_default(),
            date: date,
        })
    }
}

/// How a route addresses a post: by its position in the feed, or by id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostRef {
    Index(usize),
    Id(Uuid),
}

impl PostRef {
    pub fn parse(raw: &str) -> Option<PostRef> {
        if let Ok(index) = raw.parse::<usize>() {
            return Some(PostRef::Index(index));
        }
        Uuid::parse_str(raw).ok().map(PostRef::Id)
    }

    pub fn position(&self, posts: &[Post]) -> Option<usize> {
        match *self {
            PostRef::Index(index) if index < posts.len() => Some(index),
            PostRef::Index(_) => None,
            PostRef::Id(ref id) => posts.iter().position(|post| post.id() == id),
        }
    }
}

// Empty strings count as missing.
fn present(field: &Option<String>) -> Option<&str> {
    match *field {
        Some(ref value) if !value.is_empty() => Some(value.as_str()),
        _ => None,
    }
}
