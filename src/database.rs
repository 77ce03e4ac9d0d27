use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::FeedError;
use crate::model::{self, Comment, NewComment, NewPost, Post, PostRef};

/// The news feed, kept as one pretty-printed JSON array on disk.
///
/// Nothing is cached between calls: every operation reads the whole file,
/// and every mutation writes the whole file back. Callers share the store
/// behind a `Mutex`, so read-modify-write cycles never interleave.
#[derive(Clone, Debug)]
pub struct FeedStore {
    path: PathBuf,
}

impl FeedStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> FeedStore {
        FeedStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dates `new_post`, appends it to the feed and returns it as stored.
    pub fn append(&self, new_post: NewPost) -> Result<Post, FeedError> {
        let post = new_post.into_post(model::now())?;
        let mut posts = self.load()?;
        posts.push(post.clone());
        self.save(&posts)?;
        Ok(post)
    }

    /// All posts, oldest first.
    pub fn list(&self) -> Result<Vec<Post>, FeedError> {
        self.load()
    }

    pub fn get(&self, post: PostRef) -> Result<Post, FeedError> {
        let mut posts = self.load()?;
        let index = locate(&posts, post)?;
        Ok(posts.swap_remove(index))
    }

    /// Likes the post for `user_id`, or takes the like back if there was one.
    /// Returns the number of likes the post has afterwards.
    pub fn toggle_like(&self, post: PostRef, user_id: &str) -> Result<usize, FeedError> {
        if user_id.is_empty() {
            return Err(FeedError::Validation("User ID is required".to_string()));
        }
        let mut posts = self.load()?;
        let index = locate(&posts, post)?;
        let count = {
            let likes = posts[index].likes_mut();
            likes.toggle(user_id);
            likes.len()
        };
        self.save(&posts)?;
        Ok(count)
    }

    pub fn add_comment(&self, post: PostRef, new_comment: NewComment) -> Result<Comment, FeedError> {
        let comment = new_comment.into_comment(model::now())?;
        let mut posts = self.load()?;
        let index = locate(&posts, post)?;
        posts[index].add_comment(comment.clone());
        self.save(&posts)?;
        Ok(comment)
    }

    // A missing or blank file is an empty feed. Anything else that fails to
    // parse is left alone and reported.
    fn load(&self) -> Result<Vec<Post>, FeedError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(FeedError::storage(&self.path, e)),
        };
        if contents.trim().is_empty() {
            return Ok(vec![]);
        }
        serde_json::from_str(&contents).map_err(|e| {
            FeedError::Corrupt {
                path: self.path.clone(),
                source: e,
            }
        })
    }

    // Written next to the target and renamed over it, so a crash mid-write
    // leaves the previous document intact.
    fn save(&self, posts: &[Post]) -> Result<(), FeedError> {
        let payload = serde_json::to_string_pretty(posts)
            .map_err(|e| FeedError::storage(&self.path, io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| FeedError::storage(&self.path, e))?;

        let mut file = NamedTempFile::new_in(dir).map_err(|e| FeedError::storage(&self.path, e))?;
        // The temp file starts out private; the feed keeps whatever mode it had.
        if let Ok(existing) = fs::metadata(&self.path) {
            file.as_file()
                .set_permissions(existing.permissions())
                .map_err(|e| FeedError::storage(&self.path, e))?;
        }
        file.write_all(payload.as_bytes())
            .and_then(|_| file.as_file().sync_all())
            .map_err(|e| FeedError::storage(&self.path, e))?;
        file.persist(&self.path).map_err(|e| FeedError::storage(&self.path, e.error))?;
        Ok(())
    }
}

fn locate(posts: &[Post], post: PostRef) -> Result<usize, FeedError> {
    post.position(posts).ok_or_else(|| FeedError::NotFound("Post not found".to_string()))
}
