use crate::model::{Post, UserId};

impl Post {
    /// Likes the post for `user`, or takes the like back if it was already there.
    ///
    /// Returns the number of likes afterwards.
    pub fn toggle_like(&mut self, user: &UserId) -> usize {
        match self.likes.iter().position(|like| like == user) {
            Some(index) => {
                self.likes.remove(index);
            }
            None => self.likes.push(user.clone()),
        }

        self.likes.len()
    }

    pub fn is_liked_by(&self, user: &UserId) -> bool {
        self.likes.contains(user)
    }
}
