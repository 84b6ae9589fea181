use std::sync::Arc;

use serde::Deserialize;

use super::clock::Clock;
use super::domain::{User, UserId};
use super::repository::{RepositoryError, UserRepository};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("User not found")]
    NotFound,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct ProfileService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S: UserRepository> ProfileService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn profile(&self, id: &UserId) -> Result<User, ProfileError> {
        self.store.user_by_id(id)?.ok_or(ProfileError::NotFound)
    }

    /// Blank names are ignored so a partial form cannot wipe the stored one.
    pub fn update(&self, id: &UserId, update: ProfileUpdate) -> Result<User, ProfileError> {
        let mut user = self.profile(id)?;
        if let Some(name) = update.name.map(|name| name.trim().to_string()) {
            if !name.is_empty() && name != user.name {
                user.name = name;
                user.updated_at = self.clock.now();
                self.store.update_user(user.clone())?;
            }
        }
        Ok(user)
    }
}
