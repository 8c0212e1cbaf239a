//! User directory access.
//!
//! Signup lives in an external identity service. This module imports its
//! user snapshot and resolves user IDs for response views.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use anyhow::Context;
use api_protocol::{FriendRequestView, MessageView};
use entities::{FriendRequest, User};
use serde::Deserialize;
use social_store::{SocialStore, StoreError, UnseenMessage};
use uuid::Uuid;

use crate::error::ServerResult;

/// One entry of a directory snapshot file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub profile_pic: String,
    #[serde(default)]
    pub native_language: String,
    #[serde(default)]
    pub learning_language: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub location: String,
}

impl DirectoryEntry {
    /// Converts the entry into a user with an empty friends set.
    pub fn into_user(self) -> User {
        let mut user = User::new(self.email, self.full_name)
            .with_profile_pic(self.profile_pic)
            .with_languages(self.native_language, self.learning_language)
            .with_bio(self.bio)
            .with_location(self.location);
        if let Some(id) = self.id {
            user.id = id;
        }
        user
    }
}

/// Imports users from a JSON array of directory entries.
///
/// Entries already present are skipped, so importing the same file on every
/// start is safe. Returns the number of users created.
pub async fn import_users<S: SocialStore>(store: &S, path: &Path) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read users file {}", path.display()))?;
    let entries: Vec<DirectoryEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse users file {}", path.display()))?;

    let mut created = 0;
    for entry in entries {
        let email = entry.email.clone();
        match store.create_user(entry.into_user()).await {
            Ok(_) => created += 1,
            Err(StoreError::AlreadyExists { .. }) => {
                tracing::debug!(email = %email, "User already imported");
            }
            Err(e) => return Err(e).with_context(|| format!("failed to import user {email}")),
        }
    }

    tracing::info!(created, path = %path.display(), "Imported users");
    Ok(created)
}

/// Resolves both parties of each request into response views.
pub async fn request_views<S: SocialStore>(
    store: &S,
    requests: &[FriendRequest],
) -> ServerResult<Vec<FriendRequestView>> {
    let ids: HashSet<Uuid> = requests
        .iter()
        .flat_map(|r| [r.sender_id, r.recipient_id])
        .collect();
    let users = users_by_id(store, ids.into_iter().collect()).await?;

    Ok(requests
        .iter()
        .map(|r| FriendRequestView::new(r, users.get(&r.sender_id), users.get(&r.recipient_id)))
        .collect())
}

/// Resolves both parties of one request.
pub async fn request_view<S: SocialStore>(
    store: &S,
    request: &FriendRequest,
) -> ServerResult<FriendRequestView> {
    let users = users_by_id(store, vec![request.sender_id, request.recipient_id]).await?;
    Ok(FriendRequestView::new(
        request,
        users.get(&request.sender_id),
        users.get(&request.recipient_id),
    ))
}

/// Converts joined unseen messages into response views.
pub fn message_views(messages: &[UnseenMessage]) -> Vec<MessageView> {
    messages
        .iter()
        .map(|m| MessageView::new(&m.message, m.sender.as_ref()))
        .collect()
}

async fn users_by_id<S: SocialStore>(
    store: &S,
    ids: Vec<Uuid>,
) -> ServerResult<HashMap<Uuid, User>> {
    let users = store
        .get_users(&ids)
        .await
        .map_err(social_store::LedgerError::from)?;
    Ok(users.into_iter().map(|u| (u.id, u)).collect())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use social_store::MemoryStore;
    use tokio_test::assert_err;

    use super::*;

    fn write_users_file(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("chatmate-users-{}.json", Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_import_is_repeatable() {
        let id = Uuid::new_v4();
        let path = write_users_file(&format!(
            r#"[
                {{ "id": "{id}", "email": "ana@example.com", "fullName": "Ana",
                   "nativeLanguage": "spanish", "learningLanguage": "english" }},
                {{ "email": "ben@example.com", "fullName": "Ben" }}
            ]"#
        ));
        let store = MemoryStore::new();

        assert_eq!(import_users(&store, &path).await.unwrap(), 2);
        assert_eq!(import_users(&store, &path).await.unwrap(), 0);

        let ana = store.get_user(id).await.unwrap().unwrap();
        assert_eq!(ana.native_language, "spanish");
        assert!(ana.friends.is_empty());

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_import_rejects_bad_json() {
        let path = write_users_file("{ not json");
        let store = MemoryStore::new();

        assert_err!(import_users(&store, &path).await);

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_request_views_resolve_users() {
        let store = MemoryStore::new();
        let ana = store.create_user(User::new("ana@example.com", "Ana")).await.unwrap();
        let ben = store.create_user(User::new("ben@example.com", "Ben")).await.unwrap();
        let request = FriendRequest::new(ana.id, ben.id);

        let views = request_views(&store, &[request]).await.unwrap();
        assert_eq!(views[0].sender.full_name, "Ana");
        assert_eq!(views[0].recipient.full_name, "Ben");
    }
}
