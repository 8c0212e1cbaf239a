//! User-related entity definitions.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A language learner registered in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier.
    pub id: Uuid,
    /// Email address.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Avatar URL.
    #[serde(default)]
    pub profile_pic: String,
    /// Language the user speaks natively.
    #[serde(default)]
    pub native_language: String,
    /// Language the user is learning.
    #[serde(default)]
    pub learning_language: String,
    /// Free-form bio.
    #[serde(default)]
    pub bio: String,
    /// Free-form location.
    #[serde(default)]
    pub location: String,
    /// Symmetric friendship list. Only the friend ledger mutates it.
    #[serde(default)]
    pub friends: BTreeSet<Uuid>,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
    /// When this record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user.
    pub fn new(email: impl Into<String>, full_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            full_name: full_name.into(),
            profile_pic: String::new(),
            native_language: String::new(),
            learning_language: String::new(),
            bio: String::new(),
            location: String::new(),
            friends: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the avatar URL.
    pub fn with_profile_pic(mut self, url: impl Into<String>) -> Self {
        self.profile_pic = url.into();
        self
    }

    /// Sets the native and learning languages.
    pub fn with_languages(
        mut self,
        native: impl Into<String>,
        learning: impl Into<String>,
    ) -> Self {
        self.native_language = native.into();
        self.learning_language = learning.into();
        self
    }

    /// Sets the bio.
    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = bio.into();
        self
    }

    /// Sets the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Returns true if `other` is in this user's friends set.
    pub fn is_friend_of(&self, other: Uuid) -> bool {
        self.friends.contains(&other)
    }

    /// Returns true if the two users could help each other practice.
    ///
    /// Language names are compared case-insensitively; empty values never
    /// match.
    pub fn is_language_match(&self, other: &User) -> bool {
        fn same(a: &str, b: &str) -> bool {
            !a.trim().is_empty() && a.trim().eq_ignore_ascii_case(b.trim())
        }

        same(&self.learning_language, &other.native_language)
            || same(&self.native_language, &other.learning_language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_creation() {
        let user = User::new("ana@example.com", "Ana")
            .with_languages("spanish", "english")
            .with_location("Madrid");

        assert_eq!(user.email, "ana@example.com");
        assert_eq!(user.full_name, "Ana");
        assert_eq!(user.location, "Madrid");
        assert!(user.friends.is_empty());
    }

    #[test]
    fn test_language_match() {
        let ana = User::new("ana@example.com", "Ana").with_languages("Spanish", "English");
        let ben = User::new("ben@example.com", "Ben").with_languages("english", "german");
        let kim = User::new("kim@example.com", "Kim").with_languages("korean", "german");
        let blank = User::new("x@example.com", "X");

        assert!(ana.is_language_match(&ben));
        assert!(ben.is_language_match(&ana));
        assert!(!ana.is_language_match(&kim));
        assert!(!blank.is_language_match(&blank));
    }

    #[test]
    fn test_serializes_camel_case() {
        let user = User::new("ana@example.com", "Ana").with_profile_pic("https://a/1.png");
        let json = serde_json::to_value(&user).unwrap();

        assert_eq!(json["fullName"], "Ana");
        assert_eq!(json["profilePic"], "https://a/1.png");
        assert!(json["friends"].as_array().unwrap().is_empty());
    }
}
