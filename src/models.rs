use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{
    entities::{category, genre, user},
    pagination::PageQuery,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRead {
    pub name: String,
    pub slug: String,
}

impl From<category::Model> for LookupRead {
    fn from(model: category::Model) -> Self {
        Self { name: model.name, slug: model.slug }
    }
}

impl From<genre::Model> for LookupRead {
    fn from(model: genre::Model) -> Self {
        Self { name: model.name, slug: model.slug }
    }
}

/// Body for creating a category or genre.
#[derive(Clone, Debug, Deserialize)]
pub struct LookupWrite {
    pub name: String,
    pub slug: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct LookupPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
    pub page: Option<u64>,
}

impl SearchQuery {
    pub fn page(&self) -> PageQuery {
        PageQuery { page: self.page }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TitleQuery {
    pub name: Option<String>,
    pub year: Option<i32>,
    /// Category slug.
    pub category: Option<String>,
    /// Genre slug.
    pub genre: Option<String>,
    pub page: Option<u64>,
}

impl TitleQuery {
    pub fn page(&self) -> PageQuery {
        PageQuery { page: self.page }
    }
}

/// Title creation body; `category` and `genre` are slugs.
#[derive(Clone, Debug, Deserialize)]
pub struct TitleWrite {
    pub name: String,
    pub year: i32,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub genre: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TitlePatch {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub genre: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TitleRead {
    pub id: i32,
    pub name: String,
    pub year: i32,
    pub rating: Option<i32>,
    pub description: String,
    pub genre: Vec<LookupRead>,
    pub category: LookupRead,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReviewWrite {
    pub text: String,
    pub score: i32,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ReviewPatch {
    pub text: Option<String>,
    pub score: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewRead {
    pub id: i32,
    pub text: String,
    /// Author username.
    pub author: String,
    pub score: i32,
    pub pub_date: Timestamp,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CommentWrite {
    pub text: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CommentPatch {
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommentRead {
    pub id: i32,
    pub text: String,
    pub author: String,
    pub pub_date: Timestamp,
}

/// Signup body, echoed back on success.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signup {
    pub username: String,
    pub email: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub confirmation_code: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRead {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: user::Role,
}

impl From<user::Model> for UserRead {
    fn from(model: user::Model) -> Self {
        Self {
            username: model.username,
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            bio: model.bio,
            role: model.role,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct UserCreate {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub bio: String,
    pub role: Option<user::Role>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<user::Role>,
}
