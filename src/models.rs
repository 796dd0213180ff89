use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

#[derive(Insertable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewUser<'a> {
    pub name: &'a str,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub image: String,
}

impl User {
    pub fn display_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (true, true) => self.name.clone(),
            (false, true) => self.first_name.clone(),
            (true, false) => self.last_name.clone(),
            (false, false) => format!("{} {}", self.first_name, self.last_name),
        }
    }
}

#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProfileEdit {
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub image: Option<String>,
}

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::book)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BookPreview {
    pub id: i64,
    pub owner: Uuid,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub language: String,
    pub image: String,
    pub posted: DateTime<Utc>,
    pub slug: String,
}

impl BookPreview {
    pub fn url(&self) -> String {
        book_url(self.id, &self.slug)
    }
}

#[derive(Queryable, Selectable, Identifiable, Debug)]
#[diesel(table_name = crate::schema::book)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BookComplete {
    pub id: i64,
    pub owner: Uuid,
    pub title: String,
    pub author: String,
    pub language: String,
    pub genre: String,
    pub description: String,
    pub image: String,
    pub posted: DateTime<Utc>,
    pub slug: String,
}

impl BookComplete {
    pub fn url(&self) -> String {
        book_url(self.id, &self.slug)
    }
}

pub fn book_url(id: i64, slug: &str) -> String {
    format!("/book/{id}/{slug}")
}

/// A book as submitted by its owner. `image` and `posted` fall back to the
/// column defaults when absent.
#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::book)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewBook {
    pub owner: Uuid,
    pub title: String,
    pub author: String,
    pub language: String,
    pub genre: String,
    pub description: String,
    pub image: Option<String>,
    pub posted: Option<DateTime<Utc>>,
    pub slug: String,
}

/// Fields an owner can change after creation. The slug is kept as created,
/// `None` leaves a column unchanged.
#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::book)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BookEdit {
    pub title: String,
    pub author: String,
    pub language: String,
    pub genre: String,
    pub description: String,
    pub image: Option<String>,
    pub posted: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::booklike)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BookLike {
    pub profile: Uuid,
    pub book: i64,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::bookfavourite)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BookFavourite {
    pub profile: Uuid,
    pub book: i64,
}
