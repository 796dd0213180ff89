use std::sync::Arc;

use axum::{
    async_trait,
    extract::{multipart::MultipartError, FromRequestParts},
    http::StatusCode,
    response::IntoResponse,
};
use diesel::prelude::*;
use diesel_async::pooled_connection::deadpool::PoolError;
use diesel_async::RunQueryDsl;
use maud::{html, Markup};
use uuid::Uuid;

use crate::{
    media::{self, MediaError},
    models::{NewUser, User},
    schema::users,
    AppState, AuthConfig,
};

pub(crate) mod add;
pub(crate) mod books;
pub(crate) mod components;
pub(crate) mod delete;
pub(crate) mod edit;
pub(crate) mod forms;
pub(crate) mod get_book;
pub(crate) mod profile;
pub(crate) mod recommended;
pub(crate) mod serve_media;

#[derive(thiserror::Error, Debug)]
pub(crate) enum RouteError {
    #[error("Database error")]
    Db(#[from] diesel::result::Error),
    #[error("Missing a user header")]
    NoUser,
    #[error("Could not parse user name")]
    InvalidUser(#[from] axum::http::header::ToStrError),
    #[error("Could not get a connection from the pool")]
    PoolError(#[from] PoolError),
    #[error("Could not handle the image")]
    Media(#[from] MediaError),
    #[error("Invalid form upload")]
    Multipart(#[from] MultipartError),
    #[error("IO error")]
    Io(#[from] std::io::Error),
    #[error("Requested resource was not found")]
    NotFound,
    #[error("User is not allowed to do this")]
    Forbidden,
}

impl IntoResponse for RouteError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("route error: {self} ({self:#?})");
        let (code, text) = match &self {
            RouteError::Db(_)
            | RouteError::PoolError(_)
            | RouteError::Media(_)
            | RouteError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Error"),
            RouteError::NoUser => (StatusCode::UNAUTHORIZED, "You need to be logged in"),
            RouteError::InvalidUser(_) => (StatusCode::BAD_REQUEST, "Invalid user name"),
            RouteError::Multipart(e) => (e.status(), "Invalid form upload"),
            RouteError::NotFound => (StatusCode::NOT_FOUND, "Not found"),
            RouteError::Forbidden => (StatusCode::FORBIDDEN, "You are not allowed to do this"),
        };

        (
            code,
            base_page(html! {
                .container.text-center."mt-5" {
                    h1 { (code.as_u16()) }
                    p { (text) }
                    a href="/" { "Back to the library" }
                }
            }),
        )
            .into_response()
    }
}

/// Turns a missing row into a 404 instead of an internal error.
pub(crate) fn not_found(e: diesel::result::Error) -> RouteError {
    match e {
        diesel::result::Error::NotFound => RouteError::NotFound,
        _ => RouteError::from(e),
    }
}

#[derive(PartialEq, Eq, Clone, Copy)]
pub(crate) enum Page {
    Books,
    Recommended,
    MyBooks,
    Favourites,
    AddBook,
}

impl Page {
    fn variants(logged_in: bool) -> &'static [Self] {
        match logged_in {
            true => &[
                Self::Books,
                Self::Recommended,
                Self::MyBooks,
                Self::Favourites,
                Self::AddBook,
            ],
            false => &[Self::Books, Self::Recommended],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Page::Books => "Books",
            Page::Recommended => "Recommended",
            Page::MyBooks => "My Books",
            Page::Favourites => "Favourites",
            Page::AddBook => "Add a Book",
        }
    }

    pub fn location(&self) -> &'static str {
        match self {
            Page::Books => "/books",
            Page::Recommended => "/books/recommended",
            Page::MyBooks => "/books/mine",
            Page::Favourites => "/books/favourites",
            Page::AddBook => "/books/add",
        }
    }
}

/// Outcome of a successful mutation, shown once on the page redirected to.
#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Flash {
    Created,
    Updated,
    Deleted,
    Saved,
}

impl Flash {
    pub fn query(&self) -> &'static str {
        match self {
            Flash::Created => "flash=created",
            Flash::Updated => "flash=updated",
            Flash::Deleted => "flash=deleted",
            Flash::Saved => "flash=saved",
        }
    }

    pub fn message(&self, title: Option<&str>) -> String {
        match (self, title) {
            (Flash::Created, Some(title)) => format!("Book \"{title}\" was created successfully!"),
            (Flash::Updated, Some(title)) => format!("Book \"{title}\" was updated successfully!"),
            (Flash::Created, None) => "Book was created successfully!".into(),
            (Flash::Updated, None) => "Book was updated successfully!".into(),
            (Flash::Deleted, _) => "Book was deleted successfully!".into(),
            (Flash::Saved, _) => "Your profile was updated successfully!".into(),
        }
    }
}

#[derive(serde::Deserialize, Debug, Default)]
pub(crate) struct FlashQuery {
    flash: Option<Flash>,
}

fn flash_alert(message: Option<String>) -> Markup {
    html! {
        @if let Some(message) = message {
            .alert.alert-success.alert-dismissible role="alert" {
                (message)
                button type="button" .btn-close data-bs-dismiss="alert" aria-label="Close" {}
            }
        }
    }
}

fn base_page(body: Markup) -> Markup {
    html! {
        (maud::DOCTYPE)
        html lang="en" data-bs-theme="dark" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { "Bibliotheque" }
                link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/css/bootstrap.min.css"
                     rel="stylesheet"
                     integrity="sha384-T3c6CoIi6uLrA9TneNEoa7RxnatzjcDSCmG1MXxSR1GAsXEV/Dwwykc2MPK8M2HN"
                     crossorigin="anonymous";
                link rel="stylesheet"
                     href="https://cdn.jsdelivr.net/npm/bootstrap-icons@1.11.3/font/bootstrap-icons.min.css"
                     integrity="sha384-XGjxtQfXaH2tnPFa9x+ruJTuLE3Aa6LhHSWRr1XeTyhezb4abCG4ccI5AkVDxqC+"
                     crossorigin="anonymous";
            }
            body {
                (body)
                script src="https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/js/bootstrap.bundle.min.js"
                       integrity="sha384-C6RzsynM9kWDrMNeT87bh95OGNyZPhcTNXj1NW7RuBCsyN/o0jlpcV8Qyq46cDfL"
                       crossorigin="anonymous" {}
            }
        }
    }
}

fn app_page(page: Option<Page>, user: Option<&User>, body: Markup) -> Markup {
    base_page(html! {
        .container-fluid {
            header .d-flex
                   .flex-wrap
                   .align-items-center
                   .justify-content-center
                   .justify-content-md-between
                   ."py-3"."mb-4" {
                h2 ."col-md-3"."mb-2"."mb-md-0" {
                    a .d-inline-flex.link-body-emphasis.text-decoration-none href="/" {
                        i .bi.bi-book-half {}
                    }
                }
                ul .nav.nav-pills."col-12".col-md-auto."mb-2".justify-content-center."mb-md-0" {
                    @for p in Page::variants(user.is_some()) {
                        @let current = Some(*p) == page;
                        li .nav-item {
                            a .nav-link.active[current]
                                aria-current=[current.then_some("page")]
                                href=(p.location()) {
                                (p.name())
                            }
                        }
                    }
                }
                ."col-md-3".text-end."me-2" {
                    @match user {
                        Some(user) => {
                            a .link-light.link-offset-1 href=(format!("/profile/{}", user.id)) {
                                img .rounded-circle."me-2" style="height: 2rem; width: 2rem;"
                                    src=(media::url(&user.image)) alt="profile picture";
                                span .align-middle { (user.name) }
                            }
                        }
                        None => {
                            span .align-middle.text-body-secondary { "Not logged in" }
                        }
                    }
                }
            }
            (body)
        }
    })
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = RouteError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = match parts.headers.get(&state.config.auth.header) {
            Some(user) => user.to_str()?,
            None => match state.config.debug.assume_user.as_deref() {
                Some(user) => user,
                None => return Err(RouteError::NoUser),
            },
        };

        let mut conn = state.db.get().await?;

        diesel::insert_into(users::table)
            .values(&NewUser { name: user })
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await?;

        Ok(users::table
            .filter(users::name.eq(user))
            .select(User::as_select())
            .first(&mut conn)
            .await?)
    }
}

/// The current user on pages that are also visible without logging in.
pub(crate) struct MaybeUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = RouteError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match User::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(RouteError::NoUser) => Ok(MaybeUser(None)),
            Err(e) => Err(e),
        }
    }
}

pub(crate) fn is_admin(auth: &AuthConfig, user: &User) -> bool {
    auth.admin.iter().any(|admin| *admin == user.name)
}

/// Books may be changed by their owner or by an administrator.
pub(crate) fn can_modify(auth: &AuthConfig, user: &User, owner: Uuid) -> bool {
    user.id == owner || is_admin(auth, user)
}

pub(crate) async fn index(MaybeUser(user): MaybeUser) -> Markup {
    app_page(
        None,
        user.as_ref(),
        html! {
            .container.text-center {
                h1 { "Welcome to the library" }
                @if let Some(user) = &user {
                    p { "Hello, " (user.display_name()) "!" }
                }
                p .lead {
                    "Browse the books shared by our readers, like the ones you enjoyed and "
                    "keep your favourites close at hand."
                }
                a .btn.btn-primary.me-2 href=(Page::Books.location()) { "Browse books" }
                a .btn.btn-secondary href=(Page::Recommended.location()) { "Most liked" }
                ."mt-4" {
                    a .link-secondary href="/about" { "About" }
                }
            }
        },
    )
}

pub(crate) async fn about(MaybeUser(user): MaybeUser) -> Markup {
    app_page(
        None,
        user.as_ref(),
        html! {
            .container {
                h2 { "About" }
                p {
                    "Bibliotheque is a small shared library catalog. Anyone can post a book "
                    "with its cover and description; readers can like books, and the three "
                    "most liked are recommended to everybody."
                }
            }
        },
    )
}

#[cfg(test)]
mod test {
    use uuid::Uuid;

    use super::{can_modify, Flash, FlashQuery};
    use crate::{models::User, AuthConfig};

    fn user(name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: name.into(),
            email: None,
            first_name: String::new(),
            last_name: String::new(),
            image: crate::media::PROFILE_PLACEHOLDER.into(),
        }
    }

    #[test]
    fn owner_or_admin() {
        let auth = AuthConfig {
            header: "Remote-User".into(),
            admin: vec!["root".into()],
        };

        let owner = user("owner");
        let other = user("other");
        let admin = user("root");

        assert!(can_modify(&auth, &owner, owner.id));
        assert!(!can_modify(&auth, &other, owner.id));
        assert!(can_modify(&auth, &admin, owner.id));
    }

    #[test]
    fn flash_messages() {
        let query: FlashQuery = parse_flash("flash=created");
        assert_eq!(query.flash, Some(Flash::Created));
        assert_eq!(
            Flash::Created.message(Some("Dune")),
            "Book \"Dune\" was created successfully!"
        );
        assert_eq!(
            Flash::Deleted.message(None),
            "Book was deleted successfully!"
        );
    }

    fn parse_flash(query: &str) -> FlashQuery {
        let uri: axum::http::Uri = format!("/?{query}").parse().unwrap();
        axum::extract::Query::<FlashQuery>::try_from_uri(&uri)
            .unwrap()
            .0
    }
}
