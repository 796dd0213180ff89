use axum::{extract::Path, response::Redirect};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use maud::html;

use crate::{models::User, schema::book, State};

use super::{app_page, edit::modifiable_book, Flash, Page, RouteError};

pub(crate) async fn delete_book(
    state: State,
    user: User,
    Path((id, _slug)): Path<(i64, String)>,
) -> Result<maud::Markup, RouteError> {
    let mut conn = state.db.get().await?;
    let book = modifiable_book(&state, &mut conn, &user, id).await?;

    Ok(app_page(
        Some(Page::Books),
        Some(&user),
        html! {
            form .container.text-center method="POST" {
                h2 { "Delete Book" }
                p { "Are you sure you want to delete \"" (book.title) "\"?" }
                input type="submit" .btn.btn-danger.me-2 value="Yes, delete";
                a .btn.btn-secondary href=(book.url()) { "Cancel" }
            }
        },
    ))
}

pub(crate) async fn do_delete_book(
    state: State,
    user: User,
    Path((id, _slug)): Path<(i64, String)>,
) -> Result<Redirect, RouteError> {
    let mut conn = state.db.get().await?;
    let book = modifiable_book(&state, &mut conn, &user, id).await?;

    // Likes and favourites go with the book
    diesel::delete(book::table.find(book.id))
        .execute(&mut conn)
        .await?;

    state.media.remove(&book.image).await?;

    tracing::info!("User '{}' deleted book {} '{}'", user.name, book.id, book.slug);

    Ok(Redirect::to(&format!(
        "{}?{}",
        Page::MyBooks.location(),
        Flash::Deleted.query()
    )))
}
