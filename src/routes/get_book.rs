use axum::{
    extract::{Path, Query},
    response::{IntoResponse, Redirect, Response},
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use maud::{html, PreEscaped};

use crate::{
    engagement::{self, Relation},
    media,
    models::BookComplete,
    ranking,
    schema::{book, users},
    State,
};

use super::{
    app_page, can_modify,
    components::{author_url, genre_url, path_segment},
    flash_alert, not_found, FlashQuery, MaybeUser, Page, RouteError,
};

pub(crate) async fn get_book(
    state: State,
    MaybeUser(user): MaybeUser,
    Path((id, slug)): Path<(i64, String)>,
    Query(flash): Query<FlashQuery>,
) -> Result<Response, RouteError> {
    let mut conn = state.db.get().await?;

    let (book, owner_name): (BookComplete, String) = book::table
        .inner_join(users::table)
        .filter(book::id.eq(id))
        .select((BookComplete::as_select(), users::name))
        .get_result(&mut conn)
        .await
        .map_err(not_found)?;

    // Only the id identifies the book, the slug is decoration
    if book.slug != slug {
        return Ok(Redirect::permanent(&book.url()).into_response());
    }

    let likes = ranking::like_count(&mut conn, book.id).await?;

    let (liked, saved) = match &user {
        Some(user) => (
            engagement::contains(&mut conn, Relation::Like, user.id, book.id).await?,
            engagement::contains(&mut conn, Relation::Favourite, user.id, book.id).await?,
        ),
        None => (false, false),
    };

    let modifiable = user
        .as_ref()
        .is_some_and(|u| can_modify(&state.config.auth, u, book.owner));

    let description = ammonia::clean(&book.description);

    Ok(app_page(
        Some(Page::Books),
        user.as_ref(),
        html! {
            (flash_alert(flash.flash.map(|f| f.message(Some(&book.title)))))
            .container.text-center {
                h2 {
                    (book.title)
                    @if modifiable {
                        a .ms-2.btn.btn-primary href=(format!("{}/edit", book.url())) { i .bi.bi-pencil {} }
                        a .ms-2.btn.btn-danger href=(format!("{}/delete", book.url())) { i .bi.bi-trash {} }
                    }
                }
                ."mb-2" {
                    img style="height: 24rem" src=(media::url(&book.image)) alt="cover art";
                }
                .container {
                    span .fs-4 {
                        a .link-light.link-offset-1 href=(author_url(&book.author)) {
                            (book.author)
                        }
                    }
                    br;
                    a .badge.text-bg-primary.text-decoration-none href=(genre_url(&book.genre)) {
                        (book.genre)
                    }
                }
                .d-flex.justify-content-center.align-items-center."my-2" {
                    span .me-3 {
                        i .bi.bi-heart-fill.text-danger.me-1 {}
                        (likes) @if likes == 1 { " like" } @else { " likes" }
                    }
                    @if let Some(user) = &user {
                        form method="POST" action=(format!("/profile/{}/like_book", user.id)) .me-2 {
                            input type="hidden" name="book_id" value=(book.id);
                            @if liked {
                                button type="submit" .btn.btn-outline-danger { "Unlike" }
                            } @else {
                                button type="submit" .btn.btn-danger { "Like" }
                            }
                        }
                        form method="POST" action=(format!("/profile/{}/save_book", user.id)) {
                            input type="hidden" name="book_id" value=(book.id);
                            @if saved {
                                button type="submit" .btn.btn-outline-warning { "Remove from favourites" }
                            } @else {
                                button type="submit" .btn.btn-warning { "Add to favourites" }
                            }
                        }
                    }
                }
                .container."mb-2" {
                    (PreEscaped(description))
                    hr;
                    .text-start {
                        "Language: " (book.language)
                        br;
                        "Posted by: "
                        a .link-light.link-offset-1
                            href=(format!("/books/profile/{}", path_segment(&owner_name))) {
                            (owner_name)
                        }
                        br;
                        "Posted on: " (book.posted.format("%d/%m/%Y %H:%M"))
                    }
                }
            }
        },
    )
    .into_response())
}
