use axum::{
    extract::{Multipart, Path},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use maud::html;

use crate::{
    media::{MediaError, MediaKind},
    models::{BookComplete, BookEdit, User},
    schema::book,
    State,
};

use super::{
    app_page, can_modify,
    components::book_form,
    forms::{BookFields, BookSubmission, FieldErrors, Upload, INVALID_IMAGE, POSTED_INPUT_FORMAT},
    not_found, Flash, Page, RouteError,
};

/// Loads a book the user is allowed to change.
pub(crate) async fn modifiable_book(
    state: &State,
    conn: &mut AsyncPgConnection,
    user: &User,
    id: i64,
) -> Result<BookComplete, RouteError> {
    let book = book::table
        .find(id)
        .select(BookComplete::as_select())
        .get_result(conn)
        .await
        .map_err(not_found)?;

    if !can_modify(&state.config.auth, user, book.owner) {
        tracing::warn!("User '{}' tried to modify book {id}", user.name);
        return Err(RouteError::Forbidden);
    }

    Ok(book)
}

fn edit_page(
    user: &User,
    book: &BookComplete,
    details: &BookFields,
    errors: &FieldErrors,
) -> maud::Markup {
    app_page(
        Some(Page::Books),
        Some(user),
        html! {
            .container.text-center {
                h2 { "Edit " a href=(book.url()) { (book.title) } }
            }
            (book_form(details, &book.image, errors, "Update Book"))
        },
    )
}

pub(crate) async fn edit_book(
    state: State,
    user: User,
    Path((id, _slug)): Path<(i64, String)>,
) -> Result<maud::Markup, RouteError> {
    let mut conn = state.db.get().await?;
    let book = modifiable_book(&state, &mut conn, &user, id).await?;

    let details = BookFields {
        title: book.title.clone(),
        author: book.author.clone(),
        language: book.language.clone(),
        genre: book.genre.clone(),
        description: book.description.clone(),
        posted: book.posted.format(POSTED_INPUT_FORMAT).to_string(),
    };

    Ok(edit_page(&user, &book, &details, &FieldErrors::new()))
}

pub(crate) async fn do_edit_book(
    state: State,
    user: User,
    Path((id, _slug)): Path<(i64, String)>,
    multipart: Multipart,
) -> Result<Response, RouteError> {
    // Not holding a connection while the upload arrives
    let book = {
        let mut conn = state.db.get().await?;
        modifiable_book(&state, &mut conn, &user, id).await?
    };

    let max_upload_mb = state.config.media.max_upload_mb;
    let submission = BookSubmission::read(multipart, max_upload_mb).await?;

    let mut errors = submission.validate(max_upload_mb);
    if !errors.is_empty() {
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            edit_page(&user, &book, &submission.fields, &errors),
        )
            .into_response());
    }

    let image = match submission.image.and_then(Upload::into_image) {
        None => None,
        Some(data) => match state.media.save(MediaKind::BookCover, data).await {
            Ok(name) => Some(name),
            Err(MediaError::Image(e)) => {
                tracing::debug!("Rejected cover upload: {e}");
                errors.insert("image", INVALID_IMAGE.into());
                return Ok((
                    StatusCode::UNPROCESSABLE_ENTITY,
                    edit_page(&user, &book, &submission.fields, &errors),
                )
                    .into_response());
            }
            Err(e) => return Err(e.into()),
        },
    };

    let fields = submission.fields;
    let posted = fields.posted_at();
    let changes = BookEdit {
        title: fields.title,
        author: fields.author,
        language: fields.language,
        genre: fields.genre,
        description: fields.description,
        image: image.clone(),
        posted,
    };

    let mut conn = state.db.get().await?;
    let updated = diesel::update(book::table.find(book.id))
        .set(&changes)
        .execute(&mut conn)
        .await;

    match (updated, image) {
        (Ok(_), Some(_)) => state.media.remove(&book.image).await?,
        (Ok(_), None) => (),
        (Err(e), image) => {
            if let Some(image) = image {
                state.media.remove(&image).await?;
            }
            return Err(e.into());
        }
    }

    tracing::info!("User '{}' updated book {}", user.name, book.id);

    Ok(Redirect::to(&format!("{}?{}", book.url(), Flash::Updated.query())).into_response())
}
