use axum::{
    extract::Multipart,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use diesel::prelude::*;
use diesel_async::{scoped_futures::ScopedFutureExt, AsyncConnection, RunQueryDsl};
use maud::html;

use crate::{
    media::{MediaError, MediaKind, BOOK_PLACEHOLDER},
    models::{BookPreview, NewBook, User},
    schema::book,
    slug::{book_slug, deduplicate},
    State,
};

use super::{
    app_page,
    components::book_form,
    forms::{BookFields, BookSubmission, FieldErrors, Upload, INVALID_IMAGE},
    Flash, Page, RouteError,
};

fn add_page(user: &User, details: &BookFields, errors: &FieldErrors) -> maud::Markup {
    app_page(
        Some(Page::AddBook),
        Some(user),
        html! {
            .container.text-center {
                h2 { "Add a Book" }
            }
            (book_form(details, BOOK_PLACEHOLDER, errors, "Add Book"))
        },
    )
}

pub(crate) async fn add_book(user: User) -> maud::Markup {
    add_page(&user, &BookFields::default(), &FieldErrors::new())
}

pub(crate) async fn do_add_book(
    state: State,
    user: User,
    multipart: Multipart,
) -> Result<Response, RouteError> {
    let max_upload_mb = state.config.media.max_upload_mb;
    let submission = BookSubmission::read(multipart, max_upload_mb).await?;

    let mut errors = submission.validate(max_upload_mb);
    if !errors.is_empty() {
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            add_page(&user, &submission.fields, &errors),
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
                    add_page(&user, &submission.fields, &errors),
                )
                    .into_response());
            }
            Err(e) => return Err(e.into()),
        },
    };

    let fields = submission.fields;
    let posted = fields.posted_at();
    let base_slug = book_slug(&fields.title, &fields.author);
    let new_book = NewBook {
        owner: user.id,
        title: fields.title,
        author: fields.author,
        language: fields.language,
        genre: fields.genre,
        description: fields.description,
        image: image.clone(),
        posted,
        slug: base_slug.clone(),
    };

    let mut conn = state.db.get().await?;

    let inserted = conn
        .transaction::<_, diesel::result::Error, _>(move |c| {
            async move {
                let taken: Vec<String> = book::table
                    .filter(
                        book::slug
                            .eq(&base_slug)
                            .or(book::slug.like(format!("{base_slug}-%"))),
                    )
                    .select(book::slug)
                    .load(c)
                    .await?;

                let new_book = NewBook {
                    slug: deduplicate(&base_slug, &taken),
                    ..new_book
                };

                diesel::insert_into(book::table)
                    .values(&new_book)
                    .returning(BookPreview::as_returning())
                    .get_result(c)
                    .await
            }
            .scope_boxed()
        })
        .await;

    let created = match inserted {
        Ok(created) => created,
        Err(e) => {
            if let Some(image) = image {
                state.media.remove(&image).await?;
            }
            return Err(e.into());
        }
    };

    tracing::info!(
        "User '{}' created book {} '{}'",
        user.name,
        created.id,
        created.slug
    );

    Ok(Redirect::to(&format!("{}?{}", created.url(), Flash::Created.query())).into_response())
}
