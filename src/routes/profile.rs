use axum::{
    extract::{Multipart, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use diesel::{dsl::exists, prelude::*};
use diesel_async::RunQueryDsl;
use maud::html;
use uuid::Uuid;

use crate::{
    engagement::{self, Relation},
    media::{self, MediaError, MediaKind},
    models::{book_url, ProfileEdit, User},
    schema::{book, bookfavourite, booklike, users},
    State,
};

use super::{
    app_page,
    components::{path_segment, profile_form},
    flash_alert,
    forms::{FieldErrors, ProfileFields, ProfileSubmission, Upload, INVALID_IMAGE},
    is_admin, not_found, Flash, FlashQuery, Page, RouteError,
};

fn require_self(user: &User, id: Uuid) -> Result<(), RouteError> {
    match user.id == id {
        true => Ok(()),
        false => {
            tracing::warn!("User '{}' tried to act on profile {id}", user.name);
            Err(RouteError::Forbidden)
        }
    }
}

pub(crate) async fn profile(
    state: State,
    user: User,
    Path(id): Path<Uuid>,
    Query(flash): Query<FlashQuery>,
) -> Result<maud::Markup, RouteError> {
    let mut conn = state.db.get().await?;

    let profile = users::table
        .find(id)
        .select(User::as_select())
        .get_result(&mut conn)
        .await
        .map_err(not_found)?;

    let posted: i64 = book::table
        .filter(book::owner.eq(id))
        .count()
        .get_result(&mut conn)
        .await?;

    let liked: i64 = booklike::table
        .filter(booklike::profile.eq(id))
        .count()
        .get_result(&mut conn)
        .await?;

    let favourites: i64 = bookfavourite::table
        .filter(bookfavourite::profile.eq(id))
        .count()
        .get_result(&mut conn)
        .await?;

    let own = user.id == profile.id;
    let deletable = own || is_admin(&state.config.auth, &user);

    Ok(app_page(
        None,
        Some(&user),
        html! {
            (flash_alert(flash.flash.map(|f| f.message(None))))
            .container.text-center {
                img .rounded-circle."mb-3" style="height: 10rem; width: 10rem;"
                    src=(media::url(&profile.image)) alt="profile picture";
                h2 { (profile.display_name()) }
                p .text-body-secondary { "@" (profile.name) }
                @if own {
                    @if let Some(email) = &profile.email {
                        p { (email) }
                    }
                }
                ul .list-group.list-group-horizontal.justify-content-center."mb-3" {
                    li .list-group-item {
                        a .link-light href=(format!("/books/profile/{}", path_segment(&profile.name))) {
                            (format!("{posted} books posted"))
                        }
                    }
                    li .list-group-item { (format!("{liked} books liked")) }
                    li .list-group-item {
                        @if own {
                            a .link-light href=(Page::Favourites.location()) {
                                (format!("{favourites} favourites"))
                            }
                        } @else {
                            (format!("{favourites} favourites"))
                        }
                    }
                }
                .d-flex.justify-content-center {
                    @if own {
                        a .btn.btn-primary.me-2 href=(format!("/profile/{id}/user")) { "Edit profile" }
                    }
                    @if deletable {
                        form method="POST" action=(format!("/profile/{id}/delete"))
                            onsubmit="return confirm('Delete this account and all of its books?')" {
                            input type="submit" .btn.btn-danger value="Delete account";
                        }
                    }
                }
            }
        },
    ))
}

fn edit_page(user: &User, details: &ProfileFields, errors: &FieldErrors) -> maud::Markup {
    app_page(
        None,
        Some(user),
        html! {
            .container.text-center {
                h2 { "Edit profile" }
            }
            (profile_form(user, details, errors))
        },
    )
}

pub(crate) async fn edit_profile(
    user: User,
    Path(id): Path<Uuid>,
) -> Result<maud::Markup, RouteError> {
    require_self(&user, id)?;

    let details = ProfileFields {
        email: user.email.clone().unwrap_or_default(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
    };

    Ok(edit_page(&user, &details, &FieldErrors::new()))
}

pub(crate) async fn do_edit_profile(
    state: State,
    user: User,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Response, RouteError> {
    require_self(&user, id)?;

    let max_upload_mb = state.config.media.max_upload_mb;
    let submission = ProfileSubmission::read(multipart, max_upload_mb).await?;
    let mut errors = submission.validate(max_upload_mb);

    let mut conn = state.db.get().await?;

    if !errors.contains_key("email") {
        let taken: bool = diesel::select(exists(
            users::table
                .filter(users::email.eq(&submission.fields.email))
                .filter(users::id.ne(user.id)),
        ))
        .get_result(&mut conn)
        .await?;

        if taken {
            errors.insert("email", "Email already exists.".into());
        }
    }

    if !errors.is_empty() {
        return Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            edit_page(&user, &submission.fields, &errors),
        )
            .into_response());
    }

    let image = match submission.image.and_then(Upload::into_image) {
        None => None,
        Some(data) => match state.media.save(MediaKind::ProfilePicture, data).await {
            Ok(name) => Some(name),
            Err(MediaError::Image(e)) => {
                tracing::debug!("Rejected profile picture upload: {e}");
                errors.insert("image", INVALID_IMAGE.into());
                return Ok((
                    StatusCode::UNPROCESSABLE_ENTITY,
                    edit_page(&user, &submission.fields, &errors),
                )
                    .into_response());
            }
            Err(e) => return Err(e.into()),
        },
    };

    let fields = submission.fields;
    let changes = ProfileEdit {
        email: Some(fields.email),
        first_name: fields.first_name,
        last_name: fields.last_name,
        image: image.clone(),
    };

    let updated = diesel::update(users::table.find(user.id))
        .set(&changes)
        .execute(&mut conn)
        .await;

    match (updated, image) {
        (Ok(_), Some(_)) => state.media.remove(&user.image).await?,
        (Ok(_), None) => (),
        (Err(e), image) => {
            if let Some(image) = image {
                state.media.remove(&image).await?;
            }
            return Err(e.into());
        }
    }

    tracing::info!("User '{}' updated their profile", user.name);

    Ok(Redirect::to(&format!("/profile/{id}?{}", Flash::Saved.query())).into_response())
}

pub(crate) async fn do_delete_profile(
    state: State,
    user: User,
    Path(id): Path<Uuid>,
) -> Result<Redirect, RouteError> {
    if user.id != id && !is_admin(&state.config.auth, &user) {
        tracing::warn!("User '{}' tried to delete profile {id}", user.name);
        return Err(RouteError::Forbidden);
    }

    let mut conn = state.db.get().await?;

    let profile_image: String = users::table
        .find(id)
        .select(users::image)
        .get_result(&mut conn)
        .await
        .map_err(not_found)?;

    let book_images: Vec<String> = book::table
        .filter(book::owner.eq(id))
        .select(book::image)
        .load(&mut conn)
        .await?;

    // Books, likes and favourites are removed by the database
    diesel::delete(users::table.find(id))
        .execute(&mut conn)
        .await?;

    for image in book_images.iter().chain(std::iter::once(&profile_image)) {
        state.media.remove(image).await?;
    }

    tracing::info!(
        "User '{}' deleted profile {id} and {} books",
        user.name,
        book_images.len()
    );

    Ok(Redirect::to(match user.id == id {
        true => "/",
        false => Page::Books.location(),
    }))
}

#[derive(serde::Deserialize, Debug)]
pub(crate) struct BookRef {
    book_id: i64,
}

async fn toggle(
    state: State,
    user: User,
    id: Uuid,
    relation: Relation,
    book_id: i64,
) -> Result<Redirect, RouteError> {
    require_self(&user, id)?;

    let mut conn = state.db.get().await?;

    let slug: String = book::table
        .find(book_id)
        .select(book::slug)
        .get_result(&mut conn)
        .await
        .map_err(not_found)?;

    let present = engagement::toggle(&mut conn, relation, user.id, book_id).await?;
    tracing::debug!(
        "User '{}' {} {relation:?} on book {book_id}",
        user.name,
        if present { "added" } else { "removed" }
    );

    Ok(Redirect::to(&book_url(book_id, &slug)))
}

pub(crate) async fn do_like_book(
    state: State,
    user: User,
    Path(id): Path<Uuid>,
    Form(form): Form<BookRef>,
) -> Result<Redirect, RouteError> {
    toggle(state, user, id, Relation::Like, form.book_id).await
}

pub(crate) async fn do_save_book(
    state: State,
    user: User,
    Path(id): Path<Uuid>,
    Form(form): Form<BookRef>,
) -> Result<Redirect, RouteError> {
    toggle(state, user, id, Relation::Favourite, form.book_id).await
}
