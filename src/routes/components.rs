use maud::{html, Markup};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::{
    media,
    models::{BookPreview, User},
};

use super::{
    books::{BookOrder, Pagination},
    forms::{BookFields, FieldErrors, ProfileFields},
};

/// Escapes free text so it can be used as a single path segment.
pub fn path_segment(text: &str) -> String {
    utf8_percent_encode(text, NON_ALPHANUMERIC).to_string()
}

pub fn author_url(author: &str) -> String {
    format!("/books/author/{}", path_segment(author))
}

pub fn genre_url(genre: &str) -> String {
    format!("/books/genre/{}", path_segment(genre))
}

pub fn book_card(book: &BookPreview, footer: Option<Markup>) -> Markup {
    html! {
        ."col"."mb-2" {
            .card."h-100" style="width: 9.6rem;" {
                img src=(media::url(&book.image)) .card-img-top alt="book cover"
                    style="height: 14.4rem; width: 9.6rem; object-fit: cover;";
                .card-body {
                    h6 .card-title {
                        a .nav-link.fs-5 href=(book.url()) {
                            (book.title)
                        }
                    }
                    p .card-text {
                        a .nav-link href=(author_url(&book.author)) {
                            (book.author)
                        }
                        a .badge.text-bg-primary.text-decoration-none
                            href=(genre_url(&book.genre)) {
                            (book.genre)
                        }
                    }
                }
                @if let Some(footer) = footer {
                    .card-footer.d-flex.justify-content-evenly {
                        (footer)
                    }
                }
            }
        }
    }
}

pub fn book_cards(books: &[BookPreview]) -> Markup {
    html! {
        .container {
            @if books.is_empty() {
                p .text-center.text-body-secondary { "No books here yet." }
            }
            .row.row-cols-auto.justify-content-center.justify-content-md-start {
                @for book in books {
                    (book_card(book, None))
                }
            }
        }
    }
}

pub fn order_select(base: &str, current: BookOrder) -> Markup {
    html! {
        form .d-flex.justify-content-end."mb-3" method="GET" action=(base) {
            label .col-form-label."me-2" for="orderBy" { "Sort By" }
            select .form-select.w-auto."me-2" #orderBy name="order_by" {
                @for order in BookOrder::variants() {
                    option value=(order.serialized()) selected[*order == current] {
                        (order.label())
                    }
                }
            }
            input type="submit" .btn.btn-secondary value="Sort";
        }
    }
}

pub fn pagination(base: &str, order: BookOrder, pages: &Pagination) -> Markup {
    let link = |page: i64| format!("{base}?page={page}&order_by={}", order.serialized());

    html! {
        @if pages.pages() > 1 {
            nav aria-label="Book pages" {
                ul .pagination.justify-content-center {
                    @if pages.has_previous() {
                        li .page-item { a .page-link href=(link(1)) { "First" } }
                        li .page-item { a .page-link href=(link(pages.page - 1)) { "Previous" } }
                    }
                    li .page-item.active aria-current="page" {
                        span .page-link { (format!("Page {} of {}", pages.page, pages.pages())) }
                    }
                    @if pages.has_next() {
                        li .page-item { a .page-link href=(link(pages.page + 1)) { "Next" } }
                        li .page-item { a .page-link href=(link(pages.pages())) { "Last" } }
                    }
                }
            }
        }
    }
}

fn field_error(errors: &FieldErrors, field: &str) -> Markup {
    html! {
        @if let Some(error) = errors.get(field) {
            .invalid-feedback.d-block { (error) }
        }
    }
}

fn text_input(
    id: &'static str,
    label: &str,
    value: &str,
    errors: &FieldErrors,
    required: bool,
) -> Markup {
    let invalid = errors.contains_key(id);
    html! {
        .form-floating."mb-2" {
            input .form-control.is-invalid[invalid] required[required] #(id) name=(id) type="text"
                placeholder=(label) value=(value);
            label for=(id) { (label) }
            (field_error(errors, id))
        }
    }
}

fn image_input(current: &str, errors: &FieldErrors) -> Markup {
    html! {
        .text-center.d-flex.flex-column."mb-2" {
            label for="imageInput" .form-label { "Image:" }
            div {
                img .img-fluid."mb-2" #imagePreview style="height:300px;" alt="Current image"
                    src=(media::url(current));
            }
            input .form-control.is-invalid[errors.contains_key("image")] accept="image/*"
                type="file" name="image" #imageInput;
            (field_error(errors, "image"))
            script {
                (maud::PreEscaped(r#"
                    imagePreview = document.getElementById("imagePreview")
                    imageInput = document.getElementById("imageInput")

                    imageInput.onchange = evt => {
                        const [file] = imageInput.files
                        if (file) {
                            imagePreview.src = URL.createObjectURL(file)
                        }
                    }
                "#))
            }
        }
    }
}

pub fn book_form(
    details: &BookFields,
    current_image: &str,
    errors: &FieldErrors,
    submit: &str,
) -> Markup {
    html! { form .container-sm.align-items-center method="POST" enctype="multipart/form-data" .mt-2 {
        (image_input(current_image, errors))
        (text_input("title", "Title", &details.title, errors, true))
        (text_input("author", "Author", &details.author, errors, true))
        (text_input("language", "Language", &details.language, errors, true))
        (text_input("genre", "Genre", &details.genre, errors, true))
        .form-floating."mb-2" {
            textarea .form-control.is-invalid[errors.contains_key("description")] required
                placeholder="Book description" #description style="height: 150px" name="description" {
                (details.description)
            }
            label for="description" { "Description" }
            (field_error(errors, "description"))
        }
        .form-floating."mb-2" {
            input .form-control.is-invalid[errors.contains_key("posted")] #posted name="posted"
                type="datetime-local" value=(details.posted);
            label for="posted" { "Posted on (UTC, optional)" }
            (field_error(errors, "posted"))
        }
        input type="submit" .btn.btn-primary value=(submit);
    } }
}

pub fn profile_form(
    user: &User,
    details: &ProfileFields,
    errors: &FieldErrors,
) -> Markup {
    html! { form .container-sm.align-items-center method="POST" enctype="multipart/form-data" .mt-2 {
        (image_input(&user.image, errors))
        .form-floating."mb-2" {
            input .form-control.is-invalid[errors.contains_key("email")] required #email name="email"
                type="email" placeholder="Email" value=(details.email);
            label for="email" { "Email" }
            .form-text { "Email must be unique. Include '@' in email address." }
            (field_error(errors, "email"))
        }
        (text_input("first_name", "First name", &details.first_name, errors, false))
        (text_input("last_name", "Last name", &details.last_name, errors, false))
        input type="submit" .btn.btn-primary value="Update";
    } }
}

#[cfg(test)]
mod test {
    use super::{author_url, genre_url};

    #[test]
    fn free_text_urls() {
        assert_eq!(author_url("Gordon Ramsay"), "/books/author/Gordon%20Ramsay");
        assert_eq!(author_url("AC/DC?"), "/books/author/AC%2FDC%3F");
        assert_eq!(genre_url("Comedy"), "/books/genre/Comedy");
    }
}
