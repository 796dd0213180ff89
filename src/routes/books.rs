use axum::extract::{Path, Query};
use diesel::{pg::Pg, prelude::*};
use diesel_async::RunQueryDsl;
use maud::html;
use uuid::Uuid;

use crate::{
    models::{BookPreview, User},
    schema::{book, bookfavourite, users},
    State,
};

use super::{
    app_page,
    components::{author_url, book_cards, genre_url, order_select, pagination, path_segment},
    flash_alert, Flash, MaybeUser, Page, RouteError,
};

diesel::define_sql_function! {
    fn lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub(crate) enum BookOrder {
    #[default]
    Newest,
    Oldest,
    Title,
    Author,
    Language,
}

impl BookOrder {
    pub fn variants() -> &'static [Self] {
        &[
            Self::Newest,
            Self::Oldest,
            Self::Title,
            Self::Author,
            Self::Language,
        ]
    }

    pub fn serialized(&self) -> &'static str {
        match self {
            BookOrder::Newest => "-posted",
            BookOrder::Oldest => "posted",
            BookOrder::Title => "title",
            BookOrder::Author => "author",
            BookOrder::Language => "language",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookOrder::Newest => "Date added (newest)",
            BookOrder::Oldest => "Date added (oldest)",
            BookOrder::Title => "Title",
            BookOrder::Author => "Author",
            BookOrder::Language => "Language",
        }
    }

    /// Unknown orderings fall back to the newest books first.
    pub fn parse(value: Option<&str>) -> Self {
        value
            .and_then(|v| Self::variants().iter().find(|o| o.serialized() == v))
            .copied()
            .unwrap_or_default()
    }

    fn apply<'a>(&self, query: book::BoxedQuery<'a, Pg>) -> book::BoxedQuery<'a, Pg> {
        match self {
            BookOrder::Newest => query.order((book::posted.desc(), book::id.desc())),
            BookOrder::Oldest => query.order((book::posted.asc(), book::id.asc())),
            BookOrder::Title => query.order((book::title.asc(), book::id.asc())),
            BookOrder::Author => query.order((book::author.asc(), book::id.asc())),
            BookOrder::Language => query.order((book::language.asc(), book::id.asc())),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

impl Pagination {
    /// Returns `None` when the requested page does not exist. The first page
    /// always exists, even for an empty list.
    pub fn new(requested: Option<i64>, per_page: i64, total: i64) -> Option<Self> {
        let per_page = per_page.max(1);
        let page = requested.unwrap_or(1);
        let pages = Self::page_count(per_page, total);

        (1..=pages).contains(&page).then_some(Self {
            page,
            per_page,
            total,
        })
    }

    fn page_count(per_page: i64, total: i64) -> i64 {
        ((total + per_page - 1) / per_page).max(1)
    }

    pub fn pages(&self) -> i64 {
        Self::page_count(self.per_page, self.total)
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages()
    }
}

pub(crate) enum BookFilter {
    All,
    Author(String),
    Genre(String),
    Owner(Uuid),
    OwnerName(String),
    FavouritedBy(Uuid),
}

impl BookFilter {
    fn query(&self) -> book::BoxedQuery<'_, Pg> {
        let query = book::table.into_boxed();
        match self {
            BookFilter::All => query,
            BookFilter::Author(author) => query.filter(book::author.eq(author)),
            BookFilter::Genre(genre) => query.filter(lower(book::genre).eq(genre.to_lowercase())),
            BookFilter::Owner(owner) => query.filter(book::owner.eq(*owner)),
            BookFilter::OwnerName(name) => query.filter(
                book::owner.eq_any(
                    users::table
                        .filter(users::name.eq(name))
                        .select(users::id),
                ),
            ),
            BookFilter::FavouritedBy(profile) => query.filter(
                book::id.eq_any(
                    bookfavourite::table
                        .filter(bookfavourite::profile.eq(*profile))
                        .select(bookfavourite::book),
                ),
            ),
        }
    }
}

#[derive(serde::Deserialize, Debug, Default)]
pub(crate) struct ListQuery {
    page: Option<i64>,
    order_by: Option<String>,
    flash: Option<Flash>,
}

struct Listing<'a> {
    page: Option<Page>,
    title: String,
    base: String,
    filter: BookFilter,
    user: Option<&'a User>,
}

async fn book_list(
    state: &State,
    listing: Listing<'_>,
    query: ListQuery,
) -> Result<maud::Markup, RouteError> {
    let mut conn = state.db.get().await?;

    let order = BookOrder::parse(query.order_by.as_deref());

    let total: i64 = listing
        .filter
        .query()
        .count()
        .get_result(&mut conn)
        .await?;

    let pages = Pagination::new(query.page, state.config.pagination.per_page, total)
        .ok_or(RouteError::NotFound)?;

    let books: Vec<BookPreview> = order
        .apply(listing.filter.query())
        .select(BookPreview::as_select())
        .limit(pages.per_page)
        .offset(pages.offset())
        .load(&mut conn)
        .await?;

    Ok(app_page(
        listing.page,
        listing.user,
        html! {
            (flash_alert(query.flash.map(|f| f.message(None))))
            .container {
                h2 .text-center { (listing.title) }
                (order_select(&listing.base, order))
            }
            (book_cards(&books))
            (pagination(&listing.base, order, &pages))
        },
    ))
}

pub(crate) async fn all_books(
    state: State,
    MaybeUser(user): MaybeUser,
    Query(query): Query<ListQuery>,
) -> Result<maud::Markup, RouteError> {
    book_list(
        &state,
        Listing {
            page: Some(Page::Books),
            title: "All books".into(),
            base: Page::Books.location().into(),
            filter: BookFilter::All,
            user: user.as_ref(),
        },
        query,
    )
    .await
}

pub(crate) async fn my_books(
    state: State,
    user: User,
    Query(query): Query<ListQuery>,
) -> Result<maud::Markup, RouteError> {
    book_list(
        &state,
        Listing {
            page: Some(Page::MyBooks),
            title: "My books".into(),
            base: Page::MyBooks.location().into(),
            filter: BookFilter::Owner(user.id),
            user: Some(&user),
        },
        query,
    )
    .await
}

pub(crate) async fn favourite_books(
    state: State,
    user: User,
    Query(query): Query<ListQuery>,
) -> Result<maud::Markup, RouteError> {
    book_list(
        &state,
        Listing {
            page: Some(Page::Favourites),
            title: "My favourites".into(),
            base: Page::Favourites.location().into(),
            filter: BookFilter::FavouritedBy(user.id),
            user: Some(&user),
        },
        query,
    )
    .await
}

pub(crate) async fn author_books(
    state: State,
    MaybeUser(user): MaybeUser,
    Path(author): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<maud::Markup, RouteError> {
    book_list(
        &state,
        Listing {
            page: None,
            title: format!("Books by {author}"),
            base: author_url(&author),
            filter: BookFilter::Author(author),
            user: user.as_ref(),
        },
        query,
    )
    .await
}

pub(crate) async fn genre_books(
    state: State,
    MaybeUser(user): MaybeUser,
    Path(genre): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<maud::Markup, RouteError> {
    book_list(
        &state,
        Listing {
            page: None,
            title: format!("Genre: {genre}"),
            base: genre_url(&genre),
            filter: BookFilter::Genre(genre),
            user: user.as_ref(),
        },
        query,
    )
    .await
}

pub(crate) async fn profile_books(
    state: State,
    user: User,
    Path(name): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<maud::Markup, RouteError> {
    book_list(
        &state,
        Listing {
            page: None,
            title: format!("Books posted by {name}"),
            base: format!("/books/profile/{}", path_segment(&name)),
            filter: BookFilter::OwnerName(name),
            user: Some(&user),
        },
        query,
    )
    .await
}

#[cfg(test)]
mod test {
    use super::{BookOrder, Pagination};

    #[test]
    fn order_parsing() {
        assert_eq!(BookOrder::parse(None), BookOrder::Newest);
        assert_eq!(BookOrder::parse(Some("posted")), BookOrder::Oldest);
        assert_eq!(BookOrder::parse(Some("language")), BookOrder::Language);
        assert_eq!(BookOrder::parse(Some("; DROP TABLE book")), BookOrder::Newest);

        for order in BookOrder::variants() {
            assert_eq!(BookOrder::parse(Some(order.serialized())), *order);
        }
    }

    #[test]
    fn pages() {
        let pages = Pagination::new(None, 2, 5).unwrap();
        assert_eq!(pages.page, 1);
        assert_eq!(pages.pages(), 3);
        assert_eq!(pages.offset(), 0);
        assert!(!pages.has_previous());
        assert!(pages.has_next());

        let last = Pagination::new(Some(3), 2, 5).unwrap();
        assert_eq!(last.offset(), 4);
        assert!(last.has_previous());
        assert!(!last.has_next());
    }

    #[test]
    fn missing_pages() {
        assert_eq!(Pagination::new(Some(4), 2, 5), None);
        assert_eq!(Pagination::new(Some(0), 2, 5), None);
        assert_eq!(Pagination::new(Some(-1), 2, 5), None);
    }

    #[test]
    fn empty_list_has_one_page() {
        let pages = Pagination::new(None, 12, 0).unwrap();
        assert_eq!(pages.pages(), 1);
        assert!(!pages.has_next());
        assert_eq!(Pagination::new(Some(2), 12, 0), None);
    }
}
