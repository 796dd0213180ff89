use maud::html;

use crate::{ranking, State};

use super::{app_page, components::book_card, MaybeUser, Page, RouteError};

pub(crate) async fn recommended(
    state: State,
    MaybeUser(user): MaybeUser,
) -> Result<maud::Markup, RouteError> {
    let mut conn = state.db.get().await?;

    let books = ranking::recommended_books(&mut conn).await?;

    Ok(app_page(
        Some(Page::Recommended),
        user.as_ref(),
        html! {
            .container {
                h2 .text-center { "Most liked books" }
                @if books.is_empty() {
                    p .text-center.text-body-secondary { "Nobody liked a book yet." }
                }
                .row.row-cols-auto.justify-content-center {
                    @for (rank, (book, likes)) in books.iter().enumerate() {
                        (book_card(book, Some(html! {
                            span .fw-bold { (format!("#{}", rank + 1)) }
                            span {
                                i .bi.bi-heart-fill.text-danger.me-1 {}
                                (likes)
                            }
                        })))
                    }
                }
            }
        },
    ))
}
