//! Likes and favourites.
//!
//! Both relations are sets of `(profile, book)` pairs: adding a pair twice
//! leaves a single row.

use diesel::{dsl::exists, prelude::*};
use diesel_async::{
    scoped_futures::ScopedFutureExt, AsyncConnection, AsyncPgConnection, RunQueryDsl,
};
use uuid::Uuid;

use crate::{
    models::{BookFavourite, BookLike},
    schema::{book, bookfavourite, booklike},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Relation {
    Like,
    Favourite,
}

pub async fn add(
    conn: &mut AsyncPgConnection,
    relation: Relation,
    profile: Uuid,
    book: i64,
) -> QueryResult<()> {
    match relation {
        Relation::Like => {
            diesel::insert_into(booklike::table)
                .values(&BookLike { profile, book })
                .on_conflict_do_nothing()
                .execute(conn)
                .await?
        }
        Relation::Favourite => {
            diesel::insert_into(bookfavourite::table)
                .values(&BookFavourite { profile, book })
                .on_conflict_do_nothing()
                .execute(conn)
                .await?
        }
    };

    Ok(())
}

/// Returns whether the pair was present.
pub async fn remove(
    conn: &mut AsyncPgConnection,
    relation: Relation,
    profile: Uuid,
    book: i64,
) -> QueryResult<bool> {
    let deleted = match relation {
        Relation::Like => {
            diesel::delete(
                booklike::table
                    .filter(booklike::profile.eq(profile))
                    .filter(booklike::book.eq(book)),
            )
            .execute(conn)
            .await?
        }
        Relation::Favourite => {
            diesel::delete(
                bookfavourite::table
                    .filter(bookfavourite::profile.eq(profile))
                    .filter(bookfavourite::book.eq(book)),
            )
            .execute(conn)
            .await?
        }
    };

    Ok(deleted != 0)
}

pub async fn contains(
    conn: &mut AsyncPgConnection,
    relation: Relation,
    profile: Uuid,
    book: i64,
) -> QueryResult<bool> {
    match relation {
        Relation::Like => {
            diesel::select(exists(
                booklike::table
                    .filter(booklike::profile.eq(profile))
                    .filter(booklike::book.eq(book)),
            ))
            .get_result(conn)
            .await
        }
        Relation::Favourite => {
            diesel::select(exists(
                bookfavourite::table
                    .filter(bookfavourite::profile.eq(profile))
                    .filter(bookfavourite::book.eq(book)),
            ))
            .get_result(conn)
            .await
        }
    }
}

/// Removes the pair if present, adds it otherwise. Returns whether the pair
/// is present afterwards.
///
/// Toggles of the same book are serialised by locking the book row, so two
/// concurrent toggles always cancel out.
pub async fn toggle(
    conn: &mut AsyncPgConnection,
    relation: Relation,
    profile: Uuid,
    book_id: i64,
) -> QueryResult<bool> {
    conn.transaction::<_, diesel::result::Error, _>(|c| {
        async move {
            book::table
                .find(book_id)
                .select(book::id)
                .for_update()
                .get_result::<i64>(c)
                .await?;

            if remove(c, relation, profile, book_id).await? {
                Ok(false)
            } else {
                add(c, relation, profile, book_id).await?;
                Ok(true)
            }
        }
        .scope_boxed()
    })
    .await
}

#[cfg(test)]
mod test {
    use super::{add, contains, toggle, Relation};
    use crate::{
        ranking::like_count,
        testing::{create_book, create_user, test_database},
    };

    #[test]
    fn duplicate_like_counts_once() {
        let Some(db) = test_database(1) else {
            return;
        };

        db.runtime.block_on(async {
            let mut conn = db.pool.get().await.unwrap();
            let reader = create_user(&mut conn, "reader").await;
            let book = create_book(&mut conn, reader.id, "Dune").await;

            add(&mut conn, Relation::Like, reader.id, book.id).await.unwrap();
            add(&mut conn, Relation::Like, reader.id, book.id).await.unwrap();
            assert_eq!(like_count(&mut conn, book.id).await.unwrap(), 1);

            // Favourites are a separate relation
            assert!(!contains(&mut conn, Relation::Favourite, reader.id, book.id)
                .await
                .unwrap());
        });
    }

    #[test]
    fn toggling() {
        let Some(db) = test_database(1) else {
            return;
        };

        db.runtime.block_on(async {
            let mut conn = db.pool.get().await.unwrap();
            let reader = create_user(&mut conn, "reader").await;
            let book = create_book(&mut conn, reader.id, "Dune").await;

            assert!(toggle(&mut conn, Relation::Favourite, reader.id, book.id)
                .await
                .unwrap());
            assert!(contains(&mut conn, Relation::Favourite, reader.id, book.id)
                .await
                .unwrap());

            assert!(!toggle(&mut conn, Relation::Favourite, reader.id, book.id)
                .await
                .unwrap());
            assert!(!contains(&mut conn, Relation::Favourite, reader.id, book.id)
                .await
                .unwrap());

            assert!(matches!(
                toggle(&mut conn, Relation::Like, reader.id, book.id + 1).await,
                Err(diesel::result::Error::NotFound)
            ));
        });
    }

    #[test]
    fn concurrent_toggles_cancel_out() {
        let Some(db) = test_database(4) else {
            return;
        };

        db.runtime.block_on(async {
            let mut conn = db.pool.get().await.unwrap();
            let reader = create_user(&mut conn, "reader").await;
            let book = create_book(&mut conn, reader.id, "Dune").await;
            let (profile, book) = (reader.id, book.id);

            let toggles: Vec<_> = (0..2)
                .map(|_| {
                    let pool = db.pool.clone();
                    tokio::spawn(async move {
                        let mut conn = pool.get().await.unwrap();
                        toggle(&mut conn, Relation::Like, profile, book)
                            .await
                            .unwrap()
                    })
                })
                .collect();

            let mut added = Vec::new();
            for t in toggles {
                added.push(t.await.unwrap());
            }
            added.sort();

            assert_eq!(added, vec![false, true]);
            assert_eq!(like_count(&mut conn, book).await.unwrap(), 0);
        });
    }
}
