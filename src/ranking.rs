//! Most-liked books.
//!
//! Books are ranked by the number of distinct profiles that liked them, most
//! liked first. Books with the same number of likes are ordered by ascending
//! id, so the oldest book wins a tie at the cut-off. The counting happens in
//! the database.

use std::collections::HashMap;

use diesel::{dsl::count_star, prelude::*};
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::{
    models::BookPreview,
    schema::{book, booklike},
};

/// Number of books shown on the recommendation page.
pub const RECOMMENDED_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankedBook {
    pub book: i64,
    pub likes: i64,
}

/// The `limit` most liked books, grouped and counted by the database.
pub async fn most_liked(
    conn: &mut AsyncPgConnection,
    limit: usize,
) -> QueryResult<Vec<RankedBook>> {
    let rows: Vec<(i64, i64)> = booklike::table
        .group_by(booklike::book)
        .select((booklike::book, count_star()))
        .order_by((count_star().desc(), booklike::book.asc()))
        .limit(limit as i64)
        .load(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(book, likes)| RankedBook { book, likes })
        .collect())
}

/// Puts `books` in the order of `ranking`, pairing each with its like count.
/// Ranked ids with no matching book are skipped.
pub fn in_rank_order<T, F>(ranking: &[RankedBook], books: Vec<T>, id: F) -> Vec<(T, i64)>
where
    F: Fn(&T) -> i64,
{
    let mut by_id: HashMap<i64, T> = books.into_iter().map(|b| (id(&b), b)).collect();

    ranking
        .iter()
        .filter_map(|r| by_id.remove(&r.book).map(|b| (b, r.likes)))
        .collect()
}

pub async fn recommended_books(
    conn: &mut AsyncPgConnection,
) -> QueryResult<Vec<(BookPreview, i64)>> {
    let ranking = most_liked(conn, RECOMMENDED_COUNT).await?;
    if ranking.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i64> = ranking.iter().map(|r| r.book).collect();
    let books: Vec<BookPreview> = book::table
        .filter(book::id.eq_any(&ids))
        .select(BookPreview::as_select())
        .load(conn)
        .await?;

    Ok(in_rank_order(&ranking, books, |b| b.id))
}

pub async fn like_count(conn: &mut AsyncPgConnection, book_id: i64) -> QueryResult<i64> {
    booklike::table
        .filter(booklike::book.eq(book_id))
        .count()
        .get_result(conn)
        .await
}

#[cfg(test)]
mod test {
    use std::collections::{HashMap, HashSet};

    use diesel::prelude::*;
    use diesel_async::RunQueryDsl;
    use expect_test::expect;
    use uuid::Uuid;

    use super::{in_rank_order, most_liked, recommended_books, RankedBook, RECOMMENDED_COUNT};
    use crate::{
        engagement::{self, Relation},
        schema::booklike,
        testing::{create_book, create_user, test_database},
    };

    /// Ranking of an in-memory like relation, the reference for [`most_liked`].
    /// Repeated `(profile, book)` pairs are counted once.
    fn rank_likes<I>(likes: I, limit: usize) -> Vec<RankedBook>
    where
        I: IntoIterator<Item = (Uuid, i64)>,
    {
        let pairs: HashSet<_> = likes.into_iter().collect();

        let mut counts = HashMap::<i64, i64>::new();
        for (_, book) in pairs {
            *counts.entry(book).or_default() += 1;
        }

        let mut ranked: Vec<_> = counts
            .into_iter()
            .map(|(book, likes)| RankedBook { book, likes })
            .collect();

        ranked.sort_unstable_by(|a, b| b.likes.cmp(&a.likes).then(a.book.cmp(&b.book)));
        ranked.truncate(limit);

        ranked
    }

    fn profiles(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    fn likes_for(book: i64, profiles: &[Uuid]) -> impl Iterator<Item = (Uuid, i64)> + '_ {
        profiles.iter().map(move |&p| (p, book))
    }

    #[test]
    fn empty() {
        assert!(rank_likes(Vec::new(), RECOMMENDED_COUNT).is_empty());
    }

    #[test]
    fn top_three_of_four() {
        let p = profiles(4);
        let likes: Vec<_> = likes_for(10, &p[..4])
            .chain(likes_for(11, &p[..3]))
            .chain(likes_for(12, &p[..2]))
            .chain(likes_for(13, &p[..1]))
            .collect();

        let actual = rank_likes(likes, RECOMMENDED_COUNT);
        let expected = expect![[r#"
            [
                RankedBook {
                    book: 10,
                    likes: 4,
                },
                RankedBook {
                    book: 11,
                    likes: 3,
                },
                RankedBook {
                    book: 12,
                    likes: 2,
                },
            ]
        "#]];

        expected.assert_debug_eq(&actual);
    }

    #[test]
    fn fewer_books_than_limit() {
        let p = profiles(2);
        let likes: Vec<_> = likes_for(7, &p[..1]).chain(likes_for(3, &p)).collect();

        assert_eq!(
            rank_likes(likes, RECOMMENDED_COUNT),
            vec![
                RankedBook { book: 3, likes: 2 },
                RankedBook { book: 7, likes: 1 },
            ]
        );
    }

    #[test]
    fn ties_prefer_lowest_id() {
        let p = profiles(2);
        let likes: Vec<_> = likes_for(40, &p)
            .chain(likes_for(30, &p))
            .chain(likes_for(20, &p))
            .chain(likes_for(10, &p))
            .collect();

        let ranked: Vec<_> = rank_likes(likes, RECOMMENDED_COUNT)
            .into_iter()
            .map(|r| r.book)
            .collect();

        assert_eq!(ranked, vec![10, 20, 30]);
    }

    #[test]
    fn duplicate_likes_count_once() {
        let p = profiles(2);
        let likes = vec![(p[0], 1), (p[0], 1), (p[0], 1), (p[1], 2), (p[1], 1)];

        assert_eq!(
            rank_likes(likes, RECOMMENDED_COUNT),
            vec![
                RankedBook { book: 1, likes: 2 },
                RankedBook { book: 2, likes: 1 },
            ]
        );
    }

    #[test]
    fn never_more_than_limit() {
        let p = profiles(1);
        let likes: Vec<_> = (0..50).map(|b| (p[0], b)).collect();

        let ranked = rank_likes(likes, RECOMMENDED_COUNT);
        assert_eq!(ranked.len(), RECOMMENDED_COUNT);
        assert!(ranked.windows(2).all(|w| w[0].likes >= w[1].likes));
    }

    #[test]
    fn rank_order_of_loaded_books() {
        let ranking = [
            RankedBook { book: 5, likes: 9 },
            RankedBook { book: 2, likes: 4 },
            RankedBook { book: 8, likes: 1 },
        ];
        // Book 8 was deleted between the two queries
        let books = vec![(2, "two"), (5, "five")];

        let ordered = in_rank_order(&ranking, books, |b| b.0);
        assert_eq!(ordered, vec![((5, "five"), 9), ((2, "two"), 4)]);
    }

    #[test]
    fn database_ranking() {
        let Some(db) = test_database(2) else {
            return;
        };

        db.runtime.block_on(async {
            let mut conn = db.pool.get().await.unwrap();

            let mut readers = Vec::new();
            for n in 0..4 {
                readers.push(create_user(&mut conn, &format!("reader{n}")).await);
            }

            let mut books = Vec::new();
            for title in ["A", "B", "C", "D", "E"] {
                books.push(create_book(&mut conn, readers[0].id, title).await.id);
            }

            // A: 4, B: 3, C and D: 2, E: 1
            let likes = [4, 3, 2, 2, 1];
            for (book, count) in books.iter().zip(likes) {
                for reader in &readers[..count] {
                    engagement::add(&mut conn, Relation::Like, reader.id, *book)
                        .await
                        .unwrap();
                    // Liking twice keeps a single like
                    engagement::add(&mut conn, Relation::Like, reader.id, *book)
                        .await
                        .unwrap();
                }
            }

            let pairs: Vec<(Uuid, i64)> = booklike::table
                .select((booklike::profile, booklike::book))
                .load(&mut conn)
                .await
                .unwrap();

            let ranked = most_liked(&mut conn, RECOMMENDED_COUNT).await.unwrap();
            assert_eq!(ranked, rank_likes(pairs, RECOMMENDED_COUNT));
            assert_eq!(
                ranked,
                vec![
                    RankedBook { book: books[0], likes: 4 },
                    RankedBook { book: books[1], likes: 3 },
                    RankedBook { book: books[2], likes: 2 },
                ]
            );

            let recommended: Vec<_> = recommended_books(&mut conn)
                .await
                .unwrap()
                .into_iter()
                .map(|(book, likes)| (book.title, likes))
                .collect();
            assert_eq!(
                recommended,
                vec![("A".to_owned(), 4), ("B".to_owned(), 3), ("C".to_owned(), 2)]
            );
        });
    }

    #[test]
    fn nothing_liked_recommends_nothing() {
        let Some(db) = test_database(1) else {
            return;
        };

        db.runtime.block_on(async {
            let mut conn = db.pool.get().await.unwrap();
            let owner = create_user(&mut conn, "owner").await;
            create_book(&mut conn, owner.id, "Unloved").await;

            assert!(recommended_books(&mut conn).await.unwrap().is_empty());
        });
    }
}
