use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, Statement, TransactionTrait, sea_query::OnConflict,
};

use crate::{
    entities::{comment, film},
    models::CatalogRecord,
};

/// Persistent films and their comments.
#[derive(Clone)]
pub struct FilmStore {
    db: DatabaseConnection,
}

impl FilmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Connectivity probe.
    pub async fn ping(&self) -> Result<(), DbErr> {
        self.db
            .execute(Statement::from_string(self.db.get_database_backend(), "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    pub async fn films_by_release_date(&self) -> Result<Vec<film::Model>, DbErr> {
        film::Entity::find()
            .order_by_asc(film::Column::ReleaseDate)
            .order_by_asc(film::Column::Id)
            .all(&self.db)
            .await
    }

    pub async fn film(&self, id: i32) -> Result<Option<film::Model>, DbErr> {
        film::Entity::find_by_id(id).one(&self.db).await
    }

    pub async fn film_by_external_id(&self, external_id: &str) -> Result<Option<film::Model>, DbErr> {
        film::Entity::find()
            .filter(film::Column::ExternalId.eq(external_id))
            .one(&self.db)
            .await
    }

    pub async fn has_films(&self) -> Result<bool, DbErr> {
        Ok(film::Entity::find().count(&self.db).await? > 0)
    }

    /// Deletes a film. Its comments go with it through the foreign key.
    pub async fn delete_film(&self, id: i32) -> Result<bool, DbErr> {
        let res = film::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn comment_count(&self, film_id: i32) -> Result<u64, DbErr> {
        comment::Entity::find()
            .filter(comment::Column::FilmId.eq(film_id))
            .count(&self.db)
            .await
    }

    /// Comments of a film, oldest first.
    pub async fn comments_for(&self, film_id: i32) -> Result<Vec<comment::Model>, DbErr> {
        comment::Entity::find()
            .filter(comment::Column::FilmId.eq(film_id))
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .all(&self.db)
            .await
    }

    pub async fn insert_comment(
        &self,
        film_id: i32,
        text: &str,
        created_at: i64,
    ) -> Result<comment::Model, DbErr> {
        let model = comment::ActiveModel {
            id: Default::default(),
            film_id: Set(film_id),
            text: Set(text.to_string()),
            created_at: Set(created_at),
        };
        let res = comment::Entity::insert(model).exec(&self.db).await?;

        comment::Entity::find_by_id(res.last_insert_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("comment {}", res.last_insert_id)))
    }

    /// Inserts or refreshes every record by external id in one transaction.
    /// Returns, per record, whether it was newly created. `last_synced_at` is
    /// bumped even when nothing else changed.
    pub async fn upsert_films(
        &self,
        records: &[CatalogRecord],
        synced_at: i64,
    ) -> Result<Vec<bool>, DbErr> {
        let txn = self.db.begin().await?;
        let mut created = Vec::with_capacity(records.len());

        for record in records {
            let existing = film::Entity::find()
                .filter(film::Column::ExternalId.eq(record.external_id.as_str()))
                .one(&txn)
                .await?;

            let model = film::ActiveModel {
                id: Default::default(),
                external_id: Set(record.external_id.clone()),
                title: Set(record.title.clone()),
                release_date: Set(record.release_date.to_string()),
                last_synced_at: Set(synced_at),
            };

            film::Entity::insert(model)
                .on_conflict(
                    OnConflict::column(film::Column::ExternalId)
                        .update_columns([
                            film::Column::Title,
                            film::Column::ReleaseDate,
                            film::Column::LastSyncedAt,
                        ])
                        .to_owned(),
                )
                .exec(&txn)
                .await?;

            created.push(existing.is_none());
        }

        txn.commit().await?;
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn store() -> FilmStore {
        FilmStore::new(db::connect_and_migrate("sqlite::memory:", 1).await.unwrap())
    }

    fn record(external_id: &str, title: &str, date: &str) -> CatalogRecord {
        CatalogRecord {
            external_id: external_id.to_string(),
            title: title.to_string(),
            release_date: date.parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn upsert_reports_created_then_updated() {
        let store = store().await;

        let first = store.upsert_films(&[record("1", "A New Hope", "1977-05-25")], 10).await.unwrap();
        assert_eq!(first, vec![true]);

        let second = store
            .upsert_films(
                &[record("1", "Star Wars", "1977-05-25"), record("2", "Empire", "1980-05-17")],
                20,
            )
            .await
            .unwrap();
        assert_eq!(second, vec![false, true]);

        let film = store.film_by_external_id("1").await.unwrap().unwrap();
        assert_eq!(film.title, "Star Wars");
        assert_eq!(film.last_synced_at, 20);
    }

    #[tokio::test]
    async fn films_come_back_in_release_order() {
        let store = store().await;
        store
            .upsert_films(
                &[
                    record("1", "Phantom Menace", "1999-05-19"),
                    record("2", "A New Hope", "1977-05-25"),
                    record("3", "Empire", "1980-05-17"),
                ],
                0,
            )
            .await
            .unwrap();

        let titles: Vec<_> =
            store.films_by_release_date().await.unwrap().into_iter().map(|f| f.title).collect();
        assert_eq!(titles, ["A New Hope", "Empire", "Phantom Menace"]);
    }

    #[tokio::test]
    async fn comments_are_ordered_and_cascade_with_their_film() {
        let store = store().await;
        store.upsert_films(&[record("1", "A New Hope", "1977-05-25")], 0).await.unwrap();
        let film = store.film_by_external_id("1").await.unwrap().unwrap();

        let a = store.insert_comment(film.id, "first", 100).await.unwrap();
        let b = store.insert_comment(film.id, "second", 100).await.unwrap();
        let c = store.insert_comment(film.id, "third", 200).await.unwrap();

        let ids: Vec<_> = store.comments_for(film.id).await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, [a.id, b.id, c.id]);
        assert_eq!(store.comment_count(film.id).await.unwrap(), 3);

        assert!(store.delete_film(film.id).await.unwrap());
        assert!(store.film(film.id).await.unwrap().is_none());
        assert!(store.comments_for(film.id).await.unwrap().is_empty());
        assert_eq!(store.comment_count(film.id).await.unwrap(), 0);
        assert!(!store.delete_film(film.id).await.unwrap());
    }

    #[tokio::test]
    async fn ping_succeeds_on_live_store() {
        let store = store().await;
        store.ping().await.unwrap();
        assert!(!store.has_films().await.unwrap());
    }
}
