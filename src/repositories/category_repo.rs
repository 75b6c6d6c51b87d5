//! PostgreSQL category store built on diesel_async.

use async_trait::async_trait;
use diesel::dsl::now;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::{Bool, Int4};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use futures::future::BoxFuture;
use tracing::debug;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult};
use crate::hierarchy::{ClosureClause, DescendantQuery, closure};
use crate::models::{Category, ClosureEdge, NewCategory, UpdateCategory};
use crate::repositories::{CategoryStore, CategoryTx};
use crate::schema::{categories, category_closure};

type ClosurePredicate =
    Box<dyn BoxableExpression<category_closure::table, Pg, SqlType = Bool>>;

/// Renders one clause as a boolean SQL expression over `category_closure`.
fn clause_predicate(clause: &ClosureClause) -> ClosurePredicate {
    use crate::schema::category_closure::dsl::*;

    match clause {
        ClosureClause::AncestorIn(ids) => Box::new(
            ancestor_id
                .eq_any(ids.clone())
                .and(ancestor_id.ne(descendant_id)),
        ),
        ClosureClause::IsRoot { excluding } => {
            let roots = categories::table
                .filter(categories::parent_id.is_null())
                .select(categories::id);
            let is_root = ancestor_id
                .eq(descendant_id)
                .and(descendant_id.eq_any(roots));
            if excluding.is_empty() {
                Box::new(is_root)
            } else {
                Box::new(is_root.and(descendant_id.ne_all(excluding.clone())))
            }
        }
        ClosureClause::AnyProper => Box::new(ancestor_id.ne(descendant_id)),
    }
}

/// Distinct live descendant ids for `query`, ascending.
fn descendant_ids_query(query: &DescendantQuery) -> category_closure::BoxedQuery<'static, Pg, Int4> {
    let live = categories::table
        .filter(categories::deleted_at.is_null())
        .select(categories::id);

    let mut statement = category_closure::table
        .select(category_closure::descendant_id)
        .distinct()
        .filter(category_closure::descendant_id.eq_any(live))
        .order(category_closure::descendant_id.asc())
        .into_boxed();

    let predicate = query
        .clauses()
        .iter()
        .map(clause_predicate)
        .reduce(|acc, next| -> ClosurePredicate { Box::new(acc.or(next)) });
    if let Some(predicate) = predicate {
        statement = statement.filter(predicate);
    }
    statement
}

async fn load_descendant_ids(
    conn: &mut AsyncPgConnection,
    query: &DescendantQuery,
) -> AppResult<Vec<i32>> {
    descendant_ids_query(query)
        .load::<i32>(conn)
        .await
        .map_err(AppError::from)
}

/// Category store holding an async connection pool.
///
/// `AsyncDbPool` is reference counted, so cloning the store is cheap.
#[derive(Clone)]
pub struct PgCategoryStore {
    pool: AsyncDbPool,
}

impl PgCategoryStore {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryStore for PgCategoryStore {
    async fn find_by_id(&self, category_id: i32) -> AppResult<Option<Category>> {
        use crate::schema::categories::dsl::*;
        let mut conn = self.pool.get().await?;

        categories
            .filter(id.eq(category_id))
            .select(Category::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(AppError::from)
    }

    async fn list_live(&self, offset: i64, limit: i64) -> AppResult<(Vec<Category>, i64)> {
        use crate::schema::categories::dsl::*;
        let mut conn = self.pool.get().await?;

        let page = categories
            .filter(deleted_at.is_null())
            .order(id.asc())
            .offset(offset)
            .limit(limit)
            .select(Category::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)?;

        let total = categories
            .filter(deleted_at.is_null())
            .count()
            .get_result::<i64>(&mut conn)
            .await
            .map_err(AppError::from)?;

        Ok((page, total))
    }

    async fn find_children(&self, parent: i32) -> AppResult<Vec<Category>> {
        use crate::schema::categories::dsl::*;
        let mut conn = self.pool.get().await?;

        categories
            .filter(parent_id.eq(parent))
            .filter(deleted_at.is_null())
            .order(id.asc())
            .select(Category::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)
    }

    async fn descendant_ids(&self, query: &DescendantQuery) -> AppResult<Vec<i32>> {
        let mut conn = self.pool.get().await?;
        load_descendant_ids(&mut conn, query).await
    }

    async fn soft_delete(&self, category_id: i32) -> AppResult<bool> {
        use crate::schema::categories::dsl::*;
        let mut conn = self.pool.get().await?;

        let affected = diesel::update(
            categories
                .filter(id.eq(category_id))
                .filter(deleted_at.is_null()),
        )
        .set(deleted_at.eq(now.nullable()))
        .execute(&mut conn)
        .await
        .map_err(AppError::from)?;

        Ok(affected > 0)
    }

    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.pool.get().await?;
        diesel::select(diesel::dsl::sql::<Int4>("1"))
            .get_result::<i32>(&mut conn)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    async fn transaction<T, F>(&self, work: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c mut dyn CategoryTx) -> BoxFuture<'c, AppResult<T>> + Send + 'static,
    {
        let mut conn = self.pool.get().await?;

        conn.transaction::<T, AppError, _>(|conn| {
            async move {
                let mut tx = PgCategoryTx { conn };
                work(&mut tx).await
            }
            .scope_boxed()
        })
        .await
    }

    async fn serializable_transaction<T, F>(&self, work: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c mut dyn CategoryTx) -> BoxFuture<'c, AppResult<T>> + Send + 'static,
    {
        let mut conn = self.pool.get().await?;

        // a losing transaction reports SQLSTATE 40001, mapped to AppError::Conflict
        conn.build_transaction()
            .serializable()
            .run::<T, AppError, _>(|conn| {
                async move {
                    let mut tx = PgCategoryTx { conn };
                    work(&mut tx).await
                }
                .scope_boxed()
            })
            .await
    }
}

/// Transaction-scoped view over a pooled connection.
pub struct PgCategoryTx<'c> {
    conn: &'c mut AsyncPgConnection,
}

#[async_trait]
impl CategoryTx for PgCategoryTx<'_> {
    async fn find_by_id(&mut self, category_id: i32) -> AppResult<Option<Category>> {
        use crate::schema::categories::dsl::*;

        categories
            .filter(id.eq(category_id))
            .select(Category::as_select())
            .first(&mut *self.conn)
            .await
            .optional()
            .map_err(AppError::from)
    }

    async fn find_by_ids(&mut self, ids: &[i32]) -> AppResult<Vec<Category>> {
        use crate::schema::categories::dsl::*;

        categories
            .filter(id.eq_any(ids.to_vec()))
            .filter(deleted_at.is_null())
            .select(Category::as_select())
            .load(&mut *self.conn)
            .await
            .map_err(AppError::from)
    }

    async fn insert(&mut self, category: NewCategory) -> AppResult<Category> {
        let created: Category = diesel::insert_into(categories::table)
            .values(&category)
            .returning(Category::as_returning())
            .get_result(&mut *self.conn)
            .await
            .map_err(AppError::from)?;

        let parent_chain = match created.parent_id {
            Some(parent_id) => self.ancestor_edges(parent_id).await?,
            None => Vec::new(),
        };
        let edges = closure::insert_edges(created.id, &parent_chain);
        diesel::insert_into(category_closure::table)
            .values(&edges)
            .execute(&mut *self.conn)
            .await
            .map_err(AppError::from)?;

        debug!(category_id = created.id, edges = edges.len(), "Inserted category");
        Ok(created)
    }

    async fn ancestor_edges(&mut self, category_id: i32) -> AppResult<Vec<ClosureEdge>> {
        use crate::schema::category_closure::dsl::*;

        category_closure
            .filter(descendant_id.eq(category_id))
            .select(ClosureEdge::as_select())
            .load(&mut *self.conn)
            .await
            .map_err(AppError::from)
    }

    async fn subtree_edges(&mut self, category_id: i32) -> AppResult<Vec<ClosureEdge>> {
        use crate::schema::category_closure::dsl::*;

        category_closure
            .filter(ancestor_id.eq(category_id))
            .select(ClosureEdge::as_select())
            .load(&mut *self.conn)
            .await
            .map_err(AppError::from)
    }

    async fn update(&mut self, category_id: i32, changes: UpdateCategory) -> AppResult<Category> {
        use crate::schema::categories::dsl::*;

        diesel::update(categories.filter(id.eq(category_id)))
            .set(&changes)
            .returning(Category::as_returning())
            .get_result(&mut *self.conn)
            .await
            .map_err(|e| match e {
                diesel::result::Error::NotFound => AppError::category_not_found(category_id),
                _ => AppError::from(e),
            })
    }

    async fn move_subtree(&mut self, category_id: i32, new_parent: Option<i32>) -> AppResult<()> {
        use crate::schema::category_closure::dsl::*;

        let subtree = self.subtree_edges(category_id).await?;
        let members: Vec<i32> = closure::subtree_ids(&subtree).into_iter().collect();

        let detached = diesel::delete(
            category_closure
                .filter(descendant_id.eq_any(members.clone()))
                .filter(ancestor_id.ne_all(members)),
        )
        .execute(&mut *self.conn)
        .await
        .map_err(AppError::from)?;

        let above = match new_parent {
            Some(parent) => self.ancestor_edges(parent).await?,
            None => Vec::new(),
        };
        let attached = closure::reparent_edges(&subtree, &above);
        if !attached.is_empty() {
            diesel::insert_into(category_closure)
                .values(&attached)
                .execute(&mut *self.conn)
                .await
                .map_err(AppError::from)?;
        }

        debug!(
            category_id,
            ?new_parent,
            detached,
            attached = attached.len(),
            "Moved category subtree"
        );
        Ok(())
    }

    async fn descendant_ids(&mut self, query: &DescendantQuery) -> AppResult<Vec<i32>> {
        load_descendant_ids(&mut *self.conn, query).await
    }
}
