//! In-memory doubles for the relational store and the vector index.
//!
//! `MemoryDb` enforces the same foreign keys as the Postgres schema: deleting
//! a parent row while children still point at it fails the whole phase, and
//! nothing from a failed phase is committed.

use crate::db::{DBConnection, DBError, PhaseReport};
use crate::models::access_keys::hash_access_key;
use crate::models::vector_configs::VectorIndexConfig;
use crate::models::websites::{Plan, Website};
use crate::teardown::registry::{DeleteFilter, Phase, Table};
use crate::teardown::vectors::LEGACY_WEBSITE_FIELD;
use crate::vector_index::{MetadataFilter, VectorIndex, VectorIndexError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Row {
    id: Uuid,
    /// The `website_id` column, absent on tables that only reach the website
    /// through their parent.
    website_id: Option<Uuid>,
    parent_id: Option<Uuid>,
    /// Website the row ultimately belongs to.
    owner: Uuid,
}

#[derive(Default)]
struct DbState {
    websites: HashMap<Uuid, Website>,
    rows: HashMap<Table, Vec<Row>>,
    key_hashes: HashMap<Uuid, String>,
    vector_configs: HashMap<Uuid, VectorIndexConfig>,
    failing_phase: Option<&'static str>,
    phase_runs: Vec<&'static str>,
    phase_delay: Duration,
    unavailable: bool,
}

#[derive(Default)]
pub struct MemoryDb {
    state: Mutex<DbState>,
}

fn fk_violation(parent: Table, child: Table) -> DBError {
    DBError::QueryError(DieselError::DatabaseError(
        DatabaseErrorKind::ForeignKeyViolation,
        Box::new(format!(
            "delete on {} violates foreign key from {}",
            parent.table_name(),
            child.table_name()
        )),
    ))
}

const SEEDED_TABLES: &[(Table, bool)] = &[
    // (table, has website_id column)
    (Table::PopupQuestions, true),
    (Table::AiThreads, true),
    (Table::AiMessages, false),
    (Table::ShopifyBlogs, true),
    (Table::ShopifyBlogPosts, true),
    (Table::ShopifyComments, true),
    (Table::ShopifyProducts, true),
    (Table::ShopifyReviews, true),
    (Table::ShopifyMedia, true),
    (Table::ShopifyVariants, true),
    (Table::ShopifyDiscounts, true),
    (Table::ShopifyPages, true),
    (Table::WordpressPosts, true),
    (Table::WordpressComments, false),
    (Table::WordpressCustomFields, true),
    (Table::WordpressProducts, true),
    (Table::WordpressReviews, false),
    (Table::WordpressCategories, true),
    (Table::WordpressTags, true),
    (Table::WordpressMedia, true),
    (Table::WordpressAuthors, true),
    (Table::WordpressPages, true),
];

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DbState> {
        self.state.lock().unwrap()
    }

    pub fn add_website(&self, plan: &str) -> Uuid {
        self.insert_website(plan, None, None, 5_000)
    }

    pub fn add_subscribed_website(
        &self,
        plan: &str,
        subscription_id: &str,
        renews_at: Option<DateTime<Utc>>,
        monthly_queries: i32,
    ) -> Uuid {
        self.insert_website(
            plan,
            Some(subscription_id.to_string()),
            renews_at,
            monthly_queries,
        )
    }

    fn insert_website(
        &self,
        plan: &str,
        subscription_id: Option<String>,
        renews_at: Option<DateTime<Utc>>,
        monthly_queries: i32,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let website = Website {
            id,
            name: "Test shop".to_string(),
            url: format!("https://{}.example.com", id.simple()),
            platform: "shopify".to_string(),
            plan: plan.to_string(),
            monthly_queries,
            query_count: 42,
            active: true,
            stripe_subscription_id: subscription_id,
            subscription_renews_at: renews_at,
            created_at: Utc::now(),
        };
        self.state().websites.insert(id, website);
        id
    }

    pub fn add_access_key(&self, website_id: Uuid, raw_key: &str) -> Uuid {
        let id = self.add_row(Table::AccessKeys, Some(website_id), None);
        self.state().key_hashes.insert(id, hash_access_key(raw_key));
        id
    }

    pub fn add_vector_config(&self, website_id: Uuid) {
        let config = VectorIndexConfig {
            id: Uuid::new_v4(),
            website_id,
            index_name: "sitechat".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.state().vector_configs.insert(website_id, config);
    }

    /// Inserts a row; `owner` comes from `website_id` or the parent row.
    pub fn add_row(&self, table: Table, website_id: Option<Uuid>, parent_id: Option<Uuid>) -> Uuid {
        let mut state = self.state();
        let owner = match (website_id, table.parent(), parent_id) {
            (Some(website_id), _, _) => website_id,
            (None, Some(parent), Some(parent_id)) => state
                .rows
                .get(&parent)
                .and_then(|rows| rows.iter().find(|r| r.id == parent_id))
                .map(|r| r.owner)
                .expect("parent row must exist"),
            _ => panic!("{} row needs a website or parent", table.table_name()),
        };
        let id = Uuid::new_v4();
        state.rows.entry(table).or_default().push(Row {
            id,
            website_id,
            parent_id,
            owner,
        });
        id
    }

    /// One row in every content table, wired to real parents.
    pub fn seed_full_tenant(&self, website_id: Uuid) {
        let mut parents: HashMap<Table, Uuid> = HashMap::new();
        self.add_access_key(website_id, &format!("key-{}", Uuid::new_v4()));
        for (table, has_website_column) in SEEDED_TABLES {
            let parent_id = table.parent().map(|p| parents[&p]);
            let website = has_website_column.then_some(website_id);
            let id = self.add_row(*table, website, parent_id);
            parents.insert(*table, id);
        }
    }

    pub fn count(&self, table: Table, website_id: Uuid) -> usize {
        self.state()
            .rows
            .get(&table)
            .map(|rows| rows.iter().filter(|r| r.owner == website_id).count())
            .unwrap_or(0)
    }

    pub fn children_of(&self, table: Table, parent_id: Uuid) -> usize {
        self.state()
            .rows
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.parent_id == Some(parent_id))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Rows in any table that still belong to the website, including its
    /// vector config.
    pub fn rows_referencing(&self, website_id: Uuid) -> usize {
        let state = self.state();
        let rows: usize = state
            .rows
            .values()
            .map(|rows| rows.iter().filter(|r| r.owner == website_id).count())
            .sum();
        rows + usize::from(state.vector_configs.contains_key(&website_id))
    }

    pub fn fail_phase(&self, phase: Option<&'static str>) {
        self.state().failing_phase = phase;
    }

    pub fn set_phase_delay(&self, delay: Duration) {
        self.state().phase_delay = delay;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    pub fn phase_runs(&self) -> Vec<&'static str> {
        self.state().phase_runs.clone()
    }

    fn check_available(&self) -> Result<(), DBError> {
        if self.state().unavailable {
            Err(DBError::ConnectionError)
        } else {
            Ok(())
        }
    }
}

fn delete_rows(
    rows: &mut HashMap<Table, Vec<Row>>,
    table: Table,
    website_id: Uuid,
) -> Result<Vec<Uuid>, DBError> {
    let parent_ids: Vec<Uuid> = match table.filter() {
        DeleteFilter::Parent(parent) => rows
            .get(&parent)
            .map(|rs| {
                rs.iter()
                    .filter(|r| r.website_id == Some(website_id))
                    .map(|r| r.id)
                    .collect()
            })
            .unwrap_or_default(),
        DeleteFilter::Website => Vec::new(),
    };

    let matches = |r: &Row| match table.filter() {
        DeleteFilter::Website => r.website_id == Some(website_id),
        DeleteFilter::Parent(_) => r.parent_id.is_some_and(|p| parent_ids.contains(&p)),
    };

    let table_rows = rows.entry(table).or_default();
    let deleted: Vec<Uuid> = table_rows
        .iter()
        .filter(|r| matches(*r))
        .map(|r| r.id)
        .collect();
    table_rows.retain(|r| !matches(r));

    for (child, child_rows) in rows.iter() {
        if child.parent() == Some(table)
            && child_rows
                .iter()
                .any(|r| r.parent_id.is_some_and(|p| deleted.contains(&p)))
        {
            return Err(fk_violation(table, *child));
        }
    }
    Ok(deleted)
}

impl DBConnection for MemoryDb {
    fn get_website_by_id(&self, id: Uuid) -> Result<Option<Website>, DBError> {
        self.check_available()?;
        Ok(self.state().websites.get(&id).cloned())
    }

    fn get_website_by_access_key_hash(&self, key_hash: &str) -> Result<Option<Website>, DBError> {
        self.check_available()?;
        let state = self.state();
        let owner = state
            .rows
            .get(&Table::AccessKeys)
            .and_then(|rows| {
                rows.iter()
                    .find(|r| state.key_hashes.get(&r.id).map(String::as_str) == Some(key_hash))
            })
            .map(|r| r.owner);
        Ok(owner.and_then(|id| state.websites.get(&id).cloned()))
    }

    fn get_website_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Website>, DBError> {
        self.check_available()?;
        Ok(self
            .state()
            .websites
            .values()
            .find(|w| w.stripe_subscription_id.as_deref() == Some(subscription_id))
            .cloned())
    }

    fn downgrade_subscription(
        &self,
        subscription_id: &str,
        free_quota: i32,
    ) -> Result<usize, DBError> {
        self.check_available()?;
        let mut state = self.state();
        let mut touched = 0;
        for website in state.websites.values_mut() {
            if website.stripe_subscription_id.as_deref() == Some(subscription_id) {
                website.plan = Plan::Free.as_str().to_string();
                website.stripe_subscription_id = None;
                website.subscription_renews_at = None;
                website.monthly_queries = free_quota;
                touched += 1;
            }
        }
        Ok(touched)
    }

    fn set_subscription_renewal(
        &self,
        subscription_id: &str,
        renews_at: DateTime<Utc>,
    ) -> Result<usize, DBError> {
        self.check_available()?;
        let mut state = self.state();
        let mut touched = 0;
        for website in state.websites.values_mut() {
            if website.stripe_subscription_id.as_deref() == Some(subscription_id) {
                website.subscription_renews_at = Some(renews_at);
                touched += 1;
            }
        }
        Ok(touched)
    }

    fn get_vector_config(&self, website_id: Uuid) -> Result<Option<VectorIndexConfig>, DBError> {
        self.check_available()?;
        Ok(self.state().vector_configs.get(&website_id).cloned())
    }

    fn delete_vector_config(&self, website_id: Uuid) -> Result<usize, DBError> {
        self.check_available()?;
        Ok(usize::from(
            self.state().vector_configs.remove(&website_id).is_some(),
        ))
    }

    fn run_teardown_phase(&self, website_id: Uuid, phase: &Phase) -> Result<PhaseReport, DBError> {
        self.check_available()?;
        let delay = {
            let mut state = self.state();
            state.phase_runs.push(phase.name);
            if state.failing_phase == Some(phase.name) {
                return Err(DBError::PhaseTimeout {
                    phase: phase.name,
                    timeout: phase.timeout,
                });
            }
            state.phase_delay
        };
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut state = self.state();
        // Work on copies; only a fully successful phase is written back.
        let mut rows = state.rows.clone();
        let mut websites = state.websites.clone();
        let mut report = PhaseReport::new(phase.name);

        for table in phase.steps {
            let deleted = if *table == Table::Websites {
                let referenced = rows
                    .iter()
                    .find(|(_, rs)| rs.iter().any(|r| r.website_id == Some(website_id)))
                    .map(|(t, _)| *t);
                if let Some(child) = referenced {
                    return Err(fk_violation(Table::Websites, child));
                }
                if state.vector_configs.contains_key(&website_id) {
                    return Err(fk_violation(Table::Websites, Table::VectorConfigs));
                }
                usize::from(websites.remove(&website_id).is_some())
            } else {
                delete_rows(&mut rows, *table, website_id)?.len()
            };
            report.record(*table, deleted);
        }

        state.rows = rows;
        state.websites = websites;
        Ok(report)
    }
}

#[derive(Default)]
struct IndexState {
    legacy: Vec<(String, Uuid)>,
    namespaces: HashMap<String, Vec<String>>,
    fail_query: bool,
    fail_delete_all: bool,
    calls: usize,
    delete_all_calls: usize,
}

#[derive(Default)]
pub struct MemoryIndex {
    state: Mutex<IndexState>,
}

fn unavailable() -> VectorIndexError {
    VectorIndexError::Api {
        status: 503,
        message: "index unavailable".to_string(),
    }
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, IndexState> {
        self.state.lock().unwrap()
    }

    pub fn add_legacy(&self, website_id: Uuid, id: &str) {
        self.state().legacy.push((id.to_string(), website_id));
    }

    pub fn add_namespaced(&self, namespace: &str, id: &str) {
        self.state()
            .namespaces
            .entry(namespace.to_string())
            .or_default()
            .push(id.to_string());
    }

    pub fn legacy_ids_for(&self, website_id: Uuid) -> Vec<String> {
        self.state()
            .legacy
            .iter()
            .filter(|(_, owner)| *owner == website_id)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn namespace_len(&self, namespace: &str) -> usize {
        self.state()
            .namespaces
            .get(namespace)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn fail_query(&self, fail: bool) {
        self.state().fail_query = fail;
    }

    pub fn fail_delete_all(&self, fail: bool) {
        self.state().fail_delete_all = fail;
    }

    pub fn call_count(&self) -> usize {
        self.state().calls
    }

    pub fn delete_all_calls(&self) -> usize {
        self.state().delete_all_calls
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn query_ids(
        &self,
        namespace: Option<&str>,
        filter: MetadataFilter<'_>,
        top_k: u32,
    ) -> Result<Vec<String>, VectorIndexError> {
        let mut state = self.state();
        state.calls += 1;
        if state.fail_query {
            return Err(unavailable());
        }
        // Namespaced vectors carry no website metadata.
        if namespace.is_some() || filter.field != LEGACY_WEBSITE_FIELD {
            return Ok(Vec::new());
        }
        Ok(state
            .legacy
            .iter()
            .filter(|(_, owner)| owner.to_string() == filter.value)
            .take(top_k as usize)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn delete_ids(
        &self,
        namespace: Option<&str>,
        ids: &[String],
    ) -> Result<(), VectorIndexError> {
        let mut state = self.state();
        state.calls += 1;
        match namespace {
            None => state.legacy.retain(|(id, _)| !ids.contains(id)),
            Some(ns) => {
                if let Some(vectors) = state.namespaces.get_mut(ns) {
                    vectors.retain(|id| !ids.contains(id));
                }
            }
        }
        Ok(())
    }

    async fn delete_all(&self, namespace: &str) -> Result<(), VectorIndexError> {
        let mut state = self.state();
        state.calls += 1;
        state.delete_all_calls += 1;
        if state.fail_delete_all {
            return Err(unavailable());
        }
        state.namespaces.remove(namespace);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teardown::registry::{OWNED_CONTENT, WEBSITE_RECORD};

    static PARENT_FIRST: Phase = Phase {
        name: "parent_first",
        timeout: Duration::from_secs(1),
        steps: &[Table::ShopifyProducts, Table::ShopifyReviews],
    };

    #[test]
    fn test_parent_before_child_is_rejected_and_rolled_back() {
        let db = MemoryDb::new();
        let website = db.add_website("pro");
        let product = db.add_row(Table::ShopifyProducts, Some(website), None);
        db.add_row(Table::ShopifyReviews, Some(website), Some(product));

        let err = db.run_teardown_phase(website, &PARENT_FIRST).unwrap_err();
        assert!(matches!(
            err,
            DBError::QueryError(DieselError::DatabaseError(
                DatabaseErrorKind::ForeignKeyViolation,
                _
            ))
        ));
        assert_eq!(db.count(Table::ShopifyProducts, website), 1);
        assert_eq!(db.count(Table::ShopifyReviews, website), 1);
    }

    #[test]
    fn test_website_row_blocked_by_remaining_content() {
        let db = MemoryDb::new();
        let website = db.add_website("pro");
        db.add_row(Table::PopupQuestions, Some(website), None);

        assert!(db.run_teardown_phase(website, &WEBSITE_RECORD).is_err());
        assert!(db.get_website_by_id(website).unwrap().is_some());

        db.run_teardown_phase(website, &OWNED_CONTENT).unwrap();
        db.run_teardown_phase(website, &WEBSITE_RECORD).unwrap();
        assert!(db.get_website_by_id(website).unwrap().is_none());
    }

    #[test]
    fn test_access_key_lookup() {
        let db = MemoryDb::new();
        let website = db.add_website("pro");
        db.add_access_key(website, "sk_live_123");

        let found = db
            .get_website_by_access_key_hash(&hash_access_key("sk_live_123"))
            .unwrap();
        assert_eq!(found.map(|w| w.id), Some(website));
        assert!(db
            .get_website_by_access_key_hash(&hash_access_key("other"))
            .unwrap()
            .is_none());
    }
}
