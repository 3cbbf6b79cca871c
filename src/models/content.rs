//! Tenant-scoped deletes for every table in the teardown registry.
//!
//! Every statement deletes by filter on the website id, so re-running a step
//! after a partial teardown deletes whatever is left and nothing else. Which
//! filter a table gets is decided by [`Table::filter`].

use crate::models::schema::*;
use crate::teardown::registry::{DeleteFilter, Table};
use diesel::prelude::*;
use diesel::result::Error as DieselError;
use uuid::Uuid;

pub fn delete_for_website(
    conn: &mut PgConnection,
    table: Table,
    website_id: Uuid,
) -> QueryResult<usize> {
    match table.filter() {
        DeleteFilter::Website => delete_by_website_column(conn, table, website_id),
        DeleteFilter::Parent(parent) => delete_through_parent(conn, table, parent, website_id),
    }
}

fn unmapped(table: Table, filter: DeleteFilter) -> DieselError {
    DieselError::QueryBuilderError(
        format!("no delete statement for {} with {:?}", table.table_name(), filter).into(),
    )
}

/// `<fk> IN (SELECT id FROM <parent> WHERE website_id = $1)`.
fn delete_through_parent(
    conn: &mut PgConnection,
    table: Table,
    parent: Table,
    website_id: Uuid,
) -> QueryResult<usize> {
    match (table, parent) {
        (Table::AiMessages, Table::AiThreads) => {
            let threads = ai_threads::table
                .filter(ai_threads::website_id.eq(website_id))
                .select(ai_threads::id);
            diesel::delete(ai_messages::table.filter(ai_messages::thread_id.eq_any(threads)))
                .execute(conn)
        }
        (Table::WordpressComments, Table::WordpressPosts) => {
            let posts = wordpress_posts::table
                .filter(wordpress_posts::website_id.eq(website_id))
                .select(wordpress_posts::id);
            diesel::delete(
                wordpress_comments::table.filter(wordpress_comments::post_id.eq_any(posts)),
            )
            .execute(conn)
        }
        (Table::WordpressReviews, Table::WordpressProducts) => {
            let products = wordpress_products::table
                .filter(wordpress_products::website_id.eq(website_id))
                .select(wordpress_products::id);
            diesel::delete(
                wordpress_reviews::table.filter(wordpress_reviews::product_id.eq_any(products)),
            )
            .execute(conn)
        }
        _ => Err(unmapped(table, DeleteFilter::Parent(parent))),
    }
}

fn delete_by_website_column(
    conn: &mut PgConnection,
    table: Table,
    website_id: Uuid,
) -> QueryResult<usize> {
    match table {
        Table::PopupQuestions => diesel::delete(
            popup_questions::table.filter(popup_questions::website_id.eq(website_id)),
        )
        .execute(conn),
        Table::AccessKeys => {
            diesel::delete(access_keys::table.filter(access_keys::website_id.eq(website_id)))
                .execute(conn)
        }
        Table::AiThreads => {
            diesel::delete(ai_threads::table.filter(ai_threads::website_id.eq(website_id)))
                .execute(conn)
        }
        Table::VectorConfigs => diesel::delete(
            vector_db_configs::table.filter(vector_db_configs::website_id.eq(website_id)),
        )
        .execute(conn),

        Table::ShopifyComments => diesel::delete(
            shopify_comments::table.filter(shopify_comments::website_id.eq(website_id)),
        )
        .execute(conn),
        Table::ShopifyBlogPosts => diesel::delete(
            shopify_blog_posts::table.filter(shopify_blog_posts::website_id.eq(website_id)),
        )
        .execute(conn),
        Table::ShopifyBlogs => {
            diesel::delete(shopify_blogs::table.filter(shopify_blogs::website_id.eq(website_id)))
                .execute(conn)
        }
        Table::ShopifyReviews => diesel::delete(
            shopify_reviews::table.filter(shopify_reviews::website_id.eq(website_id)),
        )
        .execute(conn),
        Table::ShopifyMedia => {
            diesel::delete(shopify_media::table.filter(shopify_media::website_id.eq(website_id)))
                .execute(conn)
        }
        Table::ShopifyVariants => diesel::delete(
            shopify_variants::table.filter(shopify_variants::website_id.eq(website_id)),
        )
        .execute(conn),
        Table::ShopifyProducts => diesel::delete(
            shopify_products::table.filter(shopify_products::website_id.eq(website_id)),
        )
        .execute(conn),
        Table::ShopifyDiscounts => diesel::delete(
            shopify_discounts::table.filter(shopify_discounts::website_id.eq(website_id)),
        )
        .execute(conn),
        Table::ShopifyPages => {
            diesel::delete(shopify_pages::table.filter(shopify_pages::website_id.eq(website_id)))
                .execute(conn)
        }

        Table::WordpressCustomFields => diesel::delete(
            wordpress_custom_fields::table
                .filter(wordpress_custom_fields::website_id.eq(website_id)),
        )
        .execute(conn),
        Table::WordpressCategories => diesel::delete(
            wordpress_categories::table.filter(wordpress_categories::website_id.eq(website_id)),
        )
        .execute(conn),
        Table::WordpressTags => {
            diesel::delete(wordpress_tags::table.filter(wordpress_tags::website_id.eq(website_id)))
                .execute(conn)
        }
        Table::WordpressMedia => diesel::delete(
            wordpress_media::table.filter(wordpress_media::website_id.eq(website_id)),
        )
        .execute(conn),
        Table::WordpressAuthors => diesel::delete(
            wordpress_authors::table.filter(wordpress_authors::website_id.eq(website_id)),
        )
        .execute(conn),
        Table::WordpressPosts => diesel::delete(
            wordpress_posts::table.filter(wordpress_posts::website_id.eq(website_id)),
        )
        .execute(conn),
        Table::WordpressPages => diesel::delete(
            wordpress_pages::table.filter(wordpress_pages::website_id.eq(website_id)),
        )
        .execute(conn),
        Table::WordpressProducts => diesel::delete(
            wordpress_products::table.filter(wordpress_products::website_id.eq(website_id)),
        )
        .execute(conn),

        Table::Websites => {
            diesel::delete(websites::table.filter(websites::id.eq(website_id))).execute(conn)
        }
        Table::AiMessages | Table::WordpressComments | Table::WordpressReviews => {
            Err(unmapped(table, DeleteFilter::Website))
        }
    }
}
