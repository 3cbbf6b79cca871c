//! Static knowledge of everything a website owns and the order it has to be
//! deleted in.
//!
//! Foreign keys in the schema carry no `ON DELETE CASCADE`, so a child table
//! must always be emptied before its parent. The plan below is grouped into
//! phases; each phase is committed on its own transaction with its own budget.

use std::time::Duration;

/// Every table teardown touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    PopupQuestions,
    AccessKeys,
    AiMessages,
    AiThreads,
    VectorConfigs,

    ShopifyComments,
    ShopifyBlogPosts,
    ShopifyBlogs,
    ShopifyReviews,
    ShopifyMedia,
    ShopifyVariants,
    ShopifyProducts,
    ShopifyDiscounts,
    ShopifyPages,

    WordpressComments,
    WordpressReviews,
    WordpressCustomFields,
    WordpressCategories,
    WordpressTags,
    WordpressMedia,
    WordpressAuthors,
    WordpressPosts,
    WordpressPages,
    WordpressProducts,

    Websites,
}

/// How rows of a table are matched to the website being torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteFilter {
    /// `website_id = $1` (or `id = $1` for the websites table itself).
    Website,
    /// `<fk> IN (SELECT id FROM <parent> WHERE website_id = $1)` for tables
    /// that only reference the website through their parent.
    Parent(Table),
}

impl Table {
    pub const fn table_name(self) -> &'static str {
        match self {
            Table::PopupQuestions => "popup_questions",
            Table::AccessKeys => "access_keys",
            Table::AiMessages => "ai_messages",
            Table::AiThreads => "ai_threads",
            Table::VectorConfigs => "vector_db_configs",
            Table::ShopifyComments => "shopify_comments",
            Table::ShopifyBlogPosts => "shopify_blog_posts",
            Table::ShopifyBlogs => "shopify_blogs",
            Table::ShopifyReviews => "shopify_reviews",
            Table::ShopifyMedia => "shopify_media",
            Table::ShopifyVariants => "shopify_variants",
            Table::ShopifyProducts => "shopify_products",
            Table::ShopifyDiscounts => "shopify_discounts",
            Table::ShopifyPages => "shopify_pages",
            Table::WordpressComments => "wordpress_comments",
            Table::WordpressReviews => "wordpress_reviews",
            Table::WordpressCustomFields => "wordpress_custom_fields",
            Table::WordpressCategories => "wordpress_categories",
            Table::WordpressTags => "wordpress_tags",
            Table::WordpressMedia => "wordpress_media",
            Table::WordpressAuthors => "wordpress_authors",
            Table::WordpressPosts => "wordpress_posts",
            Table::WordpressPages => "wordpress_pages",
            Table::WordpressProducts => "wordpress_products",
            Table::Websites => "websites",
        }
    }

    /// The content table this one holds a foreign key into, if any.
    /// Every table except `websites` also references the website, directly
    /// or through this parent.
    pub const fn parent(self) -> Option<Table> {
        match self {
            Table::AiMessages => Some(Table::AiThreads),
            Table::ShopifyComments => Some(Table::ShopifyBlogPosts),
            Table::ShopifyBlogPosts => Some(Table::ShopifyBlogs),
            Table::ShopifyReviews | Table::ShopifyMedia | Table::ShopifyVariants => {
                Some(Table::ShopifyProducts)
            }
            Table::WordpressComments | Table::WordpressCustomFields => Some(Table::WordpressPosts),
            Table::WordpressReviews => Some(Table::WordpressProducts),
            _ => None,
        }
    }

    /// Whether rows carry the website id themselves (`websites` matches on
    /// its own `id`).
    pub const fn has_website_column(self) -> bool {
        !matches!(
            self,
            Table::AiMessages | Table::WordpressComments | Table::WordpressReviews
        )
    }

    pub const fn filter(self) -> DeleteFilter {
        match (self.has_website_column(), self.parent()) {
            (false, Some(parent)) => DeleteFilter::Parent(parent),
            _ => DeleteFilter::Website,
        }
    }
}

/// One independently committed unit of teardown work.
#[derive(Debug)]
pub struct Phase {
    pub name: &'static str,
    pub timeout: Duration,
    pub steps: &'static [Table],
}

/// A step of the teardown plan.
#[derive(Debug, Clone, Copy)]
pub enum Stage {
    Delete(&'static Phase),
    /// Clears the external vector index and retires `vector_db_configs`.
    VectorIndex,
}

pub static OWNED_CONTENT: Phase = Phase {
    name: "owned_content",
    timeout: Duration::from_secs(10),
    steps: &[
        Table::PopupQuestions,
        Table::AccessKeys,
        Table::AiMessages,
        Table::AiThreads,
    ],
};

pub static SHOPIFY_CONTENT: Phase = Phase {
    name: "shopify_content",
    timeout: Duration::from_secs(30),
    steps: &[
        Table::ShopifyComments,
        Table::ShopifyBlogPosts,
        Table::ShopifyBlogs,
        Table::ShopifyReviews,
        Table::ShopifyMedia,
        Table::ShopifyVariants,
        Table::ShopifyProducts,
        Table::ShopifyDiscounts,
        Table::ShopifyPages,
    ],
};

pub static WORDPRESS_CONTENT: Phase = Phase {
    name: "wordpress_content",
    timeout: Duration::from_secs(30),
    steps: &[
        Table::WordpressComments,
        Table::WordpressReviews,
        Table::WordpressCustomFields,
        Table::WordpressCategories,
        Table::WordpressTags,
        Table::WordpressMedia,
        Table::WordpressAuthors,
        Table::WordpressPosts,
        Table::WordpressPages,
        Table::WordpressProducts,
    ],
};

pub static WEBSITE_RECORD: Phase = Phase {
    name: "website_record",
    timeout: Duration::from_secs(5),
    steps: &[Table::Websites],
};

/// Teardown order. The vector stage has to finish before the website row goes.
pub static TEARDOWN_PLAN: &[Stage] = &[
    Stage::Delete(&OWNED_CONTENT),
    Stage::VectorIndex,
    Stage::Delete(&SHOPIFY_CONTENT),
    Stage::Delete(&WORDPRESS_CONTENT),
    Stage::Delete(&WEBSITE_RECORD),
];

#[cfg(test)]
pub const ALL_TABLES: &[Table] = &[
    Table::PopupQuestions,
    Table::AccessKeys,
    Table::AiMessages,
    Table::AiThreads,
    Table::VectorConfigs,
    Table::ShopifyComments,
    Table::ShopifyBlogPosts,
    Table::ShopifyBlogs,
    Table::ShopifyReviews,
    Table::ShopifyMedia,
    Table::ShopifyVariants,
    Table::ShopifyProducts,
    Table::ShopifyDiscounts,
    Table::ShopifyPages,
    Table::WordpressComments,
    Table::WordpressReviews,
    Table::WordpressCustomFields,
    Table::WordpressCategories,
    Table::WordpressTags,
    Table::WordpressMedia,
    Table::WordpressAuthors,
    Table::WordpressPosts,
    Table::WordpressPages,
    Table::WordpressProducts,
    Table::Websites,
];

/// Tables in the order the plan empties them. `vector_db_configs` is emitted
/// where the vector stage runs.
#[cfg(test)]
pub fn deletion_order() -> Vec<Table> {
    TEARDOWN_PLAN
        .iter()
        .flat_map(|stage| match stage {
            Stage::Delete(phase) => phase.steps.to_vec(),
            Stage::VectorIndex => vec![Table::VectorConfigs],
        })
        .collect()
}
