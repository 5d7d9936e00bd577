//! Recommendation fetcher: detected conditions → catalog lookups → product list.

use crate::client::{CatalogClient, ProductLookup, ProductQuery};
use crate::types::{concern_for_label, ProductType, Recommendations, SkinType};

/// Sentinel message when the all-products lookups yield nothing.
pub const NO_PRODUCTS: &str = "No products for given condition and skin type.";
/// Sentinel message when the product-type lookups yield nothing.
pub const NO_PRODUCTS_OF_TYPE: &str =
    "No products for given condition, skin type, and product type.";

pub struct Recommender<L = CatalogClient> {
    lookup: L,
    dedupe_concerns: bool,
}

impl<L: ProductLookup> Recommender<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            dedupe_concerns: false,
        }
    }

    /// Issue one lookup per distinct concern code instead of one per label.
    ///
    /// Off by default: pigmentation and dark spots share a concern code, and
    /// with both detected the catalog is asked twice and both answers are kept.
    pub fn dedupe_concerns(mut self, dedupe: bool) -> Self {
        self.dedupe_concerns = dedupe;
        self
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Products for the labels across all product categories.
    pub async fn recommend<S: AsRef<str>>(&self, labels: &[S], skin_type: SkinType) -> Recommendations {
        self.recommend_with(labels, skin_type, None).await
    }

    /// Products for the labels within one product category.
    pub async fn recommend_by_type<S: AsRef<str>>(
        &self,
        labels: &[S],
        skin_type: SkinType,
        product_type: ProductType,
    ) -> Recommendations {
        self.recommend_with(labels, skin_type, Some(product_type)).await
    }

    /// Run the lookups one after another and concatenate their results in
    /// order. A failed lookup is logged and contributes nothing.
    async fn recommend_with<S: AsRef<str>>(
        &self,
        labels: &[S],
        skin_type: SkinType,
        product_type: Option<ProductType>,
    ) -> Recommendations {
        let queries = self.plan(labels, skin_type, product_type);
        let mut products = Vec::new();

        for query in &queries {
            match self.lookup.fetch_products(query).await {
                Ok(batch) => {
                    tracing::debug!(
                        concern = %query.concern,
                        skin_type = query.skin_type.id(),
                        count = batch.len(),
                        "lookup succeeded"
                    );
                    products.extend(batch);
                }
                Err(e) => {
                    tracing::warn!(
                        concern = %query.concern,
                        skin_type = query.skin_type.id(),
                        error = %e,
                        "product lookup failed; skipping"
                    );
                }
            }
        }

        tracing::info!(
            lookups = queries.len(),
            products = products.len(),
            "recommendations fetched"
        );

        if !products.is_empty() {
            Recommendations::Products(products)
        } else if product_type.is_some() {
            Recommendations::NoProducts(NO_PRODUCTS_OF_TYPE)
        } else {
            Recommendations::NoProducts(NO_PRODUCTS)
        }
    }

    /// The lookups a request will issue, in order. Unknown labels are skipped.
    pub fn plan<S: AsRef<str>>(
        &self,
        labels: &[S],
        skin_type: SkinType,
        product_type: Option<ProductType>,
    ) -> Vec<ProductQuery> {
        let mut queries: Vec<ProductQuery> = Vec::with_capacity(labels.len());

        for label in labels {
            let label = label.as_ref();
            let Some(concern) = concern_for_label(label) else {
                tracing::debug!(label, "skipping label with no concern mapping");
                continue;
            };
            if self.dedupe_concerns && queries.iter().any(|q| q.concern == concern) {
                continue;
            }
            queries.push(ProductQuery {
                concern,
                skin_type,
                product_type,
            });
        }

        queries
    }
}
