//! skinalyze-catalog — Product recommendations for detected skin conditions.
//!
//! Maps conditions onto the catalog's concern codes and queries the remote
//! catalog REST API once per condition.

pub mod client;
pub mod recommender;
pub mod types;

pub use client::{CatalogClient, CatalogError, HealthStatus, ProductLookup, ProductQuery};
pub use recommender::{Recommender, NO_PRODUCTS, NO_PRODUCTS_OF_TYPE};
pub use types::{
    concern_for, concern_for_label, ConcernCode, ParseIdError, Product, ProductType,
    Recommendations, SkinType,
};
