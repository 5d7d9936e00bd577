//! Plain-text rendering of analysis results.

use skinalyze_catalog::{ProductType, Recommendations, SkinType};
use skinalyze_core::Condition;
use std::io::{self, Write};

const DIVIDER: &str = "────────────────────────────────────────";

pub fn conditions(out: &mut impl Write, conditions: &[Condition]) -> io::Result<()> {
    if conditions.is_empty() {
        return writeln!(out, "No conditions detected.");
    }
    writeln!(out, "Conditions detected:")?;
    for condition in conditions {
        writeln!(out, "- {condition}")?;
    }
    Ok(())
}

/// One titled block of products, or the no-products warning.
pub fn recommendations(
    out: &mut impl Write,
    title: &str,
    recommendations: &Recommendations,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "== {title} ==")?;

    if let Recommendations::NoProducts(message) = recommendations {
        return writeln!(out, "warning: {message}");
    }

    for product in recommendations.products() {
        writeln!(out, "{}", product.product_name)?;
        writeln!(out, "  Provided by:    {}", product.brand)?;
        writeln!(out, "  For:            {}", product.concern)?;
        writeln!(out, "  Key Ingredient: {}", product.key_ingredients)?;
        if let Some(url) = &product.product_url {
            writeln!(out, "  Link:           {url}")?;
        }
        writeln!(out, "  All Ingredients: {}", product.all_ingredients)?;
        writeln!(out, "{DIVIDER}")?;
    }
    Ok(())
}

pub fn id_tables(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Skin types:")?;
    for skin_type in SkinType::ALL {
        writeln!(out, "  {}  {skin_type}", skin_type.id())?;
    }
    writeln!(out, "Product types:")?;
    for product_type in ProductType::ALL {
        writeln!(out, "  {}  {product_type}", product_type.id())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skinalyze_catalog::{Product, NO_PRODUCTS};

    fn rendered(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_no_conditions_message() {
        assert_eq!(rendered(|out| conditions(out, &[])), "No conditions detected.\n");
    }

    #[test]
    fn test_conditions_listed() {
        let text = rendered(|out| conditions(out, &[Condition::DarkSpots, Condition::Acne]));
        assert_eq!(text, "Conditions detected:\n- Dark Spots\n- Acne\n");
    }

    #[test]
    fn test_sentinel_rendered_as_warning() {
        let text = rendered(|out| {
            recommendations(out, "All Products", &Recommendations::NoProducts(NO_PRODUCTS))
        });
        assert!(text.contains("== All Products =="));
        assert!(text.contains("warning: No products for given condition and skin type."));
    }

    #[test]
    fn test_product_fields_rendered() {
        let product: Product = serde_json::from_value(serde_json::json!({
            "product_name": "Clarifying Serum",
            "brand": "Minimalist",
            "concern": "Acne",
            "key_ingredients": "Salicylic Acid",
            "all_ingredients": "Aqua, Salicylic Acid",
        }))
        .unwrap();

        let text = rendered(|out| {
            recommendations(out, "Serums", &Recommendations::Products(vec![product]))
        });
        assert!(text.contains("Clarifying Serum\n"));
        assert!(text.contains("Provided by:    Minimalist"));
        assert!(text.contains("Key Ingredient: Salicylic Acid"));
        assert!(text.contains("All Ingredients: Aqua, Salicylic Acid"));
        assert!(!text.contains("Link:"));
    }

    #[test]
    fn test_id_tables() {
        let text = rendered(|out| id_tables(out));
        assert!(text.contains("  1  Oily / Normal-Oily"));
        assert!(text.contains("  6  All Types"));
        assert!(text.contains("  4  Moisturisers"));
    }
}
