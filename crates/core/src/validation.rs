//! Input validation shared by every quote entry point (create, edit, clone).
//!
//! The pricing calculator is deliberately total over all numeric inputs;
//! positivity and required fields are enforced here, before any state is
//! touched.

use rust_decimal::Decimal;

use crate::domain::quote::LineItem;
use crate::errors::DomainError;
use crate::pricing::DiscountMode;

/// A quote must carry at least one line with a product name and a positive
/// quantity before it may leave `Draft`.
pub fn validate_items(items: &[LineItem]) -> Result<(), DomainError> {
    if items.is_empty() {
        return Err(DomainError::Validation("quote must contain at least one line item".to_string()));
    }

    for item in items {
        if item.product.trim().is_empty() {
            return Err(DomainError::Validation(format!(
                "line {}: product name is required",
                item.sl_no
            )));
        }
        if item.quantity <= Decimal::ZERO {
            return Err(DomainError::Validation(format!(
                "line {}: quantity must be greater than zero",
                item.sl_no
            )));
        }
        if item.unit_cost < Decimal::ZERO {
            return Err(DomainError::Validation(format!(
                "line {}: unit cost must not be negative",
                item.sl_no
            )));
        }
        if item.vat_percent < Decimal::ZERO {
            return Err(DomainError::Validation(format!(
                "line {}: vat percent must not be negative",
                item.sl_no
            )));
        }
    }

    Ok(())
}

/// Re-assign 1-based contiguous ordinals. Run after any row removal so the
/// visible numbering never has gaps.
pub fn resequence(items: &mut [LineItem]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.sl_no = index as u32 + 1;
    }
}

pub fn validate_discount(mode: DiscountMode, value: Decimal) -> Result<(), DomainError> {
    if value < Decimal::ZERO {
        return Err(DomainError::Validation("discount value must not be negative".to_string()));
    }
    if mode == DiscountMode::Percent && value > Decimal::ONE_HUNDRED {
        return Err(DomainError::Validation("percent discount cannot exceed 100".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::quote::LineItem;
    use crate::errors::DomainError;
    use crate::pricing::DiscountMode;

    use super::{resequence, validate_discount, validate_items};

    fn item(sl_no: u32, product: &str, quantity: Decimal) -> LineItem {
        LineItem {
            sl_no,
            product: product.to_string(),
            description: None,
            quantity,
            unit_cost: Decimal::new(5000, 2),
            margin_percent: Decimal::new(1000, 2),
            vat_percent: Decimal::new(500, 2),
        }
    }

    #[test]
    fn rejects_empty_item_lists() {
        let error = validate_items(&[]).expect_err("empty list");
        assert!(matches!(error, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_blank_product_names_and_non_positive_quantities() {
        let blank = vec![item(1, "  ", Decimal::ONE)];
        assert!(validate_items(&blank).is_err());

        let zero_qty = vec![item(1, "Router", Decimal::ZERO)];
        assert!(validate_items(&zero_qty).is_err());

        let negative_qty = vec![item(1, "Router", Decimal::new(-1, 0))];
        assert!(validate_items(&negative_qty).is_err());

        let valid = vec![item(1, "Router", Decimal::ONE)];
        assert!(validate_items(&valid).is_ok());
    }

    #[test]
    fn resequence_restores_contiguous_ordinals_after_removal() {
        let mut items =
            vec![item(1, "Router", Decimal::ONE), item(3, "Switch", Decimal::ONE), item(7, "Cabling", Decimal::ONE)];
        resequence(&mut items);
        assert_eq!(items.iter().map(|i| i.sl_no).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn discount_bounds_are_enforced_per_mode() {
        assert!(validate_discount(DiscountMode::Percent, Decimal::new(1500, 2)).is_ok());
        assert!(validate_discount(DiscountMode::Percent, Decimal::new(10_100, 2)).is_err());
        assert!(validate_discount(DiscountMode::Amount, Decimal::new(1_000_000, 2)).is_ok());
        assert!(validate_discount(DiscountMode::Amount, Decimal::new(-1, 0)).is_err());
    }
}
