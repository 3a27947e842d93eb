//! Catalogue products and their stock level.

use serde::{Deserialize, Serialize};

use super::{Money, ProductId};

/// Longest accepted product description.
pub const DESCRIPTION_MAX: usize = 500;

/// Validation errors raised when constructing product records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProductValidationError {
    /// The description was blank.
    #[error("product description must not be empty")]
    EmptyDescription,
    /// The description exceeded [`DESCRIPTION_MAX`] characters.
    #[error("product description must be at most {max} characters")]
    DescriptionTooLong {
        /// The enforced limit.
        max: usize,
    },
    /// Stock must fit the storage column.
    #[error("stock level {0} exceeds the supported maximum")]
    StockTooLarge(u32),
}

/// Editable catalogue fields: description, unit price and stock level.
///
/// Used both to create products and to replace an existing product's
/// details. Updates run behind a locking read so they never race a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ProductDetailsDto", into = "ProductDetailsDto")]
pub struct ProductDetails {
    description: String,
    price: Money,
    in_stock: u32,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductDetailsDto {
    description: String,
    price: Money,
    in_stock: u32,
}

impl From<ProductDetails> for ProductDetailsDto {
    fn from(value: ProductDetails) -> Self {
        Self {
            description: value.description,
            price: value.price,
            in_stock: value.in_stock,
        }
    }
}

impl TryFrom<ProductDetailsDto> for ProductDetails {
    type Error = ProductValidationError;

    fn try_from(value: ProductDetailsDto) -> Result<Self, Self::Error> {
        Self::try_new(value.description, value.price, value.in_stock)
    }
}

impl ProductDetails {
    /// Validate and build product details.
    pub fn try_new(
        description: impl Into<String>,
        price: Money,
        in_stock: u32,
    ) -> Result<Self, ProductValidationError> {
        let description = description.into().trim().to_owned();
        if description.is_empty() {
            return Err(ProductValidationError::EmptyDescription);
        }
        if description.chars().count() > DESCRIPTION_MAX {
            return Err(ProductValidationError::DescriptionTooLong {
                max: DESCRIPTION_MAX,
            });
        }
        if i32::try_from(in_stock).is_err() {
            return Err(ProductValidationError::StockTooLarge(in_stock));
        }
        Ok(Self {
            description,
            price,
            in_stock,
        })
    }

    /// Human readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Unit price.
    pub fn price(&self) -> Money {
        self.price
    }

    /// Units available for sale.
    pub fn in_stock(&self) -> u32 {
        self.in_stock
    }
}

/// Payload for inserting a product.
pub type NewProduct = ProductDetails;

/// Persisted product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    id: ProductId,
    #[serde(flatten)]
    details: ProductDetails,
}

impl Product {
    /// Assemble a product from already validated parts.
    pub fn new(id: ProductId, details: ProductDetails) -> Self {
        Self { id, details }
    }

    /// Stable identifier.
    pub fn id(&self) -> ProductId {
        self.id
    }

    /// Catalogue fields.
    pub fn details(&self) -> &ProductDetails {
        &self.details
    }

    /// Human readable description.
    pub fn description(&self) -> &str {
        self.details.description()
    }

    /// Unit price.
    pub fn price(&self) -> Money {
        self.details.price()
    }

    /// Units available for sale.
    pub fn in_stock(&self) -> u32 {
        self.details.in_stock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn blank_description_is_rejected() {
        let result = ProductDetails::try_new("  ", Money::ZERO, 1);
        assert_eq!(result, Err(ProductValidationError::EmptyDescription));
    }

    #[rstest]
    fn overlong_description_is_rejected() {
        let result = ProductDetails::try_new("d".repeat(DESCRIPTION_MAX + 1), Money::ZERO, 1);
        assert_eq!(
            result,
            Err(ProductValidationError::DescriptionTooLong {
                max: DESCRIPTION_MAX
            })
        );
    }

    #[rstest]
    fn stock_beyond_column_width_is_rejected() {
        let result = ProductDetails::try_new("Kettle", Money::ZERO, u32::MAX);
        assert_eq!(result, Err(ProductValidationError::StockTooLarge(u32::MAX)));
    }

    #[rstest]
    #[case(r#"{"description":"","price":1,"inStock":1}"#)]
    #[case(r#"{"description":"Kettle","price":1,"inStock":4294967295}"#)]
    fn deserialisation_enforces_validation(#[case] payload: &str) {
        let result = serde_json::from_str::<ProductDetails>(payload);
        assert!(result.is_err(), "accepted invalid details: {result:?}");
    }

    #[rstest]
    fn product_json_keeps_details_inline() {
        let details =
            ProductDetails::try_new("Kettle", Money::new(100).expect("price"), 6).expect("valid");
        let product = Product::new(ProductId::random(), details);
        let value = serde_json::to_value(&product).expect("serialise product");

        assert_eq!(value["description"], "Kettle");
        assert_eq!(value["inStock"], 6);
        let decoded: Product = serde_json::from_value(value).expect("deserialise product");
        assert_eq!(decoded, product);
    }

    #[rstest]
    fn accessors_expose_details() {
        let details =
            ProductDetails::try_new(" Kettle ", Money::new(100).expect("price"), 6).expect("valid");
        let product = Product::new(ProductId::random(), details);

        assert_eq!(product.description(), "Kettle");
        assert_eq!(product.price().minor_units(), 100);
        assert_eq!(product.in_stock(), 6);
    }
}
