//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Conversions back into domain records
//! re-validate every field, so a row that violates a domain invariant is
//! reported as a query failure rather than trusted.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::ports::StoreError;
use crate::domain::{
    Gender, Money, NewUser, Order, OrderId, OrderProduct, Product, ProductDetails, ProductId,
    Quantity, User, UserId, UserProfile, Username,
};

use super::schema::{order_products, orders, products, users};

fn corrupt(table: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::query(format!("invalid {table} row: {detail}"))
}

/// Narrow a validated count into an `INTEGER` column value.
pub(crate) fn to_int4(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::query(format!("{value} exceeds INTEGER range")))
}

/// Row struct for reading from the users table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub gender: String,
    pub age: i32,
    pub balance: i64,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let age = u16::try_from(row.age).map_err(|err| corrupt("users", err))?;
        let gender: Gender = row.gender.parse().map_err(|err| corrupt("users", err))?;
        let username = Username::new(row.username).map_err(|err| corrupt("users", err))?;
        let profile =
            UserProfile::try_new(row.first_name, row.middle_name, row.last_name, gender, age)
                .map_err(|err| corrupt("users", err))?;
        let balance = Money::new(row.balance).map_err(|err| corrupt("users", err))?;
        Ok(User::new(UserId::from_uuid(row.id), username, profile, balance))
    }
}

/// Insertable struct for creating user records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub(crate) struct NewUserRow<'a> {
    pub id: Uuid,
    pub username: &'a str,
    pub first_name: &'a str,
    pub middle_name: &'a str,
    pub last_name: &'a str,
    pub full_name: String,
    pub gender: &'static str,
    pub age: i32,
    pub balance: i64,
}

impl<'a> NewUserRow<'a> {
    pub(crate) fn new(id: Uuid, user: &'a NewUser) -> Self {
        let profile = &user.profile;
        Self {
            id,
            username: user.username.as_str(),
            first_name: profile.first_name(),
            middle_name: profile.middle_name(),
            last_name: profile.last_name(),
            full_name: profile.full_name(),
            gender: profile.gender().as_code(),
            age: i32::from(profile.age()),
            balance: user.balance.minor_units(),
        }
    }
}

/// Changeset for profile edits. Leaves `balance` untouched.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = users)]
pub(crate) struct UserProfileUpdate<'a> {
    pub first_name: &'a str,
    pub middle_name: &'a str,
    pub last_name: &'a str,
    pub full_name: String,
    pub gender: &'static str,
    pub age: i32,
}

impl<'a> From<&'a UserProfile> for UserProfileUpdate<'a> {
    fn from(profile: &'a UserProfile) -> Self {
        Self {
            first_name: profile.first_name(),
            middle_name: profile.middle_name(),
            last_name: profile.last_name(),
            full_name: profile.full_name(),
            gender: profile.gender().as_code(),
            age: i32::from(profile.age()),
        }
    }
}

/// Row struct for reading from the products table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ProductRow {
    pub id: Uuid,
    pub description: String,
    pub price: i64,
    pub in_stock: i32,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let price = Money::new(row.price).map_err(|err| corrupt("products", err))?;
        let in_stock = u32::try_from(row.in_stock).map_err(|err| corrupt("products", err))?;
        let details = ProductDetails::try_new(row.description, price, in_stock)
            .map_err(|err| corrupt("products", err))?;
        Ok(Product::new(ProductId::from_uuid(row.id), details))
    }
}

/// Insertable and changeset struct for product catalogue fields.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = products)]
pub(crate) struct ProductDetailsRow<'a> {
    pub description: &'a str,
    pub price: i64,
    pub in_stock: i32,
}

impl<'a> TryFrom<&'a ProductDetails> for ProductDetailsRow<'a> {
    type Error = StoreError;

    fn try_from(details: &'a ProductDetails) -> Result<Self, Self::Error> {
        Ok(Self {
            description: details.description(),
            price: details.price().minor_units(),
            in_stock: to_int4(details.in_stock())?,
        })
    }
}

/// Insertable struct pairing a fresh identifier with product details.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = products)]
pub(crate) struct NewProductRow<'a> {
    pub id: Uuid,
    #[diesel(embed)]
    pub details: ProductDetailsRow<'a>,
}

/// Row struct for reading from the orders table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct OrderRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let quantity =
            Quantity::new(i64::from(row.quantity)).map_err(|err| corrupt("orders", err))?;
        Ok(Order {
            id: OrderId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            quantity,
            created_at: row.created_at,
        })
    }
}

/// Insertable struct for creating order records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = orders)]
pub(crate) struct NewOrderRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub quantity: i32,
}

/// Row struct for the order_products link table.
#[derive(Debug, Clone, Copy, Queryable, Selectable, Insertable)]
#[diesel(table_name = order_products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct OrderProductRow {
    pub order_id: Uuid,
    pub product_id: Uuid,
}

impl From<OrderProductRow> for OrderProduct {
    fn from(row: OrderProductRow) -> Self {
        Self {
            order_id: OrderId::from_uuid(row.order_id),
            product_id: ProductId::from_uuid(row.product_id),
        }
    }
}
