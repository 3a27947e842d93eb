//! Port for transaction-scoped access to storefront records.
//!
//! An [`EntityTransaction`] is only ever handed out by a
//! [`super::TransactionExecutor`]; every read and write issued through it
//! belongs to the same store transaction and disappears on rollback.
//!
//! The `*_for_update` reads take an exclusive intent lock on the row that is
//! held until the transaction ends. Other locking reads of the same row wait;
//! plain reads never do. The `reduce_*` operations apply a delta in one
//! statement and do not re-check invariants, so callers must validate against
//! a locking read first.

use async_trait::async_trait;

use crate::domain::{
    Error, Money, NewProduct, NewUser, Order, OrderId, OrderProduct, PageRequest, Product,
    ProductDetails, ProductId, Quantity, User, UserId, UserProfile,
};

use super::define_port_error;

define_port_error! {
    /// Failures raised by entity store adapters.
    pub enum StoreError {
        /// The store could not be reached or the connection dropped.
        Connection { message: String } => "entity store connection failed: {message}",
        /// A statement failed while executing.
        Query { message: String } => "entity store query failed: {message}",
        /// A uniqueness, check or foreign key constraint rejected a write.
        Constraint { message: String } => "entity store constraint violated: {message}",
        /// A targeted update found no row to modify.
        Missing { record: String } => "entity store record missing: {record}",
        /// The store gave up waiting for a row lock.
        LockTimeout { message: String } => "entity store lock wait timed out: {message}",
    }
}

impl From<StoreError> for Error {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Connection { .. } | StoreError::LockTimeout { .. } => {
                Error::service_unavailable(value.to_string())
            }
            StoreError::Missing { .. } => Error::not_found(value.to_string()),
            StoreError::Query { .. } | StoreError::Constraint { .. } => {
                Error::internal(value.to_string())
            }
        }
    }
}

/// Scoped query handle bound to one open store transaction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityTransaction: Send {
    /// Plain read of a user.
    async fn get_user(&mut self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Read a user and hold its intent lock until the transaction ends.
    async fn get_user_for_update(&mut self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Users ordered by full name.
    async fn list_users(&mut self, page: PageRequest) -> Result<Vec<User>, StoreError>;

    /// Insert a user with a fresh identifier.
    async fn create_user(&mut self, user: &NewUser) -> Result<User, StoreError>;

    /// Replace profile fields. The balance is left untouched.
    async fn update_user_profile(
        &mut self,
        id: UserId,
        profile: &UserProfile,
    ) -> Result<Option<User>, StoreError>;

    /// Subtract `amount` from the balance in a single statement.
    async fn reduce_user_balance(&mut self, id: UserId, amount: Money)
    -> Result<User, StoreError>;

    /// Delete a user, returning whether a row was removed.
    async fn delete_user(&mut self, id: UserId) -> Result<bool, StoreError>;

    /// Plain read of a product.
    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Read a product and hold its intent lock until the transaction ends.
    async fn get_product_for_update(
        &mut self,
        id: ProductId,
    ) -> Result<Option<Product>, StoreError>;

    /// Products ordered by description.
    async fn list_products(&mut self, page: PageRequest) -> Result<Vec<Product>, StoreError>;

    /// Insert a product with a fresh identifier.
    async fn create_product(&mut self, product: &NewProduct) -> Result<Product, StoreError>;

    /// Replace the catalogue fields of a product.
    async fn update_product(
        &mut self,
        id: ProductId,
        details: &ProductDetails,
    ) -> Result<Option<Product>, StoreError>;

    /// Subtract `amount` from the stock level in a single statement.
    async fn reduce_product_stock(
        &mut self,
        id: ProductId,
        amount: Quantity,
    ) -> Result<Product, StoreError>;

    /// Delete a product, returning whether a row was removed.
    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError>;

    /// Plain read of an order.
    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Orders placed by `user`, oldest first.
    async fn list_orders_for_user(
        &mut self,
        user: UserId,
        page: PageRequest,
    ) -> Result<Vec<Order>, StoreError>;

    /// Record an order for `user`.
    async fn create_order(&mut self, user: UserId, quantity: Quantity)
    -> Result<Order, StoreError>;

    /// Delete an order and its product links.
    async fn delete_order(&mut self, id: OrderId) -> Result<bool, StoreError>;

    /// Link an order to the product it bought.
    async fn create_order_product(
        &mut self,
        order: OrderId,
        product: ProductId,
    ) -> Result<OrderProduct, StoreError>;

    /// Product links recorded for an order.
    async fn list_order_products(&mut self, order: OrderId)
    -> Result<Vec<OrderProduct>, StoreError>;
}
