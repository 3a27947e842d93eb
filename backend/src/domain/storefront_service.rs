//! Catalogue and account maintenance.
//!
//! Each operation runs in its own transaction. Product updates take the
//! product's intent lock first so they serialise with in-flight purchases
//! instead of overwriting a stock level a purchase is about to decrement.

use tracing::{debug, instrument};

use super::ports::{ExecutionContext, StoreError, TransactionExecutor};
use super::{
    DomainResult, Error, NewProduct, NewUser, Order, OrderDetails, OrderId, PageRequest, Product,
    ProductDetails, ProductId, User, UserId, UserProfile, Username,
};

fn delete_conflict(kind: &str, error: StoreError) -> Error {
    if error.is_constraint() {
        debug!(%error, "delete blocked by dependent rows");
        return Error::rejected(format!("{kind} is referenced by existing orders"));
    }
    error.into()
}

fn username_conflict(username: &Username, error: StoreError) -> Error {
    if error.is_constraint() {
        debug!(%error, "registration hit the username index");
        return Error::rejected(format!("username {username} already exists"));
    }
    error.into()
}

/// CRUD operations over users, products and orders.
#[derive(Debug, Clone)]
pub struct StorefrontService<X> {
    executor: X,
    context: ExecutionContext,
}

impl<X> StorefrontService<X>
where
    X: TransactionExecutor,
{
    /// Wrap an executor using an unbounded execution context.
    pub fn new(executor: X) -> Self {
        Self {
            executor,
            context: ExecutionContext::new(),
        }
    }

    /// Use `context` for every subsequent operation.
    #[must_use]
    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    /// Register a user with an opening balance.
    ///
    /// A username that is already taken is [`super::ErrorCode::Rejected`].
    #[instrument(skip(self, user), fields(username = %user.username))]
    pub async fn register_user(&self, user: NewUser) -> DomainResult<User> {
        self.executor
            .execute(&self.context, move |tx| {
                Box::pin(async move {
                    tx.create_user(&user)
                        .await
                        .map_err(|error| username_conflict(&user.username, error))
                })
            })
            .await
    }

    /// Fetch a user.
    pub async fn get_user(&self, id: UserId) -> DomainResult<User> {
        self.executor
            .execute(&self.context, move |tx| {
                Box::pin(async move {
                    tx.get_user(id)
                        .await?
                        .ok_or_else(|| Error::not_found(format!("user {id} not found")))
                })
            })
            .await
    }

    /// Page through users ordered by full name.
    pub async fn list_users(&self, page: PageRequest) -> DomainResult<Vec<User>> {
        self.executor
            .execute(&self.context, move |tx| {
                Box::pin(async move { Ok::<_, Error>(tx.list_users(page).await?) })
            })
            .await
    }

    /// Replace a user's profile fields. The balance cannot be edited here.
    #[instrument(skip(self, profile))]
    pub async fn update_user_profile(
        &self,
        id: UserId,
        profile: UserProfile,
    ) -> DomainResult<User> {
        self.executor
            .execute(&self.context, move |tx| {
                Box::pin(async move {
                    tx.update_user_profile(id, &profile)
                        .await?
                        .ok_or_else(|| Error::not_found(format!("user {id} not found")))
                })
            })
            .await
    }

    /// Delete a user without orders.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: UserId) -> DomainResult<()> {
        self.executor
            .execute(&self.context, move |tx| {
                Box::pin(async move {
                    match tx.delete_user(id).await {
                        Ok(true) => Ok(()),
                        Ok(false) => Err(Error::not_found(format!("user {id} not found"))),
                        Err(error) => Err(delete_conflict("user", error)),
                    }
                })
            })
            .await
    }

    /// Add a product to the catalogue.
    #[instrument(skip(self, product))]
    pub async fn create_product(&self, product: NewProduct) -> DomainResult<Product> {
        self.executor
            .execute(&self.context, move |tx| {
                Box::pin(async move { Ok::<_, Error>(tx.create_product(&product).await?) })
            })
            .await
    }

    /// Fetch a product.
    pub async fn get_product(&self, id: ProductId) -> DomainResult<Product> {
        self.executor
            .execute(&self.context, move |tx| {
                Box::pin(async move {
                    tx.get_product(id)
                        .await?
                        .ok_or_else(|| Error::not_found(format!("product {id} not found")))
                })
            })
            .await
    }

    /// Page through products ordered by description.
    pub async fn list_products(&self, page: PageRequest) -> DomainResult<Vec<Product>> {
        self.executor
            .execute(&self.context, move |tx| {
                Box::pin(async move { Ok::<_, Error>(tx.list_products(page).await?) })
            })
            .await
    }

    /// Replace a product's description, price and stock level.
    #[instrument(skip(self, details))]
    pub async fn update_product(
        &self,
        id: ProductId,
        details: ProductDetails,
    ) -> DomainResult<Product> {
        self.executor
            .execute(&self.context, move |tx| {
                Box::pin(async move {
                    let missing = || Error::not_found(format!("product {id} not found"));
                    tx.get_product_for_update(id).await?.ok_or_else(missing)?;
                    tx.update_product(id, &details).await?.ok_or_else(missing)
                })
            })
            .await
    }

    /// Remove a product that no order references.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> DomainResult<()> {
        self.executor
            .execute(&self.context, move |tx| {
                Box::pin(async move {
                    match tx.delete_product(id).await {
                        Ok(true) => Ok(()),
                        Ok(false) => Err(Error::not_found(format!("product {id} not found"))),
                        Err(error) => Err(delete_conflict("product", error)),
                    }
                })
            })
            .await
    }

    /// Fetch an order with the products it links to.
    pub async fn get_order(&self, id: OrderId) -> DomainResult<OrderDetails> {
        self.executor
            .execute(&self.context, move |tx| {
                Box::pin(async move {
                    let order = tx
                        .get_order(id)
                        .await?
                        .ok_or_else(|| Error::not_found(format!("order {id} not found")))?;
                    let products = tx
                        .list_order_products(id)
                        .await?
                        .into_iter()
                        .map(|link| link.product_id)
                        .collect();
                    Ok::<_, Error>(OrderDetails { order, products })
                })
            })
            .await
    }

    /// Page through a user's orders, oldest first.
    pub async fn list_orders_for_user(
        &self,
        user: UserId,
        page: PageRequest,
    ) -> DomainResult<Vec<Order>> {
        self.executor
            .execute(&self.context, move |tx| {
                Box::pin(async move { Ok::<_, Error>(tx.list_orders_for_user(user, page).await?) })
            })
            .await
    }

    /// Delete an order together with its product links.
    ///
    /// Stock and balance are not restored.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, id: OrderId) -> DomainResult<()> {
        self.executor
            .execute(&self.context, move |tx| {
                Box::pin(async move {
                    if tx.delete_order(id).await? {
                        Ok(())
                    } else {
                        Err(Error::not_found(format!("order {id} not found")))
                    }
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests;
