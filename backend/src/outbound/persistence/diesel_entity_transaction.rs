//! Diesel implementation of the scoped [`EntityTransaction`] handle.
//!
//! The handle borrows the connection on which the executor opened the
//! transaction, so every statement it issues commits or rolls back together.
//! Locking reads use `FOR NO KEY UPDATE`: they serialise with each other and
//! with updates of the same row, but do not block inserts that merely
//! reference the row through a foreign key.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::domain::ports::{EntityTransaction, StoreError};
use crate::domain::{
    Money, NewProduct, NewUser, Order, OrderId, OrderProduct, PageRequest, Product,
    ProductDetails, ProductId, Quantity, User, UserId, UserProfile,
};

use super::error_mapping::map_diesel_error;
use super::models::{
    NewOrderRow, NewProductRow, NewUserRow, OrderProductRow, OrderRow, ProductDetailsRow,
    ProductRow, UserProfileUpdate, UserRow, to_int4,
};
use super::schema::{order_products, orders, products, users};

fn convert<R, T>(row: Option<R>) -> Result<Option<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    row.map(T::try_from).transpose()
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Query handle bound to one open PostgreSQL transaction.
pub(crate) struct DieselEntityTransaction<'c> {
    conn: &'c mut AsyncPgConnection,
    lock_timed_out: bool,
}

impl<'c> DieselEntityTransaction<'c> {
    pub(crate) fn new(conn: &'c mut AsyncPgConnection) -> Self {
        Self {
            conn,
            lock_timed_out: false,
        }
    }

    fn conn(&mut self) -> &mut AsyncPgConnection {
        self.conn
    }

    /// Whether a locking read gave up on `lock_timeout`.
    pub(crate) fn lock_timed_out(&self) -> bool {
        self.lock_timed_out
    }

    fn locking_read_failed(&mut self, error: diesel::result::Error) -> StoreError {
        let error = map_diesel_error(error);
        self.lock_timed_out |= error.is_lock_timeout();
        error
    }
}

#[async_trait]
impl<'c> EntityTransaction for DieselEntityTransaction<'c> {
    async fn get_user(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = users::table
            .find(*id.as_uuid())
            .select(UserRow::as_select())
            .first(self.conn())
            .await
            .optional()
            .map_err(map_diesel_error)?;
        convert(row)
    }

    async fn get_user_for_update(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = users::table
            .find(*id.as_uuid())
            .select(UserRow::as_select())
            .for_no_key_update()
            .get_result(self.conn())
            .await
            .optional();
        let row = row.map_err(|err| self.locking_read_failed(err))?;
        convert(row)
    }

    async fn list_users(&mut self, page: PageRequest) -> Result<Vec<User>, StoreError> {
        let rows = users::table
            .order((users::full_name.asc(), users::id.asc()))
            .limit(i64::from(page.limit()))
            .offset(i64::from(page.offset()))
            .select(UserRow::as_select())
            .load(self.conn())
            .await
            .map_err(map_diesel_error)?;
        convert_all(rows)
    }

    async fn create_user(&mut self, user: &NewUser) -> Result<User, StoreError> {
        let row = diesel::insert_into(users::table)
            .values(NewUserRow::new(*UserId::random().as_uuid(), user))
            .returning(UserRow::as_returning())
            .get_result(self.conn())
            .await
            .map_err(map_diesel_error)?;
        User::try_from(row)
    }

    async fn update_user_profile(
        &mut self,
        id: UserId,
        profile: &UserProfile,
    ) -> Result<Option<User>, StoreError> {
        let row = diesel::update(users::table.find(*id.as_uuid()))
            .set(UserProfileUpdate::from(profile))
            .returning(UserRow::as_returning())
            .get_result(self.conn())
            .await
            .optional()
            .map_err(map_diesel_error)?;
        convert(row)
    }

    async fn reduce_user_balance(
        &mut self,
        id: UserId,
        amount: Money,
    ) -> Result<User, StoreError> {
        let row = diesel::update(users::table.find(*id.as_uuid()))
            .set(users::balance.eq(users::balance - amount.minor_units()))
            .returning(UserRow::as_returning())
            .get_result(self.conn())
            .await
            .optional()
            .map_err(map_diesel_error)?
            .ok_or_else(|| StoreError::missing(format!("user {id}")))?;
        User::try_from(row)
    }

    async fn delete_user(&mut self, id: UserId) -> Result<bool, StoreError> {
        let deleted = diesel::delete(users::table.find(*id.as_uuid()))
            .execute(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = products::table
            .find(*id.as_uuid())
            .select(ProductRow::as_select())
            .first(self.conn())
            .await
            .optional()
            .map_err(map_diesel_error)?;
        convert(row)
    }

    async fn get_product_for_update(
        &mut self,
        id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        let row = products::table
            .find(*id.as_uuid())
            .select(ProductRow::as_select())
            .for_no_key_update()
            .get_result(self.conn())
            .await
            .optional();
        let row = row.map_err(|err| self.locking_read_failed(err))?;
        convert(row)
    }

    async fn list_products(&mut self, page: PageRequest) -> Result<Vec<Product>, StoreError> {
        let rows = products::table
            .order((products::description.asc(), products::id.asc()))
            .limit(i64::from(page.limit()))
            .offset(i64::from(page.offset()))
            .select(ProductRow::as_select())
            .load(self.conn())
            .await
            .map_err(map_diesel_error)?;
        convert_all(rows)
    }

    async fn create_product(&mut self, product: &NewProduct) -> Result<Product, StoreError> {
        let row = diesel::insert_into(products::table)
            .values(NewProductRow {
                id: *ProductId::random().as_uuid(),
                details: ProductDetailsRow::try_from(product)?,
            })
            .returning(ProductRow::as_returning())
            .get_result(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Product::try_from(row)
    }

    async fn update_product(
        &mut self,
        id: ProductId,
        details: &ProductDetails,
    ) -> Result<Option<Product>, StoreError> {
        let row = diesel::update(products::table.find(*id.as_uuid()))
            .set(ProductDetailsRow::try_from(details)?)
            .returning(ProductRow::as_returning())
            .get_result(self.conn())
            .await
            .optional()
            .map_err(map_diesel_error)?;
        convert(row)
    }

    async fn reduce_product_stock(
        &mut self,
        id: ProductId,
        amount: Quantity,
    ) -> Result<Product, StoreError> {
        let amount = to_int4(amount.get())?;
        let row = diesel::update(products::table.find(*id.as_uuid()))
            .set(products::in_stock.eq(products::in_stock - amount))
            .returning(ProductRow::as_returning())
            .get_result(self.conn())
            .await
            .optional()
            .map_err(map_diesel_error)?
            .ok_or_else(|| StoreError::missing(format!("product {id}")))?;
        Product::try_from(row)
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError> {
        let deleted = diesel::delete(products::table.find(*id.as_uuid()))
            .execute(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = orders::table
            .find(*id.as_uuid())
            .select(OrderRow::as_select())
            .first(self.conn())
            .await
            .optional()
            .map_err(map_diesel_error)?;
        convert(row)
    }

    async fn list_orders_for_user(
        &mut self,
        user: UserId,
        page: PageRequest,
    ) -> Result<Vec<Order>, StoreError> {
        let rows = orders::table
            .filter(orders::user_id.eq(*user.as_uuid()))
            .order((orders::created_at.asc(), orders::id.asc()))
            .limit(i64::from(page.limit()))
            .offset(i64::from(page.offset()))
            .select(OrderRow::as_select())
            .load(self.conn())
            .await
            .map_err(map_diesel_error)?;
        convert_all(rows)
    }

    async fn create_order(
        &mut self,
        user: UserId,
        quantity: Quantity,
    ) -> Result<Order, StoreError> {
        let row = diesel::insert_into(orders::table)
            .values(NewOrderRow {
                id: *OrderId::random().as_uuid(),
                user_id: *user.as_uuid(),
                quantity: to_int4(quantity.get())?,
            })
            .returning(OrderRow::as_returning())
            .get_result(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Order::try_from(row)
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<bool, StoreError> {
        // Product links cascade.
        let deleted = diesel::delete(orders::table.find(*id.as_uuid()))
            .execute(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }

    async fn create_order_product(
        &mut self,
        order: OrderId,
        product: ProductId,
    ) -> Result<OrderProduct, StoreError> {
        let row = diesel::insert_into(order_products::table)
            .values(OrderProductRow {
                order_id: *order.as_uuid(),
                product_id: *product.as_uuid(),
            })
            .returning(OrderProductRow::as_returning())
            .get_result(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Ok(row.into())
    }

    async fn list_order_products(
        &mut self,
        order: OrderId,
    ) -> Result<Vec<OrderProduct>, StoreError> {
        let rows = order_products::table
            .filter(order_products::order_id.eq(*order.as_uuid()))
            .order(order_products::product_id.asc())
            .select(OrderProductRow::as_select())
            .load(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(OrderProduct::from).collect())
    }
}
