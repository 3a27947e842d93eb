//! Process-local entity store with row-level intent locks.
//!
//! Committed records live in one [`Snapshot`] behind a mutex, so a commit
//! becomes visible atomically. Each transaction stages its writes in an
//! overlay and reads its own writes through it. Locking reads and targeted
//! updates acquire a per-row async mutex that the transaction holds until it
//! commits or rolls back; plain reads never touch those mutexes.
//!
//! Faults can be armed with [`InMemoryStore::fail_next`] to exercise
//! rollback and commit failure paths.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::BoxFuture;
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};
use tracing::debug;

use crate::domain::ports::{
    EntityTransaction, ExecutionContext, StoreError, TransactionExecutor, UnitOfWorkError,
};
use crate::domain::{
    Money, NewProduct, NewUser, Order, OrderId, OrderProduct, PageRequest, Product,
    ProductDetails, ProductId, Quantity, User, UserId, UserProfile, Username,
};

/// Where an injected fault fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    /// The next call of the named [`EntityTransaction`] method fails.
    Statement(&'static str),
    /// The next commit fails; its staged writes are discarded.
    Commit,
    /// The next rollback reports failure.
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RowKey {
    User(UserId),
    Product(ProductId),
    Order(OrderId),
    /// Unique index entry; serialises concurrent registrations of one name.
    Username(Username),
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    users: BTreeMap<UserId, User>,
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, Order>,
    order_products: Vec<OrderProduct>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<Snapshot>,
    locks: Mutex<HashMap<RowKey, Arc<RowMutex<()>>>>,
    faults: Mutex<Vec<FailurePoint>>,
}

fn recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, Snapshot> {
        recover(&self.state)
    }

    fn row_lock(&self, key: RowKey) -> Arc<RowMutex<()>> {
        Arc::clone(recover(&self.locks).entry(key).or_default())
    }

    /// Forget row mutexes nobody holds or waits on.
    fn prune_locks(&self, keys: impl IntoIterator<Item = RowKey>) {
        let mut locks = recover(&self.locks);
        for key in keys {
            if locks.get(&key).is_some_and(|row| Arc::strong_count(row) == 1) {
                locks.remove(&key);
            }
        }
    }

    fn take_fault(&self, point: FailurePoint) -> bool {
        let mut faults = recover(&self.faults);
        match faults.iter().position(|armed| *armed == point) {
            Some(index) => {
                faults.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Shared in-memory store. Clones refer to the same records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a one-shot fault.
    pub fn fail_next(&self, point: FailurePoint) {
        recover(&self.shared.faults).push(point);
    }

    /// Number of committed orders.
    pub fn order_count(&self) -> usize {
        self.shared.state().orders.len()
    }

    /// Number of committed order-product links.
    pub fn order_product_count(&self) -> usize {
        self.shared.state().order_products.len()
    }
}

#[async_trait]
impl TransactionExecutor for InMemoryStore {
    async fn execute<T, E, F>(&self, context: &ExecutionContext, work: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: UnitOfWorkError + 'static,
        F: for<'t> FnOnce(&'t mut dyn EntityTransaction) -> BoxFuture<'t, Result<T, E>>
            + Send
            + 'static,
    {
        let scope = context.start();
        scope.check().map_err(E::interrupted)?;

        let mut tx = MemoryTransaction::new(&self.shared);
        let outcome = match scope.run(work(&mut tx)).await {
            Ok(outcome) => outcome,
            Err(reason) => Err(E::interrupted(reason)),
        };

        match outcome {
            Ok(value) => tx.commit().map(|()| value).map_err(E::from),
            Err(error) => match tx.rollback() {
                Ok(()) => Err(error),
                Err(rollback) => Err(error.with_rollback_failure(rollback)),
            },
        }
    }
}

#[derive(Debug, Default)]
struct Overlay {
    users: BTreeMap<UserId, Option<User>>,
    products: BTreeMap<ProductId, Option<Product>>,
    orders: BTreeMap<OrderId, Option<Order>>,
    links_added: Vec<OrderProduct>,
    links_removed: BTreeSet<OrderId>,
}

fn visible<K, V>(staged: &BTreeMap<K, Option<V>>, committed: &BTreeMap<K, V>, key: &K) -> Option<V>
where
    K: Ord,
    V: Clone,
{
    match staged.get(key) {
        Some(record) => record.clone(),
        None => committed.get(key).cloned(),
    }
}

fn merged<K, V>(staged: &BTreeMap<K, Option<V>>, committed: &BTreeMap<K, V>) -> Vec<V>
where
    K: Ord + Clone,
    V: Clone,
{
    let mut records = committed.clone();
    for (key, record) in staged {
        match record {
            Some(record) => records.insert(key.clone(), record.clone()),
            None => records.remove(key),
        };
    }
    records.into_values().collect()
}

fn page_of<V>(records: Vec<V>, page: PageRequest) -> Vec<V> {
    records
        .into_iter()
        .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
        .take(usize::try_from(page.limit()).unwrap_or(usize::MAX))
        .collect()
}

fn absent(record: String) -> StoreError {
    StoreError::missing(record)
}

/// Transaction handle over an [`InMemoryStore`].
struct MemoryTransaction<'s> {
    shared: &'s Shared,
    overlay: Overlay,
    held: HashSet<RowKey>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl<'s> MemoryTransaction<'s> {
    fn new(shared: &'s Shared) -> Self {
        Self {
            shared,
            overlay: Overlay::default(),
            held: HashSet::new(),
            guards: Vec::new(),
        }
    }

    fn statement(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.shared.take_fault(FailurePoint::Statement(operation)) {
            debug!(operation, "injected statement failure");
            return Err(StoreError::query(format!("injected failure in {operation}")));
        }
        Ok(())
    }

    async fn lock(&mut self, key: RowKey) {
        if self.held.contains(&key) {
            return;
        }
        let row = self.shared.row_lock(key.clone());
        let guard = row.lock_owned().await;
        self.held.insert(key);
        self.guards.push(guard);
    }

    fn user(&self, id: UserId) -> Option<User> {
        visible(&self.overlay.users, &self.shared.state().users, &id)
    }

    fn product(&self, id: ProductId) -> Option<Product> {
        visible(&self.overlay.products, &self.shared.state().products, &id)
    }

    fn order(&self, id: OrderId) -> Option<Order> {
        visible(&self.overlay.orders, &self.shared.state().orders, &id)
    }

    fn links(&self) -> Vec<OrderProduct> {
        let committed = self.shared.state().order_products.clone();
        committed
            .into_iter()
            .filter(|link| !self.overlay.links_removed.contains(&link.order_id))
            .chain(self.overlay.links_added.iter().copied())
            .collect()
    }

    fn commit(mut self) -> Result<(), StoreError> {
        if self.shared.take_fault(FailurePoint::Commit) {
            debug!("injected commit failure");
            return Err(StoreError::connection("injected commit failure"));
        }
        let Overlay {
            users,
            products,
            orders,
            links_added,
            links_removed,
        } = std::mem::take(&mut self.overlay);
        let mut state = self.shared.state();
        apply(&mut state.users, users);
        apply(&mut state.products, products);
        apply(&mut state.orders, orders);
        state
            .order_products
            .retain(|link| !links_removed.contains(&link.order_id));
        state.order_products.extend(links_added);
        Ok(())
    }

    fn rollback(self) -> Result<(), StoreError> {
        if self.shared.take_fault(FailurePoint::Rollback) {
            debug!("injected rollback failure");
            return Err(StoreError::connection("injected rollback failure"));
        }
        Ok(())
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        self.guards.clear();
        self.shared.prune_locks(self.held.drain());
    }
}

fn apply<K: Ord, V>(committed: &mut BTreeMap<K, V>, staged: BTreeMap<K, Option<V>>) {
    for (key, record) in staged {
        match record {
            Some(record) => {
                committed.insert(key, record);
            }
            None => {
                committed.remove(&key);
            }
        }
    }
}

#[async_trait]
impl<'s> EntityTransaction for MemoryTransaction<'s> {
    async fn get_user(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        self.statement("get_user")?;
        Ok(self.user(id))
    }

    async fn get_user_for_update(&mut self, id: UserId) -> Result<Option<User>, StoreError> {
        self.statement("get_user_for_update")?;
        if self.user(id).is_none() {
            return Ok(None);
        }
        self.lock(RowKey::User(id)).await;
        Ok(self.user(id))
    }

    async fn list_users(&mut self, page: PageRequest) -> Result<Vec<User>, StoreError> {
        self.statement("list_users")?;
        let mut users = merged(&self.overlay.users, &self.shared.state().users);
        users.sort_by(|a, b| a.full_name().cmp(&b.full_name()).then(a.id().cmp(&b.id())));
        Ok(page_of(users, page))
    }

    async fn create_user(&mut self, user: &NewUser) -> Result<User, StoreError> {
        self.statement("create_user")?;
        self.lock(RowKey::Username(user.username.clone())).await;
        let taken = merged(&self.overlay.users, &self.shared.state().users)
            .iter()
            .any(|existing| existing.username() == &user.username);
        if taken {
            return Err(StoreError::constraint("users_username_key"));
        }
        let created = User::new(
            UserId::random(),
            user.username.clone(),
            user.profile.clone(),
            user.balance,
        );
        self.overlay.users.insert(created.id(), Some(created.clone()));
        Ok(created)
    }

    async fn update_user_profile(
        &mut self,
        id: UserId,
        profile: &UserProfile,
    ) -> Result<Option<User>, StoreError> {
        self.statement("update_user_profile")?;
        if self.user(id).is_none() {
            return Ok(None);
        }
        self.lock(RowKey::User(id)).await;
        let Some(current) = self.user(id) else {
            return Ok(None);
        };
        let updated = User::new(
            id,
            current.username().clone(),
            profile.clone(),
            current.balance(),
        );
        self.overlay.users.insert(id, Some(updated.clone()));
        Ok(Some(updated))
    }

    async fn reduce_user_balance(
        &mut self,
        id: UserId,
        amount: Money,
    ) -> Result<User, StoreError> {
        self.statement("reduce_user_balance")?;
        self.lock(RowKey::User(id)).await;
        let current = self.user(id).ok_or_else(|| absent(format!("user {id}")))?;
        let balance = current
            .balance()
            .checked_sub(amount)
            .ok_or_else(|| StoreError::constraint("users_balance_check"))?;
        let updated = User::new(
            id,
            current.username().clone(),
            current.profile().clone(),
            balance,
        );
        self.overlay.users.insert(id, Some(updated.clone()));
        Ok(updated)
    }

    async fn delete_user(&mut self, id: UserId) -> Result<bool, StoreError> {
        self.statement("delete_user")?;
        if self.user(id).is_none() {
            return Ok(false);
        }
        self.lock(RowKey::User(id)).await;
        if self.user(id).is_none() {
            return Ok(false);
        }
        let has_orders = merged(&self.overlay.orders, &self.shared.state().orders)
            .iter()
            .any(|order| order.user_id == id);
        if has_orders {
            return Err(StoreError::constraint("orders_user_id_fkey"));
        }
        self.overlay.users.insert(id, None);
        Ok(true)
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.statement("get_product")?;
        Ok(self.product(id))
    }

    async fn get_product_for_update(
        &mut self,
        id: ProductId,
    ) -> Result<Option<Product>, StoreError> {
        self.statement("get_product_for_update")?;
        if self.product(id).is_none() {
            return Ok(None);
        }
        self.lock(RowKey::Product(id)).await;
        Ok(self.product(id))
    }

    async fn list_products(&mut self, page: PageRequest) -> Result<Vec<Product>, StoreError> {
        self.statement("list_products")?;
        let mut products = merged(&self.overlay.products, &self.shared.state().products);
        products.sort_by(|a, b| {
            a.description()
                .cmp(b.description())
                .then(a.id().cmp(&b.id()))
        });
        Ok(page_of(products, page))
    }

    async fn create_product(&mut self, product: &NewProduct) -> Result<Product, StoreError> {
        self.statement("create_product")?;
        let created = Product::new(ProductId::random(), product.clone());
        self.overlay
            .products
            .insert(created.id(), Some(created.clone()));
        Ok(created)
    }

    async fn update_product(
        &mut self,
        id: ProductId,
        details: &ProductDetails,
    ) -> Result<Option<Product>, StoreError> {
        self.statement("update_product")?;
        if self.product(id).is_none() {
            return Ok(None);
        }
        self.lock(RowKey::Product(id)).await;
        if self.product(id).is_none() {
            return Ok(None);
        }
        let updated = Product::new(id, details.clone());
        self.overlay.products.insert(id, Some(updated.clone()));
        Ok(Some(updated))
    }

    async fn reduce_product_stock(
        &mut self,
        id: ProductId,
        amount: Quantity,
    ) -> Result<Product, StoreError> {
        self.statement("reduce_product_stock")?;
        self.lock(RowKey::Product(id)).await;
        let current = self
            .product(id)
            .ok_or_else(|| absent(format!("product {id}")))?;
        let in_stock = current
            .in_stock()
            .checked_sub(amount.get())
            .ok_or_else(|| StoreError::constraint("products_in_stock_check"))?;
        let details = ProductDetails::try_new(current.description(), current.price(), in_stock)
            .map_err(|err| StoreError::query(err.to_string()))?;
        let updated = Product::new(id, details);
        self.overlay.products.insert(id, Some(updated.clone()));
        Ok(updated)
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool, StoreError> {
        self.statement("delete_product")?;
        if self.product(id).is_none() {
            return Ok(false);
        }
        self.lock(RowKey::Product(id)).await;
        if self.product(id).is_none() {
            return Ok(false);
        }
        if self.links().iter().any(|link| link.product_id == id) {
            return Err(StoreError::constraint("order_products_product_id_fkey"));
        }
        self.overlay.products.insert(id, None);
        Ok(true)
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.statement("get_order")?;
        Ok(self.order(id))
    }

    async fn list_orders_for_user(
        &mut self,
        user: UserId,
        page: PageRequest,
    ) -> Result<Vec<Order>, StoreError> {
        self.statement("list_orders_for_user")?;
        let mut orders: Vec<Order> = merged(&self.overlay.orders, &self.shared.state().orders)
            .into_iter()
            .filter(|order| order.user_id == user)
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(page_of(orders, page))
    }

    async fn create_order(
        &mut self,
        user: UserId,
        quantity: Quantity,
    ) -> Result<Order, StoreError> {
        self.statement("create_order")?;
        if self.user(user).is_none() {
            return Err(StoreError::constraint("orders_user_id_fkey"));
        }
        let order = Order {
            id: OrderId::random(),
            user_id: user,
            quantity,
            created_at: Utc::now(),
        };
        self.overlay.orders.insert(order.id, Some(order.clone()));
        Ok(order)
    }

    async fn delete_order(&mut self, id: OrderId) -> Result<bool, StoreError> {
        self.statement("delete_order")?;
        if self.order(id).is_none() {
            return Ok(false);
        }
        self.lock(RowKey::Order(id)).await;
        if self.order(id).is_none() {
            return Ok(false);
        }
        self.overlay.links_added.retain(|link| link.order_id != id);
        self.overlay.links_removed.insert(id);
        self.overlay.orders.insert(id, None);
        Ok(true)
    }

    async fn create_order_product(
        &mut self,
        order: OrderId,
        product: ProductId,
    ) -> Result<OrderProduct, StoreError> {
        self.statement("create_order_product")?;
        if self.order(order).is_none() {
            return Err(StoreError::constraint("order_products_order_id_fkey"));
        }
        if self.product(product).is_none() {
            return Err(StoreError::constraint("order_products_product_id_fkey"));
        }
        let link = OrderProduct {
            order_id: order,
            product_id: product,
        };
        if self.links().contains(&link) {
            return Err(StoreError::constraint("order_products_pkey"));
        }
        self.overlay.links_added.push(link);
        Ok(link)
    }

    async fn list_order_products(
        &mut self,
        order: OrderId,
    ) -> Result<Vec<OrderProduct>, StoreError> {
        self.statement("list_order_products")?;
        Ok(self
            .links()
            .into_iter()
            .filter(|link| link.order_id == order)
            .collect())
    }
}
