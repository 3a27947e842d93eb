//! Service-level tests for catalogue and account maintenance.

use std::time::Duration;

use rstest::{fixture, rstest};
use tokio::sync::oneshot;

use super::*;
use crate::domain::{ErrorCode, Gender, Money, PurchaseRequest, PurchaseService, Quantity};
use crate::outbound::memory::InMemoryStore;

fn money(minor_units: i64) -> Money {
    Money::new(minor_units).expect("non-negative amount")
}

fn profile(first: &str, last: &str) -> UserProfile {
    UserProfile::try_new(first, "", last, Gender::Female, 30).expect("valid profile")
}

/// Registration payload whose username is the lowercased full name.
fn new_user(first: &str, last: &str, balance: i64) -> NewUser {
    let username = Username::new(format!("{first}{last}").to_lowercase()).expect("username");
    NewUser::new(username, profile(first, last), money(balance))
}

fn details(description: &str, price: i64, in_stock: u32) -> ProductDetails {
    ProductDetails::try_new(description, money(price), in_stock).expect("valid product")
}

#[fixture]
fn store() -> InMemoryStore {
    InMemoryStore::new()
}

async fn buy(store: &InMemoryStore, user: UserId, product: ProductId) -> OrderId {
    let request = PurchaseRequest::new(user, product, Quantity::new(1).expect("quantity"));
    PurchaseService::new(store.clone())
        .buy_product(&ExecutionContext::new(), request)
        .await
        .expect("purchase commits")
        .order
        .id
}

#[rstest]
#[tokio::test]
async fn registered_user_can_be_fetched(store: InMemoryStore) {
    let service = StorefrontService::new(store);
    let created = service
        .register_user(new_user("Ada", "Lovelace", 1_000))
        .await
        .expect("register");

    let fetched = service.get_user(created.id()).await.expect("fetch");
    assert_eq!(fetched, created);
    assert_eq!(fetched.full_name(), "Ada Lovelace");
}

#[rstest]
#[tokio::test]
async fn users_are_listed_by_full_name(store: InMemoryStore) {
    let service = StorefrontService::new(store);
    for (first, last) in [("Grace", "Hopper"), ("Ada", "Lovelace"), ("Barbara", "Liskov")] {
        service
            .register_user(new_user(first, last, 0))
            .await
            .expect("register");
    }

    let names: Vec<String> = service
        .list_users(PageRequest::default())
        .await
        .expect("list")
        .iter()
        .map(User::full_name)
        .collect();
    assert_eq!(names, ["Ada Lovelace", "Barbara Liskov", "Grace Hopper"]);

    let second_page = service
        .list_users(PageRequest::new(2, 2))
        .await
        .expect("list");
    assert_eq!(second_page.len(), 1);
}

#[rstest]
#[tokio::test]
async fn profile_update_keeps_balance(store: InMemoryStore) {
    let service = StorefrontService::new(store);
    let created = service
        .register_user(new_user("Ada", "Lovelace", 750))
        .await
        .expect("register");

    let renamed =
        UserProfile::try_new("Ada", "Augusta", "King", Gender::Female, 37).expect("profile");
    let updated = service
        .update_user_profile(created.id(), renamed)
        .await
        .expect("update");

    assert_eq!(updated.full_name(), "Ada Augusta King");
    assert_eq!(updated.balance(), money(750));
    assert_eq!(updated.username(), created.username());
}

#[rstest]
#[tokio::test]
async fn taken_username_is_rejected(store: InMemoryStore) {
    let service = StorefrontService::new(store);
    let first = service
        .register_user(new_user("Ada", "Lovelace", 100))
        .await
        .expect("register");

    let mut clash = new_user("Ada", "Lovelace", 200);
    clash.profile = profile("Augusta", "King");
    let error = service.register_user(clash).await.expect_err("name is taken");

    assert_eq!(error.code(), ErrorCode::Rejected);
    let users = service.list_users(PageRequest::default()).await.expect("list");
    assert_eq!(users, vec![first]);
}

#[rstest]
#[tokio::test]
async fn product_update_waits_for_in_flight_lock(store: InMemoryStore) {
    let service = StorefrontService::new(store.clone());
    let product = service
        .create_product(details("Kettle", 100, 6))
        .await
        .expect("create");
    let product_id = product.id();

    let (locked_tx, locked_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let holder_store = store.clone();
    let holder = tokio::spawn(async move {
        holder_store
            .execute(&ExecutionContext::new(), move |tx| {
                Box::pin(async move {
                    tx.get_product_for_update(product_id).await?;
                    locked_tx.send(()).ok();
                    release_rx.await.ok();
                    tx.reduce_product_stock(product_id, Quantity::new(2).expect("quantity"))
                        .await?;
                    Ok::<_, Error>(())
                })
            })
            .await
    });
    locked_rx.await.expect("holder acquired the lock");

    let updater = service.clone();
    let update = tokio::spawn(async move {
        updater
            .update_product(product_id, details("Steel kettle", 120, 9))
            .await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!update.is_finished(), "update should wait for the lock");
    let during = service.get_product(product_id).await.expect("product");
    assert_eq!(during.in_stock(), 6);

    release_tx.send(()).ok();
    holder.await.expect("holder task").expect("holder commits");
    let updated = update.await.expect("update task").expect("update commits");

    assert_eq!(updated.description(), "Steel kettle");
    assert_eq!(updated.in_stock(), 9);
    let stored = service.get_product(product_id).await.expect("product");
    assert_eq!(stored, updated);
}

#[rstest]
#[tokio::test]
async fn missing_records_map_to_not_found(store: InMemoryStore) {
    let service = StorefrontService::new(store);

    let user = service.get_user(UserId::random()).await.expect_err("no user");
    let product = service
        .update_product(ProductId::random(), details("Lamp", 10, 1))
        .await
        .expect_err("no product");
    let order = service.delete_order(OrderId::random()).await.expect_err("no order");

    assert_eq!(user.code(), ErrorCode::NotFound);
    assert_eq!(product.code(), ErrorCode::NotFound);
    assert_eq!(order.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn product_update_replaces_details(store: InMemoryStore) {
    let service = StorefrontService::new(store);
    let created = service
        .create_product(details("Kettle", 100, 6))
        .await
        .expect("create");

    let updated = service
        .update_product(created.id(), details("Steel kettle", 120, 9))
        .await
        .expect("update");

    assert_eq!(updated.id(), created.id());
    assert_eq!(updated.description(), "Steel kettle");
    assert_eq!(updated.price(), money(120));
    assert_eq!(updated.in_stock(), 9);
}

#[rstest]
#[tokio::test]
async fn records_with_orders_cannot_be_deleted(store: InMemoryStore) {
    let service = StorefrontService::new(store.clone());
    let user = service
        .register_user(new_user("Ada", "Lovelace", 1_000))
        .await
        .expect("register");
    let product = service
        .create_product(details("Kettle", 100, 6))
        .await
        .expect("create");
    buy(&store, user.id(), product.id()).await;

    let user_error = service.delete_user(user.id()).await.expect_err("user has orders");
    let product_error = service
        .delete_product(product.id())
        .await
        .expect_err("product is linked");

    assert_eq!(user_error.code(), ErrorCode::Rejected);
    assert_eq!(product_error.code(), ErrorCode::Rejected);
    assert!(service.get_user(user.id()).await.is_ok());
}

#[rstest]
#[tokio::test]
async fn order_lookup_includes_linked_products(store: InMemoryStore) {
    let service = StorefrontService::new(store.clone());
    let user = service
        .register_user(new_user("Ada", "Lovelace", 1_000))
        .await
        .expect("register");
    let product = service
        .create_product(details("Kettle", 100, 6))
        .await
        .expect("create");
    let order_id = buy(&store, user.id(), product.id()).await;

    let order = service.get_order(order_id).await.expect("order");
    assert_eq!(order.order.user_id, user.id());
    assert_eq!(order.products, vec![product.id()]);

    let listed = service
        .list_orders_for_user(user.id(), PageRequest::default())
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);
}

#[rstest]
#[tokio::test]
async fn deleting_an_order_frees_its_records(store: InMemoryStore) {
    let service = StorefrontService::new(store.clone());
    let user = service
        .register_user(new_user("Ada", "Lovelace", 1_000))
        .await
        .expect("register");
    let product = service
        .create_product(details("Kettle", 100, 6))
        .await
        .expect("create");
    let order_id = buy(&store, user.id(), product.id()).await;

    service.delete_order(order_id).await.expect("delete order");

    assert_eq!(store.order_count(), 0);
    assert_eq!(store.order_product_count(), 0);
    let restored = service.get_product(product.id()).await.expect("product");
    assert_eq!(restored.in_stock(), 5);
    service.delete_product(product.id()).await.expect("delete product");
    service.delete_user(user.id()).await.expect("delete user");
}
