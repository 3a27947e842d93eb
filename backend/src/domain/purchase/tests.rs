//! Tests for the purchase unit of work and its error mapping.

use super::*;
use crate::domain::ports::MockEntityTransaction;
use crate::domain::{ErrorCode, Gender, OrderId, ProductDetails, UserProfile, Username};
use chrono::Utc;
use mockall::Sequence;
use mockall::predicate::eq;
use rstest::{fixture, rstest};

fn money(minor_units: i64) -> Money {
    Money::new(minor_units).expect("non-negative amount")
}

fn product_with(id: ProductId, price: i64, in_stock: u32) -> Product {
    let details = ProductDetails::try_new("Kettle", money(price), in_stock).expect("valid product");
    Product::new(id, details)
}

fn user_with(id: UserId, balance: i64) -> User {
    let profile =
        UserProfile::try_new("Ada", "", "Lovelace", Gender::Female, 36).expect("valid profile");
    let username = Username::new("ada").expect("valid username");
    User::new(id, username, profile, money(balance))
}

fn order_for(user_id: UserId, quantity: Quantity) -> Order {
    Order {
        id: OrderId::random(),
        user_id,
        quantity,
        created_at: Utc::now(),
    }
}

#[fixture]
fn request() -> PurchaseRequest {
    PurchaseRequest::try_new(UserId::random(), ProductId::random(), 2).expect("valid request")
}

#[rstest]
#[tokio::test]
async fn successful_purchase_locks_product_then_user_then_writes(request: PurchaseRequest) {
    let mut tx = MockEntityTransaction::new();
    let mut seq = Sequence::new();
    let product_id = request.product_id;
    let user_id = request.user_id;

    tx.expect_get_product_for_update()
        .with(eq(product_id))
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |id| Ok(Some(product_with(id, 100, 6))));
    tx.expect_get_user_for_update()
        .with(eq(user_id))
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |id| Ok(Some(user_with(id, 1_000))));
    tx.expect_reduce_product_stock()
        .with(eq(product_id), eq(request.quantity))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|id, amount| Ok(product_with(id, 100, 6 - amount.get())));
    tx.expect_reduce_user_balance()
        .with(eq(user_id), eq(money(200)))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|id, amount| Ok(user_with(id, 1_000 - amount.minor_units())));
    tx.expect_create_order()
        .with(eq(user_id), eq(request.quantity))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|user, quantity| Ok(order_for(user, quantity)));
    tx.expect_create_order_product()
        .withf(move |_, product| *product == product_id)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|order_id, product_id| {
            Ok(OrderProduct {
                order_id,
                product_id,
            })
        });

    let receipt = workflow::buy_product(&mut tx, request)
        .await
        .expect("purchase succeeds");

    assert_eq!(receipt.product.in_stock(), 4);
    assert_eq!(receipt.user.balance(), money(800));
    assert_eq!(receipt.order.quantity, request.quantity);
    assert_eq!(receipt.order_product.order_id, receipt.order.id);
}

#[rstest]
#[tokio::test]
async fn missing_product_stops_before_user_lock(request: PurchaseRequest) {
    let mut tx = MockEntityTransaction::new();
    tx.expect_get_product_for_update()
        .times(1)
        .returning(|_| Ok(None));

    let error = workflow::buy_product(&mut tx, request)
        .await
        .expect_err("product is missing");

    assert_eq!(error, PurchaseError::ProductNotFound(request.product_id));
}

#[rstest]
#[tokio::test]
async fn insufficient_stock_issues_no_further_statements(request: PurchaseRequest) {
    let mut tx = MockEntityTransaction::new();
    tx.expect_get_product_for_update()
        .times(1)
        .returning(|id| Ok(Some(product_with(id, 100, 1))));

    let error = workflow::buy_product(&mut tx, request)
        .await
        .expect_err("stock is short");

    assert_eq!(
        error,
        PurchaseError::InsufficientStock {
            requested: 2,
            available: 1,
        }
    );
}

#[rstest]
#[tokio::test]
async fn missing_user_is_reported_after_stock_check(request: PurchaseRequest) {
    let mut tx = MockEntityTransaction::new();
    tx.expect_get_product_for_update()
        .times(1)
        .returning(|id| Ok(Some(product_with(id, 100, 6))));
    tx.expect_get_user_for_update()
        .times(1)
        .returning(|_| Ok(None));

    let error = workflow::buy_product(&mut tx, request)
        .await
        .expect_err("user is missing");

    assert_eq!(error, PurchaseError::UserNotFound(request.user_id));
}

#[rstest]
#[case(100, 150, 200)]
#[case(i64::MAX, 1_000, i64::MAX)]
#[tokio::test]
async fn insufficient_funds_issues_no_writes(
    request: PurchaseRequest,
    #[case] price: i64,
    #[case] balance: i64,
    #[case] required: i64,
) {
    let mut tx = MockEntityTransaction::new();
    tx.expect_get_product_for_update()
        .times(1)
        .returning(move |id| Ok(Some(product_with(id, price, 6))));
    tx.expect_get_user_for_update()
        .times(1)
        .returning(move |id| Ok(Some(user_with(id, balance))));

    let error = workflow::buy_product(&mut tx, request)
        .await
        .expect_err("funds are short");

    assert_eq!(
        error,
        PurchaseError::InsufficientFunds {
            required: money(required),
            available: money(balance),
        }
    );
}

#[rstest]
#[tokio::test]
async fn storage_failure_on_link_insert_propagates(request: PurchaseRequest) {
    let mut tx = MockEntityTransaction::new();
    tx.expect_get_product_for_update()
        .returning(|id| Ok(Some(product_with(id, 100, 6))));
    tx.expect_get_user_for_update()
        .returning(|id| Ok(Some(user_with(id, 1_000))));
    tx.expect_reduce_product_stock()
        .returning(|id, _| Ok(product_with(id, 100, 4)));
    tx.expect_reduce_user_balance()
        .returning(|id, _| Ok(user_with(id, 800)));
    tx.expect_create_order()
        .returning(|user, quantity| Ok(order_for(user, quantity)));
    tx.expect_create_order_product()
        .returning(|_, _| Err(StoreError::constraint("order_products_product_id_fkey")));

    let error = workflow::buy_product(&mut tx, request)
        .await
        .expect_err("link insert fails");

    assert!(matches!(error, PurchaseError::Storage(ref store) if store.is_constraint()));
}

#[rstest]
#[case(0)]
#[case(-3)]
fn non_positive_quantities_are_rejected_up_front(#[case] quantity: i64) {
    let result = PurchaseRequest::try_new(UserId::random(), ProductId::random(), quantity);
    assert!(matches!(result, Err(PurchaseError::InvalidQuantity(_))));
}

#[rstest]
fn rollback_failure_wraps_original_cause() {
    let cause = PurchaseError::InsufficientStock {
        requested: 5,
        available: 1,
    };
    let merged = cause
        .clone()
        .with_rollback_failure(StoreError::connection("connection reset"));

    let PurchaseError::RollbackFailed { cause: inner, rollback } = &merged else {
        panic!("expected a rollback failure, got {merged:?}");
    };
    assert_eq!(**inner, cause);
    assert!(rollback.is_connection());
    assert_eq!(
        merged.to_string(),
        "tx error: insufficient stock: requested 5, available 1, rb err: entity store connection failed: connection reset"
    );
}

#[rstest]
#[case(PurchaseError::ProductNotFound(ProductId::random()), ErrorCode::NotFound)]
#[case(PurchaseError::UserNotFound(UserId::random()), ErrorCode::NotFound)]
#[case(PurchaseError::InsufficientStock { requested: 5, available: 1 }, ErrorCode::Rejected)]
#[case(
    PurchaseError::InsufficientFunds { required: money(500), available: money(100) },
    ErrorCode::Rejected
)]
#[case(PurchaseError::Storage(StoreError::connection("down")), ErrorCode::ServiceUnavailable)]
#[case(PurchaseError::Storage(StoreError::query("bad")), ErrorCode::InternalError)]
#[case(
    PurchaseError::Storage(StoreError::query("bad"))
        .with_rollback_failure(StoreError::connection("gone")),
    ErrorCode::InternalError
)]
#[case(PurchaseError::Interrupted(Interruption::TimedOut), ErrorCode::ServiceUnavailable)]
fn purchase_errors_map_to_domain_codes(#[case] error: PurchaseError, #[case] expected: ErrorCode) {
    let mapped: Error = error.into();
    assert_eq!(mapped.code(), expected);
}

#[rstest]
fn rejections_carry_structured_details() {
    let mapped: Error = PurchaseError::InsufficientFunds {
        required: money(500),
        available: money(100),
    }
    .into();

    let details = mapped.details().expect("details present");
    assert_eq!(details["reason"], "insufficient_funds");
    assert_eq!(details["required"], 500);
    assert_eq!(details["available"], 100);
}
