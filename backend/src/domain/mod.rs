//! Domain primitives, services and ports.
//!
//! Purpose: define the storefront records (users, products, orders), the
//! ports through which they are persisted, and the services that run inside
//! store transactions.
//!
//! Public surface:
//! - Error (alias to `error::Error`) — transport agnostic failure payload.
//! - Money, Quantity, PageRequest — validated numeric values.
//! - User, Product, Order, OrderProduct — persisted records.
//! - PurchaseService — the transactional "buy product" workflow.
//! - StorefrontService — catalogue and account maintenance.

pub mod error;
mod ids;
mod money;
pub mod order;
pub mod ports;
pub mod product;
pub mod purchase;
pub mod storefront_service;
pub mod user;

pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::ids::{InvalidIdError, OrderId, ProductId, UserId};
pub use self::money::{AmountValidationError, Money, PageRequest, Quantity};
pub use self::order::{Order, OrderDetails, OrderProduct};
pub use self::product::{NewProduct, Product, ProductDetails, ProductValidationError};
pub use self::purchase::{
    PurchaseError, PurchaseReceipt, PurchaseRequest, PurchaseService,
};
pub use self::storefront_service::StorefrontService;
pub use self::user::{Gender, NewUser, User, UserProfile, UserValidationError, Username};

/// Result alias used by the domain services.
pub type DomainResult<T> = Result<T, Error>;
