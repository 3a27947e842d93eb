//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly. When a
//! migration changes the schema, regenerate them with `diesel print-schema`
//! or update them by hand.

diesel::table! {
    /// Registered buyers.
    ///
    /// `full_name` is derived from the name parts on every write and backs
    /// the list ordering. `balance` is held in minor currency units and is
    /// constrained non-negative.
    users (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Unique login name.
        username -> Varchar,
        /// Given name.
        first_name -> Varchar,
        /// Middle name, empty when absent.
        middle_name -> Varchar,
        /// Family name.
        last_name -> Varchar,
        /// Space separated name parts.
        full_name -> Varchar,
        /// `M` or `F`.
        gender -> Varchar,
        /// Age in years.
        age -> Int4,
        /// Spendable balance in minor units.
        balance -> Int8,
        /// Record creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Catalogue products with price and stock level.
    products (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Human readable description.
        description -> Varchar,
        /// Unit price in minor units.
        price -> Int8,
        /// Units available for sale; never negative.
        in_stock -> Int4,
        /// Record creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Orders recorded by committed purchases.
    orders (id) {
        /// Primary key: UUID v4 identifier.
        id -> Uuid,
        /// Buyer that placed the order.
        user_id -> Uuid,
        /// Units bought.
        quantity -> Int4,
        /// Record creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Links between orders and the products they bought.
    order_products (order_id, product_id) {
        /// Owning order; cascades on delete.
        order_id -> Uuid,
        /// Purchased product.
        product_id -> Uuid,
    }
}

diesel::joinable!(orders -> users (user_id));
diesel::joinable!(order_products -> orders (order_id));
diesel::joinable!(order_products -> products (product_id));

diesel::allow_tables_to_appear_in_same_query!(users, products, orders, order_products);
