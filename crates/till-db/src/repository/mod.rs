//! # Repository Module
//!
//! Database repository implementations for Till POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  till-engine store traits                                              │
//! │       │                                                                 │
//! │       │  db.products().get_by_id(7)                                    │
//! │       ▼                                                                 │
//! │  ProductRepository                                                     │
//! │  ├── get_by_id(&self, id)                                              │
//! │  ├── get_by_ids(&self, ids)                                            │
//! │  ├── list_all(&self)                                                   │
//! │  └── update_stock(&self, id, stock)                                    │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Product CRUD and stock writes
//! - [`DiscountRepository`](discount::DiscountRepository) - Discount rules
//! - [`OrderRepository`](order::OrderRepository) - Orders and ordered lines
//! - [`CashierRepository`](cashier::CashierRepository) - Cashiers
//! - [`PaymentRepository`](payment::PaymentRepository) - Payment methods
//! - [`CategoryRepository`](category::CategoryRepository) - Product categories

pub mod cashier;
pub mod category;
pub mod discount;
pub mod order;
pub mod payment;
pub mod product;
