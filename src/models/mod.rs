//! Data models
//!
//! Rust structs representing database entities.

mod entity;
mod person;
mod product;
mod storage;
mod store_location;
mod unit;

pub use entity::{Entity, EntityCreate};
pub use person::{Permission, PermissionCreate, Person, ALL_ENTITIES};
pub use product::{Product, ProductCreate};
pub use storage::{Storage, StorageCreate};
pub use store_location::{StoreLocation, StoreLocationCreate};
pub use unit::{Unit, UnitCreate, UnitType};
