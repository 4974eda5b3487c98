pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;

pub use common::{CartId, Money, OrderId, ProductId, UserId};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{
    CartLine, NewOrder, NewProduct, NewUser, Order, OrderLine, Page, PageRequest, Product,
    ProductUpdate, ProfileUpdate, ShippingAddress, User,
};
pub use postgres::PostgresStore;
pub use store::{Store, StoreExt};
