//! Products and their custody life-cycle.
//!
//! Pure domain logic (no IO): product attributes as entered by customs, the
//! custody status ladder, and the life-cycle aggregate that decides which
//! dispatch/accept/sell transitions are legal.

pub mod life_cycle;
pub mod product;
pub mod status;

pub use life_cycle::{
    AcceptDelivery, DeliveryAccepted, DispatchProduct, InTransit, LifeCycleCommand, LifeCycleEvent,
    MintProduct, OnwardPointers, ProductDispatched, ProductLifeCycle, ProductMinted, ProductSold,
};
pub use product::{Product, ProductEntry};
pub use status::{Custodian, ProductStatus};
