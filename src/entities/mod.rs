pub mod artwork;
pub mod order;
pub mod order_item;

pub use artwork::Entity as Artwork;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
