pub mod category;
pub mod contact;
pub mod order;
pub mod order_item;
pub mod product;

pub use category::Entity as Category;
pub use contact::Entity as Contact;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use product::Entity as Product;
