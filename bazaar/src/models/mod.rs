pub mod input;

mod conversation;
mod message;
mod product;

pub use conversation::Conversation;
pub use message::{MessageRecord, MessageView};
pub use product::{BaseProduct, CartProduct, Category, Product, PurchasedProduct};
