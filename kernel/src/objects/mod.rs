pub mod account;
pub mod asset;
pub mod balance;
pub mod content;
pub mod credit;
pub mod escrow;
pub mod order;
pub mod pool;
pub mod producer;
pub mod social;

pub use account::*;
pub use asset::*;
pub use balance::*;
pub use content::*;
pub use credit::*;
pub use escrow::*;
pub use order::*;
pub use pool::*;
pub use producer::*;
pub use social::*;
