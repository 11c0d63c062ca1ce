pub mod amount;
pub mod batch;
pub mod owner;
pub mod store;
pub mod taxonomy;
pub mod transaction;

pub use amount::{Amount, AmountError};
pub use batch::{Batch, BatchId, NewBatch};
pub use owner::{AuthError, OwnerId, OwnerResolver};
pub use store::{LedgerStore, StoreError};
pub use taxonomy::{
    build_tree, name_key, Category, CategoryId, CategoryNode, Subcategory, SubcategoryId,
    SubcategoryNode,
};
pub use transaction::{non_blank, Classification, NewTransaction, Transaction};
