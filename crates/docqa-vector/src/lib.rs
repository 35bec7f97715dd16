//! docqa-vector
//!
//! LanceDB storage for document chunks. See [`LanceCollection`].
#![deny(unused_imports)]

pub mod collection;
pub mod filter;
pub mod schema;
pub mod table;

pub use collection::LanceCollection;
