pub mod id;

pub use id::{random_id, sortable_id};
