pub(crate) mod field_state;
pub mod merger;
