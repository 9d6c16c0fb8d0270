pub mod locks;
pub mod sanitize;
