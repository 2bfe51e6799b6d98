pub(crate) mod models;
pub(crate) mod session;
pub(crate) mod types;
