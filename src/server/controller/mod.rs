pub(crate) mod error;
pub(crate) mod menu;
pub(crate) mod orders;
pub(crate) mod tables;
