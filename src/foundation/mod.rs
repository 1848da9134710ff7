pub(crate) mod core;
pub(crate) mod error;
pub(crate) mod hook;
pub(crate) mod ids;
pub(crate) mod math;
