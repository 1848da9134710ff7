pub(crate) mod interactive;
pub(crate) mod keyboard;
pub(crate) mod pointer;
