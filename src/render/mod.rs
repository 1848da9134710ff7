pub(crate) mod adapter;
pub(crate) mod canvas;
pub(crate) mod frame;
pub(crate) mod recording;
pub(crate) mod texture;
