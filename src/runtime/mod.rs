pub(crate) mod render_loop;
pub(crate) mod stage;
