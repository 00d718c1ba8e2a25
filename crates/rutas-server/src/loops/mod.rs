//! Background loops.

pub mod graph_reload_loop;
