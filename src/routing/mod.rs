//! Alias routing: the per-context alias cells and the routers that read them

pub mod aliases;
pub mod router;

pub use aliases::{
    current_read, current_write, default_alias, propagate, set_default_alias, snapshot,
    AliasSnapshot, DEFAULT_DB_ALIAS,
};
pub use router::{DatabaseRouter, DynamicDbRouter, Hints, Model, RouterChain};
