//! Route handlers

pub(crate) mod chat;
pub(crate) mod credits;
pub(crate) mod history;
