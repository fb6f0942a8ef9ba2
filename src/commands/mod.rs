pub mod classify;
pub mod correspond;
pub mod rules_check;
pub mod threshold;
