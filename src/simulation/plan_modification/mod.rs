pub mod absorption;
pub mod plan_modifier;
