pub mod provision;
pub mod scenarios;
