pub mod delinquency;
pub mod penalty;
