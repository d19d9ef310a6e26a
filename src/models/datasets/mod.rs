pub mod blocks;
pub mod chains;
pub mod transfers;
