pub mod health;
pub mod process;
