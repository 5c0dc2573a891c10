pub mod auth;
pub mod cycle;
pub mod label;
pub mod run;
