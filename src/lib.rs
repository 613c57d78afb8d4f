pub mod config;
pub mod consts;
pub mod utils;

pub mod entity;
pub mod auth;
pub mod pages;
pub mod payroll;
