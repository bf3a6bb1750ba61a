pub mod capture;
pub mod exercise;
pub mod pose;
pub mod session;
