pub mod browse;
pub mod model;
pub mod repository;
pub mod service;
