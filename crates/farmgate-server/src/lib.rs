pub mod adapter;
pub mod audit;
pub mod cli;
pub mod config;
pub mod consistency;
pub mod error;
pub mod metrics;
pub mod rest;
pub mod service;
