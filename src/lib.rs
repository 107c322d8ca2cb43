pub mod broker;
pub mod config;
pub mod controller;
pub mod error;
pub mod job;
pub mod remote;
pub mod resource;
pub mod supervisor;
