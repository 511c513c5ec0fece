// src/models/mod.rs

pub mod class_group;
pub mod question;
pub mod result;
pub mod student;
pub mod user;
