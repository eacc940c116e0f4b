//! Lancer Core - Core types and utilities for the Lancer asset pipeline
//!
//! This crate provides the foundational types shared by the asset crates:
//! - Mathematical primitives (re-exported from glam)
//! - Transform and Color value types
//! - The model CRC used to identify materials and meshes

pub mod crc;
pub mod types;

pub use crc::model_crc;
pub use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};
pub use types::{Color, Transform};
