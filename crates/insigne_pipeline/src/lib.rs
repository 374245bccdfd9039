#![forbid(unsafe_code)]

pub mod access;
pub mod generation;
pub mod ingress;
pub mod lifecycle;
