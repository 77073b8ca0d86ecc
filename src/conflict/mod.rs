/// This module contains logic for detecting transaction conflicts.
pub mod detection;
/// This module contains the policy applied after a conflict.
pub mod resolution;
