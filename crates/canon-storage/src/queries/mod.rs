//! Free query functions over a borrowed `Connection`.

pub mod attempts;
pub mod audit;
pub mod patterns;
pub mod snapshots;
pub mod violations;
