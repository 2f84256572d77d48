pub mod sectioning;
pub mod correction;
pub mod extraction;
pub mod validation;
