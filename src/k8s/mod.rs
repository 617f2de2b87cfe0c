/// kubectl and helm wrappers
pub mod helm;
pub mod kubectl;

pub use helm::{Helm, Release};
pub use kubectl::Kubectl;
