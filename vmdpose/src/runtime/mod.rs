mod animation;
mod controller;
mod ik;
mod skeleton;
mod target;

pub use animation::curve_ratio;
pub use controller::*;
pub use ik::*;
pub use skeleton::*;
pub use target::*;

#[cfg(test)]
mod animation_tests;



#[cfg(test)]
mod controller_tests;
