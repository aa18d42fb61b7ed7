#[cfg(test)]
#[macro_use]
extern crate assert_float_eq;

pub mod test_utils;

pub mod application;
pub mod parsers;
