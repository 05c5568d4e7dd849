pub mod simulation;

#[cfg(feature = "test_utils")]
pub mod test_utils;
