pub mod apply_test;
