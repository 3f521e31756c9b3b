mod check_test;
mod full_reset_test;
mod write_test;
