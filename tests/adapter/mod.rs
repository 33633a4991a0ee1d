mod args_test;
mod execute_test;
