mod session_test;
