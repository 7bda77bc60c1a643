pub mod session_worker;
