pub mod session_backend;
