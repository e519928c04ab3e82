pub mod debug;
pub mod pidfile;
