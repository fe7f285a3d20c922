pub mod devlog;
