pub mod directory;
pub mod mail;
pub mod publisher;
pub mod storage;
