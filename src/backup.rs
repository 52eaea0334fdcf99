// Hot backup.
//
// - copy: native page copy from the pooled source session into a fresh destination file
// - file: the readable result handed to callers and archive sinks

pub mod copy;
pub mod file;

pub use copy::HotBackupEngine;
pub use file::BackupFile;
