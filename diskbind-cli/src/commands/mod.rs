pub mod attach;
pub mod detach;
pub mod mount_path;
