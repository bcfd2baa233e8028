pub mod file_storage;
pub mod http_backend;

pub use file_storage::FileStorageAdapter;
pub use http_backend::HttpBackendAdapter;
