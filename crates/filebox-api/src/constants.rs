/// Route under which stored files are listed, uploaded, and downloaded.
pub const FILES_PATH: &str = "/api/files";

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

pub const HEALTH_PATH: &str = "/health";
pub const READINESS_PATH: &str = "/health/ready";
