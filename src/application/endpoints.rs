// src/application/endpoints.rs
pub const MAGIC_LINK_REQUEST: &str = "/auth/v1/magic-link/request/";
pub const MAGIC_LINK_VERIFY: &str = "/auth/v1/magic-link/verify/";
pub const TOKEN_REFRESH: &str = "/auth/v1/token/refresh/";
pub const LOGOUT: &str = "/auth/v1/logout/";
pub const PROFILE: &str = "/auth/v1/profile/";
pub const EMAIL_UPDATE: &str = "/auth/v1/email/update/";
pub const EMAIL_VERIFY: &str = "/auth/v1/email/verify/";
pub const EMAIL_RESEND: &str = "/auth/v1/email/resend-verification/";
pub const USER_STATS: &str = "/auth/v1/stats/";

pub const RECEIPT_UPLOAD: &str = "/receipt/v1/receipts/upload/";
pub const RECEIPT_LIST: &str = "/receipt/v1/receipts/";
pub const QUOTA_STATUS: &str = "/receipt/v1/user/quota-status/";
pub const UPLOAD_HISTORY: &str = "/receipt/v1/user/upload-history/";

/// Paths that never carry a bearer token.
pub const PUBLIC_PATHS: [&str; 4] = [
    "/magic-link/request/",
    "/magic-link/verify/",
    "/email/verify/",
    "/token/refresh/",
];

pub fn receipt_detail(receipt_id: &str) -> String {
    format!("{RECEIPT_LIST}{receipt_id}/")
}

pub fn upload_status(receipt_id: &str) -> String {
    format!("{RECEIPT_LIST}upload-status/{receipt_id}/")
}

pub fn extracted_data(receipt_id: &str) -> String {
    format!("{RECEIPT_LIST}{receipt_id}/extracted-data/")
}

pub fn confirm_receipt(receipt_id: &str) -> String {
    format!("{RECEIPT_LIST}{receipt_id}/confirm/")
}
