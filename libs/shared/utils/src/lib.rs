pub mod basic_auth;
pub mod extractor;
pub mod jwt;
pub mod password;
pub mod test_utils;
pub mod validation;
