/// A fiscal document access key is exactly 44 decimal digits. Checked before
/// any I/O is attempted on behalf of the caller.
pub fn is_valid_access_key(key: &str) -> bool {
    key.len() == 44 && key.bytes().all(|b| b.is_ascii_digit())
}
