pub mod access_key;
