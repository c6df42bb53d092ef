pub mod hmac;
pub mod launch;

pub use launch::{
    LaunchData, LaunchVerifier, compute_hash, extract_user_id, sign_launch_data, verify,
};
